//! Timeline sources
//!
//! Every clip points at a source through a [`SourceId`]: either the index
//! of an input file or a user-chosen text label. Labels come from
//! `label:path` arguments and are validated before the file is probed.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SpeedcutError};

/// Longest accepted source label, in characters
pub const MAX_LABEL_LEN: usize = 500;

/// Characters a label may not contain
pub const ILLEGAL_LABEL_CHARS: &str = ",.;()/\\[]}{'\"|#&<>^%$_@ ";

/// Key of a timeline source
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SourceId {
    Index(usize),
    Label(String),
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceId::Index(i) => write!(f, "{}", i),
            SourceId::Label(label) => write!(f, "{}", label),
        }
    }
}

impl From<usize> for SourceId {
    fn from(index: usize) -> Self {
        SourceId::Index(index)
    }
}

/// Check a source label against the naming rules
pub fn validate_label(label: &str) -> Result<()> {
    let invalid = |reason: String| SpeedcutError::InvalidSourceLabel {
        label: label.to_string(),
        reason,
    };

    let first = label
        .chars()
        .next()
        .ok_or_else(|| invalid("Label must not be empty".to_string()))?;
    if label.chars().count() > MAX_LABEL_LEN {
        return Err(invalid(format!(
            "Label must not exceed {} characters",
            MAX_LABEL_LEN
        )));
    }
    if let Some(c) = label.chars().find(|c| ILLEGAL_LABEL_CHARS.contains(*c)) {
        return Err(invalid(format!("Label contains illegal character: {:?}", c)));
    }
    if first.is_ascii_digit() {
        return Err(invalid("Label must not start with a digit".to_string()));
    }
    if first == '-' {
        return Err(invalid("Label must not start with a dash".to_string()));
    }
    Ok(())
}

/// A parsed `label:path` source argument
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceSpec {
    pub label: String,
    pub path: PathBuf,
}

impl SourceSpec {
    /// Validate the label and make sure `path` is an existing file
    pub fn new(label: impl Into<String>, path: impl Into<PathBuf>) -> Result<Self> {
        let label = label.into();
        let path = path.into();
        validate_label(&label)?;
        if !path.is_file() {
            return Err(SpeedcutError::FileNotFound {
                path: path.display().to_string(),
                source: None,
            });
        }
        Ok(Self { label, path })
    }

    pub fn id(&self) -> SourceId {
        SourceId::Label(self.label.clone())
    }
}

impl FromStr for SourceSpec {
    type Err = SpeedcutError;

    fn from_str(s: &str) -> Result<Self> {
        match s.split(':').collect::<Vec<_>>().as_slice() {
            [label, path] => SourceSpec::new(*label, *path),
            _ => Err(SpeedcutError::InvalidSourceLabel {
                label: s.to_string(),
                reason: "Source must have exactly one ':'".to_string(),
            }),
        }
    }
}

/// Probed metadata of a source file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceInfo {
    pub path: PathBuf,
    /// Sample rate in Hz
    pub sample_rate: u32,
    pub bits_per_sample: u16,
    pub channels: u16,
    /// Total number of samples per channel
    pub num_samples: u64,
    pub duration_secs: f64,
}

impl SourceInfo {
    /// Probe a WAV file without decoding its samples
    pub fn from_wav(path: &Path) -> Result<Self> {
        if !path.is_file() {
            return Err(SpeedcutError::FileNotFound {
                path: path.display().to_string(),
                source: None,
            });
        }
        let reader = hound::WavReader::open(path).map_err(|e| SpeedcutError::InvalidAudio {
            reason: format!("Failed to open WAV file: {}", e),
            source: Some(Box::new(e)),
        })?;

        let spec = reader.spec();
        let num_samples = u64::from(reader.duration());
        let duration_secs = if spec.sample_rate == 0 {
            0.0
        } else {
            num_samples as f64 / f64::from(spec.sample_rate)
        };

        Ok(Self {
            path: path.to_path_buf(),
            sample_rate: spec.sample_rate,
            bits_per_sample: spec.bits_per_sample,
            channels: spec.channels,
            num_samples,
            duration_secs,
        })
    }
}
