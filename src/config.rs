//! Job configuration
//!
//! A job file is a JSON document describing one edit: the source WAV, the
//! chunk schedule, the speed table and any extra objects to lay on top.
//!
//! ```json
//! {
//!   "source": "input.wav",
//!   "frame_rate": { "num": 30, "den": 1 },
//!   "chunks": [[0, 15, 0], [15, 30, 1]],
//!   "speeds": [1.0, 2.0],
//!   "add": [{ "kind": "text", "content": "Hello", "dur": 30 }]
//! }
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Result, SpeedcutError};
use crate::schedule::{Chunk, ChunkSchedule, SpeedTable, Timebase};
use crate::timeline::{
    AudioClip, Resolution, SourceId, SourceInfo, SourceSpec, Timeline, VisualClip, VisualKind,
    DEFAULT_BACKGROUND,
};

/// Suffix appended to the source stem when no output path is given
pub const DEFAULT_OUTPUT_SUFFIX: &str = "_ALTERED";

fn default_background() -> String {
    DEFAULT_BACKGROUND.to_string()
}

fn default_speed() -> f64 {
    1.0
}

fn default_volume() -> f64 {
    1.0
}

/// One edit job
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct JobConfig {
    /// Source WAV file
    pub source: PathBuf,
    /// Output WAV file; derived from `source` when absent
    #[serde(default)]
    pub output: Option<PathBuf>,
    #[serde(default)]
    pub frame_rate: Timebase,
    /// `[start, end, speed_index]` triples
    pub chunks: Vec<Chunk>,
    /// Speed multipliers; 99999 drops a chunk
    pub speeds: Vec<f64>,
    /// Expected source sample rate
    #[serde(default)]
    pub sample_rate: Option<u32>,
    #[serde(default)]
    pub resolution: Resolution,
    #[serde(default = "default_background")]
    pub background: String,
    /// Stretch chunks in parallel
    #[serde(default)]
    pub parallel: bool,
    /// Extra `label:path` sources for added objects
    #[serde(default)]
    pub sources: Vec<String>,
    /// Extra objects, each placed on a layer of its own
    #[serde(default)]
    pub add: Vec<ExtraObject>,
}

/// An object laid over the edit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtraObject {
    #[serde(default)]
    pub start: u64,
    /// Defaults to the end of the edited timeline
    #[serde(default)]
    pub dur: Option<u64>,
    #[serde(flatten)]
    pub kind: ObjectKind,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ObjectKind {
    Rectangle {
        #[serde(default)]
        x: i32,
        #[serde(default)]
        y: i32,
        width: u32,
        height: u32,
        #[serde(default)]
        fill: Option<String>,
    },
    Ellipse {
        #[serde(default)]
        x: i32,
        #[serde(default)]
        y: i32,
        width: u32,
        height: u32,
        #[serde(default)]
        fill: Option<String>,
    },
    Text {
        content: String,
        #[serde(default)]
        x: i32,
        #[serde(default)]
        y: i32,
        #[serde(default)]
        size: Option<u32>,
        #[serde(default)]
        fill: Option<String>,
    },
    Image {
        src: SourceId,
        #[serde(default)]
        x: i32,
        #[serde(default)]
        y: i32,
        #[serde(default)]
        opacity: Option<f64>,
    },
    Audio {
        src: SourceId,
        #[serde(default)]
        offset: u64,
        #[serde(default = "default_speed")]
        speed: f64,
        #[serde(default = "default_volume")]
        volume: f64,
        #[serde(default)]
        stream: usize,
    },
}

impl ObjectKind {
    /// Source this object reads from, if any
    pub fn source(&self) -> Option<&SourceId> {
        match self {
            ObjectKind::Image { src, .. } | ObjectKind::Audio { src, .. } => Some(src),
            _ => None,
        }
    }
}

/// Fill colour of shapes and text without an explicit one
pub const DEFAULT_FILL: &str = "#c4c4c4";

/// Font size of text without an explicit one
pub const DEFAULT_TEXT_SIZE: u32 = 55;

enum Placed {
    Visual(VisualClip),
    Audio(AudioClip),
}

impl ExtraObject {
    fn place(self, default_dur: u64) -> Placed {
        let start = self.start;
        let dur = self.dur.unwrap_or(default_dur);
        let fill = |fill: Option<String>| fill.unwrap_or_else(|| DEFAULT_FILL.to_string());
        let visual = |kind| Placed::Visual(VisualClip { start, dur, kind });

        match self.kind {
            ObjectKind::Rectangle {
                x,
                y,
                width,
                height,
                fill: f,
            } => visual(VisualKind::Rectangle {
                x,
                y,
                width,
                height,
                fill: fill(f),
            }),
            ObjectKind::Ellipse {
                x,
                y,
                width,
                height,
                fill: f,
            } => visual(VisualKind::Ellipse {
                x,
                y,
                width,
                height,
                fill: fill(f),
            }),
            ObjectKind::Text {
                content,
                x,
                y,
                size,
                fill: f,
            } => visual(VisualKind::Text {
                content,
                x,
                y,
                size: size.unwrap_or(DEFAULT_TEXT_SIZE),
                fill: fill(f),
            }),
            ObjectKind::Image { src, x, y, opacity } => visual(VisualKind::Image {
                src,
                x,
                y,
                opacity: opacity.unwrap_or(1.0),
            }),
            ObjectKind::Audio {
                src,
                offset,
                speed,
                volume,
                stream,
            } => Placed::Audio(AudioClip {
                start,
                dur,
                src,
                offset,
                speed,
                volume,
                stream,
            }),
        }
    }
}

impl JobConfig {
    /// Parse a job from JSON text and validate it
    pub fn from_json(json: &str) -> Result<Self> {
        let job: JobConfig = serde_json::from_str(json)?;
        job.validate()?;
        Ok(job)
    }

    /// Read and validate a job file
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| SpeedcutError::FileNotFound {
            path: path.display().to_string(),
            source: Some(e),
        })?;
        let job = Self::from_json(&content)?;
        debug!(path = %path.display(), chunks = job.chunks.len(), "loaded job");
        Ok(job)
    }

    /// Check everything that can be checked without touching the source
    pub fn validate(&self) -> Result<()> {
        self.frame_rate.validate()?;
        let speeds = self.speed_table()?;
        self.schedule()?.check_speeds(&speeds)?;
        for object in &self.add {
            if let ObjectKind::Audio { speed, .. } = object.kind {
                if !speed.is_finite() || speed <= 0.0 {
                    return Err(SpeedcutError::InvalidSpeed { value: speed });
                }
            }
        }
        Ok(())
    }

    pub fn schedule(&self) -> Result<ChunkSchedule> {
        ChunkSchedule::new(self.chunks.clone())
    }

    pub fn speed_table(&self) -> Result<SpeedTable> {
        SpeedTable::from_multipliers(&self.speeds)
    }

    /// Where the reconstructed audio goes: `output`, or `<stem>_ALTERED.wav`
    /// next to the source
    pub fn output_path(&self) -> PathBuf {
        match &self.output {
            Some(path) => path.clone(),
            None => {
                let stem = self
                    .source
                    .file_stem()
                    .map(|s| s.to_string_lossy().into_owned())
                    .unwrap_or_default();
                self.source
                    .with_file_name(format!("{}{}.wav", stem, DEFAULT_OUTPUT_SUFFIX))
            }
        }
    }

    /// Probe the source and build the edited timeline
    pub fn timeline(&self) -> Result<Timeline> {
        let info = SourceInfo::from_wav(&self.source)?;
        if let Some(expected) = self.sample_rate {
            if expected != info.sample_rate {
                return Err(SpeedcutError::InvalidAudio {
                    reason: format!(
                        "Source sample rate is {} Hz, job expects {} Hz",
                        info.sample_rate, expected
                    ),
                    source: None,
                });
            }
        }

        let mut timeline =
            Timeline::from_schedule(info, self.schedule()?, self.speed_table()?, self.frame_rate)?;
        timeline.resolution = self.resolution;
        timeline.background = self.background.clone();

        for raw in &self.sources {
            let spec: SourceSpec = raw.parse()?;
            let info = SourceInfo::from_wav(&spec.path)?;
            timeline.add_source(spec.id(), info)?;
        }

        let end = timeline.end();
        for object in &self.add {
            if let Some(src) = object.kind.source() {
                if timeline.source(src).is_none() {
                    return Err(SpeedcutError::InvalidSourceLabel {
                        label: src.to_string(),
                        reason: "No source registered under this key".to_string(),
                    });
                }
            }
            match object.clone().place(end) {
                Placed::Visual(clip) => timeline.push_visual_layer(vec![clip]),
                Placed::Audio(clip) => timeline.push_audio_layer(vec![clip]),
            }
        }

        Ok(timeline)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{export_pcm, generate_stereo_test_tone};
    use crate::schedule::Speed;
    use crate::timeline::Extent;
    use pretty_assertions::assert_eq;
    use tempfile::tempdir;

    const MINIMAL: &str = r#"{
        "source": "in.wav",
        "chunks": [[0, 15, 0], [15, 30, 1]],
        "speeds": [1.0, 99999]
    }"#;

    #[test]
    fn test_minimal_job_defaults() {
        let job = JobConfig::from_json(MINIMAL).unwrap();
        assert_eq!(job.frame_rate, Timebase::fps(30));
        assert_eq!(job.resolution, Resolution::default());
        assert_eq!(job.background, "#000000");
        assert!(!job.parallel);
        assert_eq!(job.chunks[1], Chunk::new(15, 30, 1));
        assert_eq!(job.speed_table().unwrap().get(1), Some(Speed::Drop));
        assert_eq!(job.output_path(), PathBuf::from("in_ALTERED.wav"));
    }

    #[test]
    fn test_explicit_output() {
        let job = JobConfig::from_json(
            r#"{"source": "a/in.wav", "output": "b/out.wav", "chunks": [[0, 1, 0]], "speeds": [1]}"#,
        )
        .unwrap();
        assert_eq!(job.output_path(), PathBuf::from("b/out.wav"));
    }

    #[test]
    fn test_rejects_gap_in_schedule() {
        let err = JobConfig::from_json(
            r#"{"source": "in.wav", "chunks": [[0, 10, 0], [11, 20, 0]], "speeds": [1]}"#,
        )
        .unwrap_err();
        assert!(matches!(err, SpeedcutError::ScheduleDiscontinuity { .. }));
    }

    #[test]
    fn test_rejects_bad_speed_index_and_zero_speed() {
        let err = JobConfig::from_json(
            r#"{"source": "in.wav", "chunks": [[0, 10, 2]], "speeds": [1]}"#,
        )
        .unwrap_err();
        assert!(matches!(err, SpeedcutError::SpeedIndexOutOfRange { .. }));

        let err = JobConfig::from_json(
            r#"{"source": "in.wav", "chunks": [[0, 10, 0]], "speeds": [0]}"#,
        )
        .unwrap_err();
        assert!(matches!(err, SpeedcutError::InvalidSpeed { .. }));
    }

    #[test]
    fn test_rejects_unknown_fields() {
        let err = JobConfig::from_json(
            r#"{"source": "in.wav", "chunks": [[0, 1, 0]], "speeds": [1], "speed": 2}"#,
        )
        .unwrap_err();
        assert!(matches!(err, SpeedcutError::Serialization(_)));
    }

    #[test]
    fn test_load_missing_file() {
        let err = JobConfig::load(Path::new("/no/such/job.json")).unwrap_err();
        assert!(matches!(err, SpeedcutError::FileNotFound { .. }));
    }

    #[test]
    fn test_timeline_with_extra_objects() {
        let dir = tempdir().unwrap();
        let source = dir.path().join("in.wav");
        let music = dir.path().join("music.wav");
        let tone = generate_stereo_test_tone(440.0, 440.0, 1.0, 48000);
        export_pcm(&tone, &source).unwrap();
        export_pcm(&tone, &music).unwrap();

        let json = serde_json::json!({
            "source": source,
            "frame_rate": { "num": 30, "den": 1 },
            "chunks": [[0, 15, 0], [15, 30, 1]],
            "speeds": [1.0, 2.0],
            "sample_rate": 48000,
            "resolution": { "width": 1280, "height": 720 },
            "sources": [format!("music:{}", music.display())],
            "add": [
                { "kind": "rectangle", "width": 100, "height": 20 },
                { "kind": "text", "content": "Hi", "start": 5, "dur": 10 },
                { "kind": "audio", "src": "music", "volume": 0.5 }
            ]
        });
        let job = JobConfig::from_json(&json.to_string()).unwrap();
        let timeline = job.timeline().unwrap();

        assert_eq!(timeline.resolution.to_string(), "1280x720");
        assert_eq!(timeline.visual_layers().len(), 3);
        assert_eq!(timeline.audio_layers().len(), 2);
        assert_eq!(timeline.sources().count(), 2);

        // Edit is 15 + 7.5 frames; objects without a duration span it
        let rect = &timeline.visual_layers()[1][0];
        assert_eq!((rect.start, rect.dur), (0, 23));
        let text = &timeline.visual_layers()[2][0];
        assert_eq!(text.output_end(), 15);
        let music_clip = &timeline.audio_layers()[1][0];
        assert_eq!(music_clip.volume, 0.5);
        assert_eq!(music_clip.dur, 23);
    }

    #[test]
    fn test_timeline_rejects_unknown_object_source() {
        let dir = tempdir().unwrap();
        let source = dir.path().join("in.wav");
        export_pcm(&generate_stereo_test_tone(440.0, 440.0, 1.0, 48000), &source).unwrap();

        let json = serde_json::json!({
            "source": source,
            "chunks": [[0, 30, 0]],
            "speeds": [1.0],
            "add": [{ "kind": "image", "src": "logo" }]
        });
        let job = JobConfig::from_json(&json.to_string()).unwrap();
        let err = job.timeline().unwrap_err();
        assert!(matches!(err, SpeedcutError::InvalidSourceLabel { .. }));
    }

    #[test]
    fn test_timeline_sample_rate_mismatch() {
        let dir = tempdir().unwrap();
        let source = dir.path().join("in.wav");
        export_pcm(&generate_stereo_test_tone(440.0, 440.0, 1.0, 44100), &source).unwrap();

        let json = serde_json::json!({
            "source": source,
            "chunks": [[0, 30, 0]],
            "speeds": [1.0],
            "sample_rate": 48000
        });
        let job = JobConfig::from_json(&json.to_string()).unwrap();
        assert!(matches!(
            job.timeline().unwrap_err(),
            SpeedcutError::InvalidAudio { .. }
        ));
    }
}
