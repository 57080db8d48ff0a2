//! Timeline clips
//!
//! Positions and durations are in frames of the project timebase. `start`
//! is where a clip lands in output space. For speed-bearing clips `dur`
//! counts source frames read from `offset`, so the clip occupies
//! `dur / speed` output frames; every other clip occupies `dur`.

use num_traits::ToPrimitive;
use serde::{Deserialize, Serialize};

use super::source::SourceId;

/// Output-space extent shared by all clip kinds
pub trait Extent {
    /// Output frame at which the clip finishes
    fn output_end(&self) -> u64;

    /// Output frames the clip plays for
    fn output_len(&self) -> f64;
}

/// `max(1, round(start + dur / speed))`
fn stretched_end(start: u64, dur: u64, speed: f64) -> u64 {
    (start as f64 + dur as f64 / speed)
        .round()
        .to_u64()
        .unwrap_or(0)
        .max(1)
}

fn default_speed() -> f64 {
    1.0
}

fn default_volume() -> f64 {
    1.0
}

fn default_fill() -> String {
    "#c4c4c4".to_string()
}

fn default_opacity() -> f64 {
    1.0
}

/// A clip on a visual layer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VisualClip {
    pub start: u64,
    pub dur: u64,
    #[serde(flatten)]
    pub kind: VisualKind,
}

/// Closed set of visual clip kinds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum VisualKind {
    Video {
        src: SourceId,
        #[serde(default)]
        offset: u64,
        #[serde(default = "default_speed")]
        speed: f64,
        #[serde(default)]
        stream: usize,
    },
    Image {
        src: SourceId,
        #[serde(default)]
        x: i32,
        #[serde(default)]
        y: i32,
        #[serde(default = "default_opacity")]
        opacity: f64,
    },
    Text {
        content: String,
        #[serde(default)]
        x: i32,
        #[serde(default)]
        y: i32,
        #[serde(default = "default_font_size")]
        size: u32,
        #[serde(default = "default_fill")]
        fill: String,
    },
    Rectangle {
        #[serde(default)]
        x: i32,
        #[serde(default)]
        y: i32,
        width: u32,
        height: u32,
        #[serde(default = "default_fill")]
        fill: String,
    },
    Ellipse {
        #[serde(default)]
        x: i32,
        #[serde(default)]
        y: i32,
        width: u32,
        height: u32,
        #[serde(default = "default_fill")]
        fill: String,
    },
}

fn default_font_size() -> u32 {
    55
}

impl VisualClip {
    pub fn video(start: u64, dur: u64, src: SourceId, offset: u64, speed: f64) -> Self {
        Self {
            start,
            dur,
            kind: VisualKind::Video {
                src,
                offset,
                speed,
                stream: 0,
            },
        }
    }

    /// Playback speed, `None` for clips without a source timeline
    pub fn speed(&self) -> Option<f64> {
        match self.kind {
            VisualKind::Video { speed, .. } => Some(speed),
            _ => None,
        }
    }

    /// Source this clip reads from, if any
    pub fn source(&self) -> Option<&SourceId> {
        match &self.kind {
            VisualKind::Video { src, .. } | VisualKind::Image { src, .. } => Some(src),
            _ => None,
        }
    }
}

impl Extent for VisualClip {
    fn output_end(&self) -> u64 {
        match self.speed() {
            Some(speed) => stretched_end(self.start, self.dur, speed),
            None => self.start + self.dur,
        }
    }

    fn output_len(&self) -> f64 {
        match self.speed() {
            Some(speed) => self.dur as f64 / speed,
            None => self.dur as f64,
        }
    }
}

/// A clip on an audio layer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioClip {
    pub start: u64,
    pub dur: u64,
    pub src: SourceId,
    #[serde(default)]
    pub offset: u64,
    #[serde(default = "default_speed")]
    pub speed: f64,
    #[serde(default = "default_volume")]
    pub volume: f64,
    #[serde(default)]
    pub stream: usize,
}

impl AudioClip {
    pub fn new(start: u64, dur: u64, src: SourceId, offset: u64, speed: f64) -> Self {
        Self {
            start,
            dur,
            src,
            offset,
            speed,
            volume: 1.0,
            stream: 0,
        }
    }
}

impl Extent for AudioClip {
    fn output_end(&self) -> u64 {
        stretched_end(self.start, self.dur, self.speed)
    }

    fn output_len(&self) -> f64 {
        self.dur as f64 / self.speed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_video_extent() {
        let clip = VisualClip::video(10, 30, SourceId::Index(0), 0, 2.0);
        assert_eq!(clip.output_end(), 25);
        assert_relative_eq!(clip.output_len(), 15.0);
    }

    #[test]
    fn test_stretched_end_rounds_and_floors_at_one() {
        let clip = VisualClip::video(0, 1, SourceId::Index(0), 0, 4.0);
        assert_eq!(clip.output_end(), 1);

        let clip = AudioClip::new(3, 10, SourceId::Index(0), 0, 3.0);
        assert_eq!(clip.output_end(), 6);
    }

    #[test]
    fn test_static_visual_extent_ignores_speed() {
        let clip = VisualClip {
            start: 5,
            dur: 20,
            kind: VisualKind::Rectangle {
                x: 0,
                y: 0,
                width: 100,
                height: 50,
                fill: default_fill(),
            },
        };
        assert_eq!(clip.speed(), None);
        assert_eq!(clip.output_end(), 25);
        assert_relative_eq!(clip.output_len(), 20.0);
    }

    #[test]
    fn test_visual_clip_json() {
        let clip: VisualClip = serde_json::from_str(
            r#"{"start": 0, "dur": 60, "kind": "text", "content": "Hello"}"#,
        )
        .unwrap();
        assert_eq!(
            clip.kind,
            VisualKind::Text {
                content: "Hello".to_string(),
                x: 0,
                y: 0,
                size: 55,
                fill: "#c4c4c4".to_string(),
            }
        );
        assert_eq!(clip.source(), None);
    }

    #[test]
    fn test_audio_clip_defaults() {
        let clip: AudioClip =
            serde_json::from_str(r#"{"start": 0, "dur": 30, "src": "music"}"#).unwrap();
        assert_eq!(clip.speed, 1.0);
        assert_eq!(clip.volume, 1.0);
        assert_eq!(clip.src, SourceId::Label("music".to_string()));
    }
}
