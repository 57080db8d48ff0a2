//! Timeline data model
//!
//! A timeline owns its sources, a timebase, layered visual and audio clips
//! and, when it was built from an edit, the chunk schedule behind it.
//! `end` and `out_len` are derived from the clip lists on every call, so
//! they always reflect the current layers.

mod clip;
mod source;

use std::collections::BTreeMap;
use std::fmt;

use num_traits::ToPrimitive;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Result, SpeedcutError};
use crate::schedule::{ChunkSchedule, Speed, SpeedTable, Timebase};

pub use clip::{AudioClip, Extent, VisualClip, VisualKind};
pub use source::{
    validate_label, SourceId, SourceInfo, SourceSpec, ILLEGAL_LABEL_CHARS, MAX_LABEL_LEN,
};

/// Default background colour
pub const DEFAULT_BACKGROUND: &str = "#000000";

/// Output display resolution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Default for Resolution {
    fn default() -> Self {
        Self {
            width: 1920,
            height: 1080,
        }
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Layered edit of one or more sources
#[derive(Debug, Clone)]
pub struct Timeline {
    sources: BTreeMap<SourceId, SourceInfo>,
    pub timebase: Timebase,
    pub sample_rate: u32,
    pub resolution: Resolution,
    pub background: String,
    visual: Vec<Vec<VisualClip>>,
    audio: Vec<Vec<AudioClip>>,
    chunks: Option<(ChunkSchedule, SpeedTable)>,
}

impl Timeline {
    /// Create an empty timeline
    pub fn new(timebase: Timebase, sample_rate: u32, resolution: Resolution) -> Self {
        Self {
            sources: BTreeMap::new(),
            timebase,
            sample_rate,
            resolution,
            background: DEFAULT_BACKGROUND.to_string(),
            visual: Vec::new(),
            audio: Vec::new(),
            chunks: None,
        }
    }

    /// Build the timeline of an edit: one video layer and one audio layer,
    /// with a clip per kept chunk placed back to back.
    pub fn from_schedule(
        info: SourceInfo,
        schedule: ChunkSchedule,
        speeds: SpeedTable,
        timebase: Timebase,
    ) -> Result<Self> {
        timebase.validate()?;
        schedule.check_speeds(&speeds)?;

        let src = SourceId::Index(0);
        let mut timeline = Self::new(timebase, info.sample_rate, Resolution::default());
        timeline.add_source(src.clone(), info)?;

        let mut video = Vec::new();
        let mut audio = Vec::new();
        let mut position = 0u64;
        for (index, chunk) in schedule.iter().enumerate() {
            let speed = match schedule.speed_of(index, &speeds)? {
                Speed::Drop => continue,
                Speed::Keep(m) => m,
            };
            let dur = chunk.len();
            video.push(VisualClip::video(position, dur, src.clone(), chunk.start, speed));
            audio.push(AudioClip::new(position, dur, src.clone(), chunk.start, speed));
            position = (dur as f64 / speed)
                .round()
                .to_u64()
                .and_then(|step| position.checked_add(step))
                .ok_or(SpeedcutError::CapacityExceeded {
                    requested: usize::MAX,
                })?;
        }
        debug!(
            clips = video.len(),
            chunks = schedule.len(),
            "built timeline from schedule"
        );

        timeline.visual.push(video);
        timeline.audio.push(audio);
        timeline.chunks = Some((schedule, speeds));
        Ok(timeline)
    }

    /// Register a source; keys must be unique
    pub fn add_source(&mut self, id: SourceId, info: SourceInfo) -> Result<()> {
        if self.sources.contains_key(&id) {
            return Err(SpeedcutError::DuplicateSource {
                key: id.to_string(),
            });
        }
        self.sources.insert(id, info);
        Ok(())
    }

    pub fn source(&self, id: &SourceId) -> Option<&SourceInfo> {
        self.sources.get(id)
    }

    pub fn sources(&self) -> impl Iterator<Item = (&SourceId, &SourceInfo)> {
        self.sources.iter()
    }

    pub fn push_visual_layer(&mut self, clips: Vec<VisualClip>) {
        self.visual.push(clips);
    }

    pub fn push_audio_layer(&mut self, clips: Vec<AudioClip>) {
        self.audio.push(clips);
    }

    pub fn visual_layers(&self) -> &[Vec<VisualClip>] {
        &self.visual
    }

    pub fn audio_layers(&self) -> &[Vec<AudioClip>] {
        &self.audio
    }

    pub fn audio_layer_mut(&mut self, index: usize) -> Option<&mut Vec<AudioClip>> {
        self.audio.get_mut(index)
    }

    /// The schedule this timeline was realized from
    pub fn chunks(&self) -> Option<(&ChunkSchedule, &SpeedTable)> {
        self.chunks.as_ref().map(|(c, s)| (c, s))
    }

    /// Latest output frame at which any layer's last clip finishes
    pub fn end(&self) -> u64 {
        let visual = self.visual.iter().map(|layer| last_end(layer));
        let audio = self.audio.iter().map(|layer| last_end(layer));
        visual.chain(audio).max().unwrap_or(0)
    }

    /// Playback length of the longest layer, in frames
    pub fn out_len(&self) -> f64 {
        let visual = self.visual.iter().map(|layer| total_len(layer));
        let audio = self.audio.iter().map(|layer| total_len(layer));
        visual.chain(audio).fold(0.0, f64::max)
    }

    /// `out_len` in seconds
    pub fn duration_secs(&self) -> f64 {
        self.timebase.frames_to_secs(self.out_len())
    }
}

fn last_end<C: Extent>(layer: &[C]) -> u64 {
    layer.last().map(Extent::output_end).unwrap_or(0)
}

fn total_len<C: Extent>(layer: &[C]) -> f64 {
    layer.iter().map(Extent::output_len).sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use pretty_assertions::assert_eq;
    use std::path::PathBuf;

    fn info() -> SourceInfo {
        SourceInfo {
            path: PathBuf::from("input.wav"),
            sample_rate: 48000,
            bits_per_sample: 16,
            channels: 2,
            num_samples: 48000,
            duration_secs: 1.0,
        }
    }

    fn rect(start: u64, dur: u64) -> VisualClip {
        VisualClip {
            start,
            dur,
            kind: VisualKind::Rectangle {
                x: 0,
                y: 0,
                width: 10,
                height: 10,
                fill: "#fff".to_string(),
            },
        }
    }

    #[test]
    fn test_empty_timeline() {
        let mut timeline = Timeline::new(Timebase::default(), 48000, Resolution::default());
        assert_eq!(timeline.end(), 0);
        assert_eq!(timeline.out_len(), 0.0);

        timeline.push_visual_layer(Vec::new());
        timeline.push_audio_layer(Vec::new());
        assert_eq!(timeline.end(), 0);
        assert_eq!(timeline.out_len(), 0.0);
    }

    #[test]
    fn test_mixed_layers() {
        let src = SourceId::Index(0);
        let mut timeline = Timeline::new(Timebase::default(), 48000, Resolution::default());
        timeline.push_visual_layer(vec![
            VisualClip::video(0, 30, src.clone(), 0, 1.0),
            VisualClip::video(30, 30, src.clone(), 60, 2.0),
        ]);
        timeline.push_visual_layer(vec![rect(0, 10), rect(50, 10)]);
        timeline.push_audio_layer(vec![AudioClip::new(0, 90, src, 0, 1.5)]);

        // video: 30 + 15 = 45 ends at 45; rect layer sums 20 but ends at 60
        assert_eq!(timeline.end(), 60);
        assert_relative_eq!(timeline.out_len(), 60.0);
    }

    #[test]
    fn test_end_and_out_len_are_independent() {
        let mut timeline = Timeline::new(Timebase::default(), 48000, Resolution::default());
        timeline.push_visual_layer(vec![rect(100, 10)]);
        assert_eq!(timeline.end(), 110);
        assert_relative_eq!(timeline.out_len(), 10.0);
    }

    #[test]
    fn test_aggregates_follow_mutation() {
        let src = SourceId::Index(0);
        let mut timeline = Timeline::new(Timebase::default(), 48000, Resolution::default());
        timeline.push_audio_layer(vec![AudioClip::new(0, 30, src.clone(), 0, 1.0)]);
        assert_eq!(timeline.end(), 30);

        // Appending out of order: end follows the last clip only
        let layer = timeline.audio_layer_mut(0).unwrap();
        layer.push(AudioClip::new(5, 10, src, 0, 1.0));
        assert_eq!(timeline.end(), 15);
        assert_relative_eq!(timeline.out_len(), 40.0);
    }

    #[test]
    fn test_duplicate_source_rejected() {
        let mut timeline = Timeline::new(Timebase::default(), 48000, Resolution::default());
        timeline
            .add_source(SourceId::Label("music".to_string()), info())
            .unwrap();
        let err = timeline
            .add_source(SourceId::Label("music".to_string()), info())
            .unwrap_err();
        assert!(matches!(err, SpeedcutError::DuplicateSource { .. }));
        assert_eq!(timeline.sources().count(), 1);
    }

    #[test]
    fn test_from_schedule_places_clips_back_to_back() {
        let schedule = ChunkSchedule::from_triples(&[(0, 15, 0), (15, 30, 2), (30, 60, 1)]).unwrap();
        let speeds = SpeedTable::new(vec![Speed::UNITY, Speed::Keep(2.0), Speed::Drop]).unwrap();
        let expected = schedule.output_frames(&speeds).unwrap();

        let timeline = Timeline::from_schedule(info(), schedule, speeds, Timebase::fps(30)).unwrap();

        let video = &timeline.visual_layers()[0];
        assert_eq!(video.len(), 2);
        assert_eq!(video[0], VisualClip::video(0, 15, SourceId::Index(0), 0, 1.0));
        assert_eq!(video[1], VisualClip::video(15, 30, SourceId::Index(0), 30, 2.0));

        let audio = &timeline.audio_layers()[0];
        assert_eq!(audio[1].offset, 30);
        assert_eq!(audio[1].start, 15);

        assert_eq!(timeline.end(), 30);
        assert_relative_eq!(timeline.out_len(), expected);
        assert_relative_eq!(timeline.duration_secs(), 1.0);
        assert!(timeline.chunks().is_some());
        assert_eq!(timeline.sample_rate, 48000);
    }

    #[test]
    fn test_from_schedule_rejects_bad_speed_index() {
        let schedule = ChunkSchedule::from_triples(&[(0, 30, 3)]).unwrap();
        let speeds = SpeedTable::new(vec![Speed::UNITY]).unwrap();
        let err = Timeline::from_schedule(info(), schedule, speeds, Timebase::fps(30)).unwrap_err();
        assert!(matches!(err, SpeedcutError::SpeedIndexOutOfRange { .. }));
    }

    #[test]
    fn test_from_schedule_position_overflow() {
        let schedule = ChunkSchedule::from_triples(&[(0, 15, 0), (15, 30, 0)]).unwrap();
        let speeds = SpeedTable::from_multipliers(&[1e-300]).unwrap();
        let err = Timeline::from_schedule(info(), schedule, speeds, Timebase::fps(30)).unwrap_err();
        assert!(matches!(err, SpeedcutError::CapacityExceeded { .. }));
    }

    #[test]
    fn test_resolution_display() {
        assert_eq!(Resolution::default().to_string(), "1920x1080");
    }
}
