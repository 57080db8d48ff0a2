//! Chunk-driven audio reconstruction
//!
//! Walks a chunk schedule over a decoded source buffer and builds the audio
//! track of the edited timeline: dropped chunks vanish, unity chunks are
//! copied verbatim and every other chunk goes through the time-stretch
//! processor.
//!
//! The write cursor is a single accumulator, so commits always happen in
//! schedule order. After a stretched chunk the cursor moves by the analytic
//! length `floor(frames * sample_rate / (fps * speed))`, not by whatever the
//! processor produced; this keeps placement identical across processor
//! implementations.

use std::ops::Range;

use num_traits::ToPrimitive;
use rayon::prelude::*;
use tracing::{debug, trace, warn};

use super::buffer::PcmBuffer;
use super::progress::{CancelToken, NoProgress, ProgressSink};
use crate::dsp::{stretch_block, PhaseVocoder, TimeStretch};
use crate::error::{Result, SpeedcutError};
use crate::schedule::{ChunkSchedule, Speed, SpeedTable, Timebase};

/// Over-allocation factor applied to the estimated output length
pub const CAPACITY_MARGIN: f64 = 1.5;

/// Fixed padding added to the estimate, in seconds
pub const CAPACITY_PAD_SECS: u32 = 2;

/// What the engine does with one chunk
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ChunkAction {
    /// Nothing is emitted and the cursor stays put
    Skip,
    /// Source samples are copied unchanged
    Copy,
    /// Source samples are stretched; the cursor moves by `advance`
    Stretch { speed: f64, advance: usize },
}

/// Resolved work for one chunk
#[derive(Debug, Clone, PartialEq)]
pub struct ChunkPlan {
    pub index: usize,
    /// Source sample frames, already clamped to the source length
    pub source: Range<usize>,
    pub action: ChunkAction,
}

impl ChunkPlan {
    /// Cursor advance for this chunk
    pub fn advance(&self) -> usize {
        match self.action {
            ChunkAction::Skip => 0,
            ChunkAction::Copy => self.source.len(),
            ChunkAction::Stretch { advance, .. } => advance,
        }
    }
}

/// Validate inputs and resolve every chunk into a [`ChunkPlan`].
///
/// Runs before any output allocation, so all configuration errors surface
/// here.
pub fn plan_chunks(
    source: &PcmBuffer,
    schedule: &ChunkSchedule,
    speeds: &SpeedTable,
    timebase: Timebase,
) -> Result<Vec<ChunkPlan>> {
    timebase.validate()?;
    schedule.check_speeds(speeds)?;
    if !schedule.has_kept_content(speeds)? {
        return Err(SpeedcutError::EmptyOutput {
            reason: "every chunk is dropped".to_string(),
        });
    }
    if source.sample_rate == 0 {
        return Err(SpeedcutError::InvalidAudio {
            reason: "source reports a sample rate of 0".to_string(),
            source: None,
        });
    }

    let sample_rate = source.sample_rate;
    let source_len = source.len();
    let mut plan = Vec::with_capacity(schedule.len());

    for (index, chunk) in schedule.iter().enumerate() {
        let end = timebase.frames_to_samples(chunk.end, sample_rate).min(source_len);
        let start = timebase.frames_to_samples(chunk.start, sample_rate).min(end);

        let action = if start >= end {
            ChunkAction::Skip
        } else {
            match schedule.speed_of(index, speeds)? {
                Speed::Drop => ChunkAction::Skip,
                speed if speed.is_unity() => ChunkAction::Copy,
                Speed::Keep(m) => ChunkAction::Stretch {
                    speed: m,
                    advance: timebase.stretched_samples(chunk.len(), sample_rate, m)?,
                },
            }
        };

        plan.push(ChunkPlan {
            index,
            source: start..end,
            action,
        });
    }

    if let [only] = plan.as_slice() {
        if only.source.is_empty() {
            return Err(SpeedcutError::EmptyOutput {
                reason: "the only chunk covers no audio samples".to_string(),
            });
        }
    }

    Ok(plan)
}

/// Estimated output length in sample frames, with margin:
/// `floor(secs * sample_rate * 1.5) + 2 * sample_rate`.
pub fn estimate_capacity(output_frames: f64, timebase: Timebase, sample_rate: u32) -> usize {
    let secs = timebase.frames_to_secs(output_frames);
    let estimate = (secs * f64::from(sample_rate) * CAPACITY_MARGIN)
        .floor()
        .to_usize()
        .unwrap_or(0);
    estimate.saturating_add(sample_rate as usize * CAPACITY_PAD_SECS as usize)
}

/// Configurable audio reconstruction engine
pub struct Reconstructor {
    stretcher: Box<dyn TimeStretch>,
    parallel: bool,
    cancel: Option<CancelToken>,
}

impl Default for Reconstructor {
    fn default() -> Self {
        Self::new(Box::new(PhaseVocoder::new(2)))
    }
}

impl Reconstructor {
    pub fn new(stretcher: Box<dyn TimeStretch>) -> Self {
        Self {
            stretcher,
            parallel: false,
            cancel: None,
        }
    }

    /// Stretch chunks on the rayon pool before committing them in order
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Check `token` between chunks
    pub fn with_cancel_token(mut self, token: CancelToken) -> Self {
        self.cancel = Some(token);
        self
    }

    pub fn stretcher(&self) -> &dyn TimeStretch {
        self.stretcher.as_ref()
    }

    /// Rebuild the audio of the edited timeline.
    ///
    /// Either the whole output buffer is returned or an error; no partial
    /// audio ever reaches the caller.
    pub fn run(
        &self,
        source: &PcmBuffer,
        schedule: &ChunkSchedule,
        speeds: &SpeedTable,
        timebase: Timebase,
        progress: &mut dyn ProgressSink,
    ) -> Result<PcmBuffer> {
        if source.channels() != self.stretcher.channels() {
            return Err(SpeedcutError::UnsupportedChannelLayout {
                expected: self.stretcher.channels(),
                found: source.channels(),
            });
        }

        let plan = plan_chunks(source, schedule, speeds, timebase)?;
        let sample_rate = source.sample_rate;
        let expected_frames = schedule.output_frames(speeds)?;
        let capacity = estimate_capacity(expected_frames, timebase, sample_rate);
        let mut output = PcmBuffer::try_zeroed(capacity, source.layout(), sample_rate)?;

        let mut prepared = if self.parallel && speeds.needs_stretch() {
            self.stretch_all(source, &plan)
        } else {
            plan.iter().map(|_| None).collect()
        };

        let total = plan.len();
        let mut cursor = 0usize;
        for (entry, block) in plan.iter().zip(prepared.iter_mut()) {
            if let Some(token) = &self.cancel {
                if token.is_cancelled() {
                    return Err(SpeedcutError::Cancelled {
                        completed: entry.index,
                        total,
                    });
                }
            }

            let committed = self.commit(entry, block.take(), source, &mut output, cursor);
            progress.tick(entry.index, total);
            cursor += committed?;
        }

        if cursor > capacity {
            warn!(cursor, capacity, "output outgrew its estimated capacity");
        }
        output.resize_frames(cursor)?;

        let samples_per_frame = timebase.samples_per_frame(sample_rate);
        debug!(total_samples = cursor, "reconstruction finished");
        debug!(samples_per_frame, "samples per frame");
        debug!(
            expected_frames = cursor as f64 / samples_per_frame,
            "expected video length"
        );

        Ok(output)
    }

    /// Write one chunk at `cursor`; returns the cursor advance
    fn commit(
        &self,
        entry: &ChunkPlan,
        prepared: Option<Result<Vec<i16>>>,
        source: &PcmBuffer,
        output: &mut PcmBuffer,
        cursor: usize,
    ) -> Result<usize> {
        match entry.action {
            ChunkAction::Skip => {}
            ChunkAction::Copy => {
                output.write_frames(cursor, source.frames(entry.source.clone()))?;
            }
            ChunkAction::Stretch { speed, advance } => {
                let block = match prepared {
                    Some(block) => block?,
                    None => stretch_block(
                        self.stretcher.as_ref(),
                        source.frames(entry.source.clone()),
                        speed,
                    )?,
                };
                trace!(
                    chunk = entry.index,
                    expected = advance,
                    produced = block.len() / source.channels(),
                    "stretched chunk"
                );
                output.write_frames(cursor, &block)?;
            }
        }
        Ok(entry.advance())
    }

    /// Stretch every chunk that needs it, in parallel.
    ///
    /// Failures are kept per chunk and surface during the ordered commit.
    fn stretch_all(
        &self,
        source: &PcmBuffer,
        plan: &[ChunkPlan],
    ) -> Vec<Option<Result<Vec<i16>>>> {
        let stretcher = self.stretcher.as_ref();
        plan.par_iter()
            .map(|entry| match entry.action {
                ChunkAction::Stretch { speed, .. } => Some(stretch_block(
                    stretcher,
                    source.frames(entry.source.clone()),
                    speed,
                )),
                _ => None,
            })
            .collect()
    }
}

/// Rebuild the audio of the edited timeline with the default phase vocoder
/// and no progress reporting.
pub fn reconstruct(
    source: &PcmBuffer,
    schedule: &ChunkSchedule,
    speeds: &SpeedTable,
    timebase: Timebase,
) -> Result<PcmBuffer> {
    Reconstructor::default().run(source, schedule, speeds, timebase, &mut NoProgress)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::buffer::ChannelLayout;
    use pretty_assertions::assert_eq;

    /// Stereo ramp where every sample value encodes its own position
    fn ramp(frames: usize, sample_rate: u32) -> PcmBuffer {
        let samples = (0..frames)
            .flat_map(|i| {
                let v = (i % 30000) as i16;
                [v, -v]
            })
            .collect();
        PcmBuffer::from_interleaved(samples, ChannelLayout::Stereo, sample_rate).unwrap()
    }

    fn speeds() -> SpeedTable {
        SpeedTable::new(vec![Speed::UNITY, Speed::Keep(2.0), Speed::Drop]).unwrap()
    }

    #[test]
    fn test_plan_ranges_tile_the_source() {
        let source = ramp(48000, 48000);
        let schedule = ChunkSchedule::from_triples(&[(0, 7, 0), (7, 13, 2), (13, 30, 1)]).unwrap();
        let plan = plan_chunks(&source, &schedule, &speeds(), Timebase::fps(30)).unwrap();

        assert_eq!(plan[0].source, 0..11200);
        assert_eq!(plan[1].source, 11200..20800);
        assert_eq!(plan[2].source, 20800..48000);
        assert_eq!(plan[0].action, ChunkAction::Copy);
        assert_eq!(plan[1].action, ChunkAction::Skip);
        assert_eq!(
            plan[2].action,
            ChunkAction::Stretch {
                speed: 2.0,
                advance: 13600
            }
        );
    }

    #[test]
    fn test_plan_clamps_to_source_length() {
        let source = ramp(1000, 48000);
        let schedule = ChunkSchedule::from_triples(&[(0, 1, 0), (1, 30, 0)]).unwrap();
        let plan = plan_chunks(&source, &schedule, &speeds(), Timebase::fps(30)).unwrap();
        assert_eq!(plan[0].source, 0..1000);
        assert_eq!(plan[1].source, 1000..1000);
        assert_eq!(plan[1].action, ChunkAction::Skip);
    }

    #[test]
    fn test_all_dropped_is_rejected() {
        let source = ramp(48000, 48000);
        let schedule = ChunkSchedule::from_triples(&[(0, 30, 2)]).unwrap();
        let err = plan_chunks(&source, &schedule, &speeds(), Timebase::fps(30)).unwrap_err();
        assert!(matches!(err, SpeedcutError::EmptyOutput { .. }));
    }

    #[test]
    fn test_single_chunk_without_samples_is_rejected() {
        // One frame at 30fps is less than one sample at 10Hz
        let source = ramp(100, 10);
        let schedule = ChunkSchedule::from_triples(&[(0, 1, 0)]).unwrap();
        let err = plan_chunks(&source, &schedule, &speeds(), Timebase::fps(30)).unwrap_err();
        assert!(matches!(err, SpeedcutError::EmptyOutput { .. }));
    }

    #[test]
    fn test_empty_range_among_many_is_absorbed() {
        let source = ramp(100, 10);
        let schedule = ChunkSchedule::from_triples(&[(0, 1, 0), (1, 90, 0)]).unwrap();
        let out = reconstruct(&source, &schedule, &speeds(), Timebase::fps(30)).unwrap();
        assert_eq!(out.len(), 30);
    }

    #[test]
    fn test_out_of_range_speed_index() {
        let source = ramp(48000, 48000);
        let schedule = ChunkSchedule::from_triples(&[(0, 30, 5)]).unwrap();
        let err = reconstruct(&source, &schedule, &speeds(), Timebase::fps(30)).unwrap_err();
        assert!(matches!(err, SpeedcutError::SpeedIndexOutOfRange { .. }));
    }

    #[test]
    fn test_mono_source_is_rejected() {
        let source = PcmBuffer::new(48000, ChannelLayout::Mono, 48000);
        let schedule = ChunkSchedule::from_triples(&[(0, 30, 0)]).unwrap();
        let err = reconstruct(&source, &schedule, &speeds(), Timebase::fps(30)).unwrap_err();
        assert!(matches!(
            err,
            SpeedcutError::UnsupportedChannelLayout {
                expected: 2,
                found: 1
            }
        ));
    }

    #[test]
    fn test_default_stretcher() {
        let reconstructor = Reconstructor::default();
        assert_eq!(reconstructor.stretcher().name(), "phase_vocoder");
        assert_eq!(reconstructor.stretcher().channels(), 2);
    }

    #[test]
    fn test_estimate_capacity() {
        // 15 frames at 30fps = 0.5s -> 24000 * 1.5 + 96000
        assert_eq!(estimate_capacity(15.0, Timebase::fps(30), 48000), 132000);
        assert_eq!(estimate_capacity(0.0, Timebase::fps(30), 48000), 96000);
    }

    #[test]
    fn test_drop_keeps_cursor() {
        let source = ramp(48000, 48000);
        let schedule = ChunkSchedule::from_triples(&[(0, 10, 0), (10, 20, 2), (20, 30, 0)]).unwrap();
        let out = reconstruct(&source, &schedule, &speeds(), Timebase::fps(30)).unwrap();

        assert_eq!(out.len(), 32000);
        assert_eq!(out.frames(0..16000), source.frames(0..16000));
        assert_eq!(out.frames(16000..32000), source.frames(32000..48000));
    }

    #[test]
    fn test_progress_ticks_once_per_chunk() {
        let source = ramp(48000, 48000);
        let schedule = ChunkSchedule::from_triples(&[(0, 10, 0), (10, 20, 2), (20, 30, 1)]).unwrap();
        let mut ticks = Vec::new();
        let mut sink = |i: usize, t: usize| ticks.push((i, t));
        Reconstructor::default()
            .run(&source, &schedule, &speeds(), Timebase::fps(30), &mut sink)
            .unwrap();
        assert_eq!(ticks, vec![(0, 3), (1, 3), (2, 3)]);
    }

    #[test]
    fn test_cancelled_before_start() {
        let source = ramp(48000, 48000);
        let schedule = ChunkSchedule::from_triples(&[(0, 30, 0)]).unwrap();
        let token = CancelToken::new();
        token.cancel();
        let err = Reconstructor::default()
            .with_cancel_token(token)
            .run(&source, &schedule, &speeds(), Timebase::fps(30), &mut NoProgress)
            .unwrap_err();
        assert!(matches!(
            err,
            SpeedcutError::Cancelled {
                completed: 0,
                total: 1
            }
        ));
    }
}
