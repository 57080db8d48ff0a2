//! PCM Buffer Management
//!
//! Provides the 16-bit interleaved buffer used for both the decoded source
//! audio and the reconstructed output. Lengths are counted in sample frames
//! (one value per channel).

use std::ops::Range;

use crate::error::{Result, SpeedcutError};

/// Default sample rate when nothing else is known (48kHz)
pub const DEFAULT_SAMPLE_RATE: u32 = 48000;

/// Full-scale value used when converting i16 samples to float
pub const I16_FULL_SCALE: f32 = 32768.0;

// ============================================================================
// Channel Layout
// ============================================================================

/// Audio channel configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ChannelLayout {
    /// Single channel (mono)
    Mono,
    /// Two channels (stereo: left, right)
    #[default]
    Stereo,
}

impl ChannelLayout {
    /// Returns the number of channels for this layout
    pub fn num_channels(&self) -> usize {
        match self {
            ChannelLayout::Mono => 1,
            ChannelLayout::Stereo => 2,
        }
    }

    /// Create a ChannelLayout from a channel count
    pub fn from_count(count: usize) -> Option<Self> {
        match count {
            1 => Some(ChannelLayout::Mono),
            2 => Some(ChannelLayout::Stereo),
            _ => None,
        }
    }
}

// ============================================================================
// Sample conversion
// ============================================================================

/// Convert a 16-bit sample to float in [-1.0, 1.0)
#[inline]
pub fn i16_to_f32(sample: i16) -> f32 {
    f32::from(sample) / I16_FULL_SCALE
}

/// Convert a float sample to 16-bit, rounding and clamping to the i16 range
#[inline]
pub fn f32_to_i16(sample: f32) -> i16 {
    (sample * I16_FULL_SCALE).round().clamp(-32768.0, 32767.0) as i16
}

// ============================================================================
// PCM Buffer
// ============================================================================

/// Interleaved 16-bit PCM audio
///
/// # Example
/// ```
/// use speedcut::engine::{ChannelLayout, PcmBuffer};
///
/// // 1 second of stereo silence
/// let buffer = PcmBuffer::new(48000, ChannelLayout::Stereo, 48000);
/// assert_eq!(buffer.channels(), 2);
/// assert_eq!(buffer.len(), 48000);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PcmBuffer {
    /// Interleaved samples (L, R, L, R, ... for stereo)
    samples: Vec<i16>,
    layout: ChannelLayout,
    /// Sample rate in Hz
    pub sample_rate: u32,
}

impl PcmBuffer {
    /// Create a zero-filled buffer of `num_frames` sample frames
    pub fn new(num_frames: usize, layout: ChannelLayout, sample_rate: u32) -> Self {
        Self {
            samples: vec![0; num_frames * layout.num_channels()],
            layout,
            sample_rate,
        }
    }

    /// Like [`PcmBuffer::new`] but reports allocation failure instead of
    /// aborting
    pub fn try_zeroed(num_frames: usize, layout: ChannelLayout, sample_rate: u32) -> Result<Self> {
        let mut buffer = Self {
            samples: Vec::new(),
            layout,
            sample_rate,
        };
        buffer.resize_frames(num_frames)?;
        Ok(buffer)
    }

    /// Create a buffer from interleaved sample data
    ///
    /// # Returns
    /// Error if the data length is not a multiple of the channel count
    pub fn from_interleaved(
        samples: Vec<i16>,
        layout: ChannelLayout,
        sample_rate: u32,
    ) -> Result<Self> {
        let num_channels = layout.num_channels();
        if samples.len() % num_channels != 0 {
            return Err(SpeedcutError::InvalidAudio {
                reason: format!(
                    "Interleaved data length {} is not divisible by channel count {}",
                    samples.len(),
                    num_channels
                ),
                source: None,
            });
        }
        Ok(Self {
            samples,
            layout,
            sample_rate,
        })
    }

    /// Get the number of channels
    #[inline]
    pub fn channels(&self) -> usize {
        self.layout.num_channels()
    }

    #[inline]
    pub fn layout(&self) -> ChannelLayout {
        self.layout
    }

    /// Get the number of sample frames
    #[inline]
    pub fn len(&self) -> usize {
        self.samples.len() / self.channels()
    }

    /// Check if the buffer holds no frames
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Get the duration in seconds
    #[inline]
    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.len() as f64 / f64::from(self.sample_rate)
    }

    /// All samples, interleaved
    #[inline]
    pub fn as_interleaved(&self) -> &[i16] {
        &self.samples
    }

    /// Interleaved samples of a frame range, clamped to the buffer
    pub fn frames(&self, range: Range<usize>) -> &[i16] {
        let len = self.len();
        let end = range.end.min(len);
        let start = range.start.min(end);
        let ch = self.channels();
        &self.samples[start * ch..end * ch]
    }

    /// Get a sample at the specified channel and frame index
    #[inline]
    pub fn get_sample(&self, channel: usize, index: usize) -> Option<i16> {
        if channel >= self.channels() {
            return None;
        }
        self.samples.get(index * self.channels() + channel).copied()
    }

    /// RMS level of all samples, normalized to full scale
    pub fn rms(&self) -> f64 {
        if self.samples.is_empty() {
            return 0.0;
        }
        let sum_squares: f64 = self
            .samples
            .iter()
            .map(|&s| {
                let v = f64::from(i16_to_f32(s));
                v * v
            })
            .sum();
        (sum_squares / self.samples.len() as f64).sqrt()
    }

    /// Write interleaved `block` starting at frame `frame`, growing the
    /// buffer (zero-filled) when the write runs past the current end.
    pub fn write_frames(&mut self, frame: usize, block: &[i16]) -> Result<()> {
        let ch = self.channels();
        if block.len() % ch != 0 {
            return Err(SpeedcutError::InvalidAudio {
                reason: format!(
                    "Block of {} samples does not match {} channels",
                    block.len(),
                    ch
                ),
                source: None,
            });
        }
        let overflow = || SpeedcutError::CapacityExceeded {
            requested: usize::MAX,
        };
        let start = frame.checked_mul(ch).ok_or_else(overflow)?;
        let end = start.checked_add(block.len()).ok_or_else(overflow)?;
        if end > self.samples.len() {
            self.resize_frames(end / ch)?;
        }
        self.samples[start..end].copy_from_slice(block);
        Ok(())
    }

    /// Truncate or zero-extend to exactly `num_frames` frames
    pub fn resize_frames(&mut self, num_frames: usize) -> Result<()> {
        let exceeded = SpeedcutError::CapacityExceeded {
            requested: num_frames,
        };
        let target = match num_frames.checked_mul(self.channels()) {
            Some(target) => target,
            None => return Err(exceeded),
        };
        if target > self.samples.len() {
            self.samples
                .try_reserve(target - self.samples.len())
                .map_err(|_| exceeded)?;
        }
        self.samples.resize(target, 0);
        Ok(())
    }
}

impl Default for PcmBuffer {
    fn default() -> Self {
        Self::new(0, ChannelLayout::Stereo, DEFAULT_SAMPLE_RATE)
    }
}

// ============================================================================
// Tests
// ============================================================================
