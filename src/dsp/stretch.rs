//! Time-stretch capability
//!
//! A time-stretch processor changes the duration of a PCM block while
//! keeping its pitch. It pulls interleaved frames from a [`BlockReader`]
//! and pushes them to a [`BlockWriter`], so a chunk never has to exist in
//! memory twice. For a speed `s` the output holds roughly `input / s`
//! frames.

use crate::error::{Result, SpeedcutError};

/// Block-wise source of interleaved i16 frames
pub trait BlockReader {
    /// Channel count of the frames this reader yields
    fn channels(&self) -> usize;

    /// Fill `out` with up to `out.len() / channels()` frames.
    ///
    /// Returns the number of frames written, 0 once the input is exhausted.
    fn read(&mut self, out: &mut [i16]) -> Result<usize>;
}

/// Block-wise sink of interleaved i16 frames
pub trait BlockWriter {
    /// Channel count this writer expects
    fn channels(&self) -> usize;

    /// Append a block of whole frames
    fn write(&mut self, block: &[i16]) -> Result<()>;
}

/// Pitch-preserving time-stretch processor
///
/// Implementations keep no state between runs, so one instance can serve
/// several chunks at once.
pub trait TimeStretch: Send + Sync {
    /// Get the processor type identifier
    fn name(&self) -> &'static str;

    /// Channel count the processor is configured for
    fn channels(&self) -> usize;

    /// Stretch everything `reader` yields by `speed` into `writer`.
    ///
    /// Returns the number of frames written.
    fn run(
        &self,
        speed: f64,
        reader: &mut dyn BlockReader,
        writer: &mut dyn BlockWriter,
    ) -> Result<usize>;
}

/// Reads frames from a borrowed interleaved slice
#[derive(Debug)]
pub struct SliceReader<'a> {
    data: &'a [i16],
    channels: usize,
    position: usize,
}

impl<'a> SliceReader<'a> {
    pub fn new(data: &'a [i16], channels: usize) -> Result<Self> {
        if channels == 0 || data.len() % channels != 0 {
            return Err(SpeedcutError::UnsupportedChannelLayout {
                expected: channels,
                found: if channels == 0 { 0 } else { data.len() % channels },
            });
        }
        Ok(Self {
            data,
            channels,
            position: 0,
        })
    }
}

impl BlockReader for SliceReader<'_> {
    fn channels(&self) -> usize {
        self.channels
    }

    fn read(&mut self, out: &mut [i16]) -> Result<usize> {
        let wanted = out.len() / self.channels * self.channels;
        let available = self.data.len() - self.position;
        let count = wanted.min(available);
        out[..count].copy_from_slice(&self.data[self.position..self.position + count]);
        self.position += count;
        Ok(count / self.channels)
    }
}

/// Collects written frames into a growable vector
#[derive(Debug, Default)]
pub struct VecWriter {
    data: Vec<i16>,
    channels: usize,
}

impl VecWriter {
    pub fn new(channels: usize) -> Self {
        Self {
            data: Vec::new(),
            channels,
        }
    }

    pub fn with_capacity(channels: usize, frames: usize) -> Self {
        Self {
            data: Vec::with_capacity(frames * channels),
            channels,
        }
    }

    /// Frames written so far
    pub fn len(&self) -> usize {
        if self.channels == 0 {
            0
        } else {
            self.data.len() / self.channels
        }
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn into_inner(self) -> Vec<i16> {
        self.data
    }
}

impl BlockWriter for VecWriter {
    fn channels(&self) -> usize {
        self.channels
    }

    fn write(&mut self, block: &[i16]) -> Result<()> {
        if self.channels == 0 || block.len() % self.channels != 0 {
            return Err(SpeedcutError::stretch(format!(
                "Block of {} samples is not a whole number of {}-channel frames",
                block.len(),
                self.channels
            )));
        }
        self.data.extend_from_slice(block);
        Ok(())
    }
}

/// Stretch an in-memory interleaved block and return the new block
pub fn stretch_block(stretcher: &dyn TimeStretch, block: &[i16], speed: f64) -> Result<Vec<i16>> {
    let channels = stretcher.channels();
    let mut reader = SliceReader::new(block, channels)?;
    let expected = if speed.is_finite() && speed > 0.0 {
        (block.len() as f64 / channels as f64 / speed) as usize
    } else {
        0
    };
    let mut writer = VecWriter::with_capacity(channels, expected);
    stretcher.run(speed, &mut reader, &mut writer)?;
    Ok(writer.into_inner())
}
