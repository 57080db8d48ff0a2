//! Project timebase and the canonical frame-to-sample conversion
//!
//! Every component that turns frame numbers into audio sample positions goes
//! through [`Timebase::frames_to_samples`] or [`Timebase::stretched_samples`].
//! Both truncate toward zero.

use std::fmt;
use std::str::FromStr;

use num_traits::ToPrimitive;
use serde::{Deserialize, Serialize};

use crate::error::{Result, SpeedcutError};

/// Frame rate used when no source provides one
pub const DEFAULT_FRAME_RATE: u32 = 30;

/// Rational frame rate (`num / den` frames per second)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Timebase {
    /// Numerator (frames), must be non-zero
    pub num: u32,
    /// Denominator (seconds), must be non-zero
    pub den: u32,
}

impl Timebase {
    /// Create a validated timebase
    pub fn new(num: u32, den: u32) -> Result<Self> {
        let tb = Self { num, den };
        tb.validate()?;
        Ok(tb)
    }

    /// Integer frame rate, e.g. `Timebase::fps(30)`
    pub const fn fps(num: u32) -> Self {
        Self { num, den: 1 }
    }

    pub fn validate(&self) -> Result<()> {
        if self.num == 0 || self.den == 0 {
            return Err(SpeedcutError::InvalidTimebase {
                num: self.num,
                den: self.den,
            });
        }
        Ok(())
    }

    /// Frames per second as a float
    #[inline]
    pub fn as_f64(&self) -> f64 {
        f64::from(self.num) / f64::from(self.den)
    }

    /// Audio samples covered by one video frame
    #[inline]
    pub fn samples_per_frame(&self, sample_rate: u32) -> f64 {
        f64::from(sample_rate) * f64::from(self.den) / f64::from(self.num)
    }

    /// Convert a frame count to seconds
    #[inline]
    pub fn frames_to_secs(&self, frames: f64) -> f64 {
        frames * f64::from(self.den) / f64::from(self.num)
    }

    /// Convert a frame position to a sample position.
    ///
    /// `floor(frames * sample_rate * den / num)`, evaluated in integer
    /// arithmetic so the result never depends on float rounding. Two
    /// adjacent frame boundaries therefore map to adjacent sample boundaries
    /// with no gap or overlap between them.
    #[inline]
    pub fn frames_to_samples(&self, frames: u64, sample_rate: u32) -> usize {
        let scaled = u128::from(frames) * u128::from(sample_rate) * u128::from(self.den);
        (scaled / u128::from(self.num.max(1)))
            .to_usize()
            .unwrap_or(usize::MAX)
    }

    /// Number of samples a span of `frames` occupies after playing it at
    /// `speed`: `floor(frames * sample_rate * den / (num * speed))`.
    ///
    /// Fails with `InvalidSpeed` for non-finite or non-positive speeds and
    /// with `CapacityExceeded` when the result does not fit a `usize`.
    pub fn stretched_samples(&self, frames: u64, sample_rate: u32, speed: f64) -> Result<usize> {
        if !speed.is_finite() || speed <= 0.0 {
            return Err(SpeedcutError::InvalidSpeed { value: speed });
        }
        let scaled = u128::from(frames) * u128::from(sample_rate) * u128::from(self.den);
        let exact = scaled.to_f64().unwrap_or(f64::MAX) / (f64::from(self.num.max(1)) * speed);
        exact
            .floor()
            .to_usize()
            .ok_or(SpeedcutError::CapacityExceeded {
                requested: usize::MAX,
            })
    }
}

impl Default for Timebase {
    fn default() -> Self {
        Self::fps(DEFAULT_FRAME_RATE)
    }
}

impl fmt::Display for Timebase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.den == 1 {
            write!(f, "{}", self.num)
        } else {
            write!(f, "{}/{}", self.num, self.den)
        }
    }
}

impl FromStr for Timebase {
    type Err = SpeedcutError;

    /// Accepts `30` or `30000/1001`
    fn from_str(s: &str) -> Result<Self> {
        let invalid = || SpeedcutError::InvalidTimebase { num: 0, den: 0 };
        let (num, den) = match s.trim().split_once('/') {
            Some((n, d)) => (
                n.trim().parse::<u32>().map_err(|_| invalid())?,
                d.trim().parse::<u32>().map_err(|_| invalid())?,
            ),
            None => (s.trim().parse::<u32>().map_err(|_| invalid())?, 1),
        };
        Timebase::new(num, den)
    }
}
