//! Speed table: playback multipliers indexed by chunk

use serde::{Deserialize, Serialize};

use crate::error::{Result, SpeedcutError};

/// Numeric value older job files use to mark a dropped segment.
/// Any multiplier at or above it loads as [`Speed::Drop`].
pub const LEGACY_DROP_SENTINEL: f64 = 99999.0;

/// One entry of the speed table
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "f64", into = "f64")]
pub enum Speed {
    /// Play the segment at this multiplier (1.0 = unchanged)
    Keep(f64),
    /// Omit the segment from the output entirely
    Drop,
}

impl Speed {
    /// Unity playback
    pub const UNITY: Speed = Speed::Keep(1.0);

    /// Create a validated playback multiplier
    pub fn keep(multiplier: f64) -> Result<Self> {
        if !multiplier.is_finite() || multiplier <= 0.0 {
            return Err(SpeedcutError::InvalidSpeed { value: multiplier });
        }
        Ok(Speed::Keep(multiplier))
    }

    /// Interpret a raw number, mapping the legacy sentinel to `Drop`
    pub fn from_multiplier(value: f64) -> Result<Self> {
        if value >= LEGACY_DROP_SENTINEL {
            return Ok(Speed::Drop);
        }
        Self::keep(value)
    }

    #[inline]
    pub fn is_drop(&self) -> bool {
        matches!(self, Speed::Drop)
    }

    /// Exactly 1.0; such chunks are copied without stretching
    #[inline]
    pub fn is_unity(&self) -> bool {
        matches!(self, Speed::Keep(m) if *m == 1.0)
    }

    /// The multiplier, or `None` for dropped segments
    #[inline]
    pub fn multiplier(&self) -> Option<f64> {
        match self {
            Speed::Keep(m) => Some(*m),
            Speed::Drop => None,
        }
    }
}

impl TryFrom<f64> for Speed {
    type Error = SpeedcutError;

    fn try_from(value: f64) -> Result<Self> {
        Speed::from_multiplier(value)
    }
}

impl From<Speed> for f64 {
    fn from(speed: Speed) -> f64 {
        match speed {
            Speed::Keep(m) => m,
            Speed::Drop => LEGACY_DROP_SENTINEL,
        }
    }
}

/// Ordered lookup table of speeds, referenced by chunk speed indices
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Speed>", into = "Vec<Speed>")]
pub struct SpeedTable {
    speeds: Vec<Speed>,
}

impl SpeedTable {
    /// Create a table; every `Keep` multiplier must be finite and positive
    pub fn new(speeds: Vec<Speed>) -> Result<Self> {
        if speeds.is_empty() {
            return Err(SpeedcutError::EmptySpeedTable);
        }
        for speed in &speeds {
            if let Speed::Keep(m) = *speed {
                Speed::keep(m)?;
            }
        }
        Ok(Self { speeds })
    }

    /// Build from raw multipliers (legacy sentinel allowed)
    pub fn from_multipliers(values: &[f64]) -> Result<Self> {
        let speeds = values
            .iter()
            .map(|&v| Speed::from_multiplier(v))
            .collect::<Result<Vec<_>>>()?;
        Self::new(speeds)
    }

    #[inline]
    pub fn get(&self, index: usize) -> Option<Speed> {
        self.speeds.get(index).copied()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.speeds.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.speeds.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Speed> {
        self.speeds.iter()
    }

    /// Whether any entry needs the time-stretch processor
    pub fn needs_stretch(&self) -> bool {
        self.speeds.iter().any(|s| !s.is_drop() && !s.is_unity())
    }
}

impl TryFrom<Vec<Speed>> for SpeedTable {
    type Error = SpeedcutError;

    fn try_from(speeds: Vec<Speed>) -> Result<Self> {
        SpeedTable::new(speeds)
    }
}

impl From<SpeedTable> for Vec<Speed> {
    fn from(table: SpeedTable) -> Self {
        table.speeds
    }
}
