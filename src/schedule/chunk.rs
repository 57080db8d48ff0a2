//! Chunk schedule: the contiguous partition of the original timeline

use serde::{Deserialize, Serialize};

use super::speed::{Speed, SpeedTable};
use crate::error::{Result, SpeedcutError};

/// A frame range `[start, end)` of the original timeline tagged with a
/// speed-table index. Serialized as a `[start, end, speed_index]` triple.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "(u64, u64, usize)", into = "(u64, u64, usize)")]
pub struct Chunk {
    pub start: u64,
    pub end: u64,
    pub speed_index: usize,
}

impl Chunk {
    pub const fn new(start: u64, end: u64, speed_index: usize) -> Self {
        Self {
            start,
            end,
            speed_index,
        }
    }

    /// Length in frames (0 for inverted ranges)
    #[inline]
    pub fn len(&self) -> u64 {
        self.end.saturating_sub(self.start)
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.end <= self.start
    }
}

impl From<(u64, u64, usize)> for Chunk {
    fn from((start, end, speed_index): (u64, u64, usize)) -> Self {
        Chunk::new(start, end, speed_index)
    }
}

impl From<Chunk> for (u64, u64, usize) {
    fn from(chunk: Chunk) -> Self {
        (chunk.start, chunk.end, chunk.speed_index)
    }
}

/// Check that `chunks` exactly partition `[0, total)`.
pub fn validate_chunks(chunks: &[Chunk]) -> Result<()> {
    let first = chunks.first().ok_or(SpeedcutError::EmptySchedule)?;
    if first.start != 0 {
        return Err(SpeedcutError::ScheduleNotAnchored { start: first.start });
    }

    let mut expected = 0;
    for (index, chunk) in chunks.iter().enumerate() {
        if chunk.start != expected {
            return Err(SpeedcutError::ScheduleDiscontinuity {
                index,
                expected,
                found: chunk.start,
            });
        }
        if chunk.is_empty() {
            return Err(SpeedcutError::ZeroLengthChunk {
                index,
                start: chunk.start,
                end: chunk.end,
            });
        }
        expected = chunk.end;
    }
    Ok(())
}

/// Validated, immutable chunk schedule
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Chunk>", into = "Vec<Chunk>")]
pub struct ChunkSchedule {
    chunks: Vec<Chunk>,
}

impl ChunkSchedule {
    pub fn new(chunks: Vec<Chunk>) -> Result<Self> {
        validate_chunks(&chunks)?;
        Ok(Self { chunks })
    }

    /// Build from `(start, end, speed_index)` triples
    pub fn from_triples(triples: &[(u64, u64, usize)]) -> Result<Self> {
        Self::new(triples.iter().copied().map(Chunk::from).collect())
    }

    #[inline]
    pub fn chunks(&self) -> &[Chunk] {
        &self.chunks
    }

    pub fn iter(&self) -> impl Iterator<Item = &Chunk> {
        self.chunks.iter()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    /// Always false for a constructed schedule
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Length of the original timeline in frames
    pub fn total_frames(&self) -> u64 {
        self.chunks.last().map(|c| c.end).unwrap_or(0)
    }

    /// Resolve a chunk's speed, failing on out-of-range indices
    pub fn speed_of(&self, index: usize, speeds: &SpeedTable) -> Result<Speed> {
        let chunk = self
            .chunks
            .get(index)
            .ok_or(SpeedcutError::ChunkIndexOutOfRange {
                index,
                len: self.chunks.len(),
            })?;
        speeds
            .get(chunk.speed_index)
            .ok_or(SpeedcutError::SpeedIndexOutOfRange {
                index,
                speed_index: chunk.speed_index,
                table_len: speeds.len(),
            })
    }

    /// Check every speed index against the table
    pub fn check_speeds(&self, speeds: &SpeedTable) -> Result<()> {
        for index in 0..self.chunks.len() {
            self.speed_of(index, speeds)?;
        }
        Ok(())
    }

    /// Expected length of the edited timeline in frames:
    /// `Σ len / speed` over the chunks that are kept.
    pub fn output_frames(&self, speeds: &SpeedTable) -> Result<f64> {
        let mut frames = 0.0;
        for index in 0..self.chunks.len() {
            if let Some(m) = self.speed_of(index, speeds)?.multiplier() {
                frames += self.chunks[index].len() as f64 / m;
            }
        }
        Ok(frames)
    }

    /// True when at least one chunk survives into the output
    pub fn has_kept_content(&self, speeds: &SpeedTable) -> Result<bool> {
        for index in 0..self.chunks.len() {
            if !self.speed_of(index, speeds)?.is_drop() {
                return Ok(true);
            }
        }
        Ok(false)
    }
}

impl TryFrom<Vec<Chunk>> for ChunkSchedule {
    type Error = SpeedcutError;

    fn try_from(chunks: Vec<Chunk>) -> Result<Self> {
        ChunkSchedule::new(chunks)
    }
}

impl From<ChunkSchedule> for Vec<Chunk> {
    fn from(schedule: ChunkSchedule) -> Self {
        schedule.chunks
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use pretty_assertions::assert_eq;

    fn table() -> SpeedTable {
        SpeedTable::new(vec![Speed::Drop, Speed::UNITY, Speed::Keep(2.0)]).unwrap()
    }

    #[test]
    fn test_valid_schedule() {
        let schedule = ChunkSchedule::from_triples(&[(0, 10, 1), (10, 25, 0), (25, 30, 2)]).unwrap();
        assert_eq!(schedule.len(), 3);
        assert_eq!(schedule.total_frames(), 30);
        assert!(schedule.check_speeds(&table()).is_ok());
    }

    #[test]
    fn test_empty_schedule() {
        assert!(matches!(
            ChunkSchedule::new(vec![]),
            Err(SpeedcutError::EmptySchedule)
        ));
    }

    #[test]
    fn test_gap_rejected() {
        let err = ChunkSchedule::from_triples(&[(0, 10, 1), (11, 20, 1)]).unwrap_err();
        assert!(matches!(
            err,
            SpeedcutError::ScheduleDiscontinuity {
                index: 1,
                expected: 10,
                found: 11
            }
        ));
    }

    #[test]
    fn test_overlap_rejected() {
        let err = ChunkSchedule::from_triples(&[(0, 10, 1), (8, 20, 1)]).unwrap_err();
        assert!(matches!(err, SpeedcutError::ScheduleDiscontinuity { .. }));
    }

    #[test]
    fn test_not_anchored_rejected() {
        let err = ChunkSchedule::from_triples(&[(5, 10, 1)]).unwrap_err();
        assert!(matches!(err, SpeedcutError::ScheduleNotAnchored { start: 5 }));
    }

    #[test]
    fn test_zero_length_single_chunk_rejected() {
        let err = ChunkSchedule::from_triples(&[(0, 0, 1)]).unwrap_err();
        assert!(matches!(err, SpeedcutError::ZeroLengthChunk { index: 0, .. }));
    }

    #[test]
    fn test_speed_index_out_of_range() {
        let schedule = ChunkSchedule::from_triples(&[(0, 10, 1), (10, 20, 7)]).unwrap();
        let err = schedule.check_speeds(&table()).unwrap_err();
        assert!(matches!(
            err,
            SpeedcutError::SpeedIndexOutOfRange {
                index: 1,
                speed_index: 7,
                table_len: 3
            }
        ));
    }

    #[test]
    fn test_speed_of_unknown_chunk() {
        let schedule = ChunkSchedule::from_triples(&[(0, 10, 1), (10, 20, 2)]).unwrap();
        assert_eq!(schedule.speed_of(1, &table()).unwrap(), Speed::Keep(2.0));
        assert!(matches!(
            schedule.speed_of(2, &table()),
            Err(SpeedcutError::ChunkIndexOutOfRange { index: 2, len: 2 })
        ));
    }

    #[test]
    fn test_output_frames_skips_dropped() {
        let schedule = ChunkSchedule::from_triples(&[(0, 10, 1), (10, 25, 0), (25, 31, 2)]).unwrap();
        assert_relative_eq!(schedule.output_frames(&table()).unwrap(), 13.0);
    }

    #[test]
    fn test_has_kept_content() {
        let dropped = ChunkSchedule::from_triples(&[(0, 10, 0), (10, 20, 0)]).unwrap();
        assert!(!dropped.has_kept_content(&table()).unwrap());
        let kept = ChunkSchedule::from_triples(&[(0, 10, 0), (10, 20, 1)]).unwrap();
        assert!(kept.has_kept_content(&table()).unwrap());
    }

    #[test]
    fn test_json_triples() {
        let schedule: ChunkSchedule = serde_json::from_str("[[0, 12, 1], [12, 40, 0]]").unwrap();
        assert_eq!(schedule.chunks()[1], Chunk::new(12, 40, 0));
        assert!(serde_json::from_str::<ChunkSchedule>("[[0, 12, 1], [13, 40, 0]]").is_err());
        assert_eq!(
            serde_json::to_string(&schedule).unwrap(),
            "[[0,12,1],[12,40,0]]"
        );
    }
}
