//! Chunk schedule and speed table
//!
//! The contract between the timeline model (producer) and the audio
//! reconstruction engine (consumer):
//! - `Timebase`: project frame rate and frame-to-sample conversion
//! - `SpeedTable`: playback multipliers, with an explicit `Drop` entry
//! - `ChunkSchedule`: contiguous frame ranges tagged with speed indices

mod chunk;
mod speed;
mod timebase;

pub use chunk::{validate_chunks, Chunk, ChunkSchedule};
pub use speed::{Speed, SpeedTable, LEGACY_DROP_SENTINEL};
pub use timebase::{Timebase, DEFAULT_FRAME_RATE};
