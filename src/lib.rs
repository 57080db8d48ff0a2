//! Speedcut - Variable-Speed Audio Reconstruction
//!
//! Speedcut rebuilds the audio track of an automatically edited recording.
//! An edit is a chunk schedule: contiguous frame ranges of the source, each
//! kept at unity speed, sped up or slowed down, or dropped.
//!
//! # Architecture
//!
//! - `schedule`: timebase, speed table and chunk schedule
//! - `timeline`: layered clips and the `end` / `out_len` aggregates
//! - `engine`: PCM buffers, WAV I/O and the reconstruction engine
//! - `dsp`: pitch-preserving time stretch (phase vocoder)
//! - `config`: JSON job files
//!
//! ```no_run
//! use speedcut::{reconstruct, ChunkSchedule, SpeedTable, Timebase};
//! use speedcut::engine::{export_pcm, import_pcm};
//! use std::path::Path;
//!
//! # fn main() -> speedcut::Result<()> {
//! let source = import_pcm(Path::new("input.wav"))?;
//! let schedule = ChunkSchedule::from_triples(&[(0, 15, 0), (15, 30, 1)])?;
//! let speeds = SpeedTable::from_multipliers(&[1.0, 2.0])?;
//! let audio = reconstruct(&source, &schedule, &speeds, Timebase::fps(30))?;
//! export_pcm(&audio, Path::new("output.wav"))?;
//! # Ok(())
//! # }
//! ```

pub mod cli;
pub mod config;
pub mod dsp;
pub mod engine;
pub mod error;
pub mod schedule;
pub mod timeline;

pub use config::JobConfig;
pub use engine::{reconstruct, PcmBuffer, Reconstructor};
pub use error::{Result, SpeedcutError};
pub use schedule::{Chunk, ChunkSchedule, Speed, SpeedTable, Timebase};
pub use timeline::Timeline;
