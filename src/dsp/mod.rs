//! Time-stretch processing
//!
//! The reconstruction engine only talks to the `TimeStretch` trait; the
//! phase vocoder is the default implementation.

mod phase_vocoder;
mod stretch;

pub use phase_vocoder::{PhaseVocoder, DEFAULT_FRAME_LENGTH, DEFAULT_SYNTHESIS_HOP};
pub use stretch::{stretch_block, BlockReader, BlockWriter, SliceReader, TimeStretch, VecWriter};
