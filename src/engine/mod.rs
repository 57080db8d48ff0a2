//! Audio Engine Module
//!
//! Audio side of the editor:
//! - PCM buffer management
//! - WAV import and export
//! - Chunk-driven reconstruction with progress and cancellation

pub mod buffer;
pub mod io;
pub mod progress;
pub mod reconstruct;

pub use buffer::{ChannelLayout, PcmBuffer, DEFAULT_SAMPLE_RATE};
pub use io::{export_pcm, generate_stereo_test_tone, import_pcm};
pub use progress::{CancelToken, LogProgress, NoProgress, ProgressSink};
pub use reconstruct::{reconstruct, ChunkAction, ChunkPlan, Reconstructor};
