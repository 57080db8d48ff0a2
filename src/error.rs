//! Error handling for Speedcut
//!
//! Every fatal condition of a run surfaces as a single `SpeedcutError`.
//! Rounding drift between expected and produced sample counts is never an
//! error and has no variant here.

use thiserror::Error;

/// Result type alias for Speedcut operations
pub type Result<T> = std::result::Result<T, SpeedcutError>;

/// Main error type for Speedcut operations
#[derive(Error, Debug)]
pub enum SpeedcutError {
    // Configuration Errors
    #[error("Chunk schedule is empty")]
    EmptySchedule,

    #[error("Chunk schedule must start at frame 0, first chunk starts at {start}")]
    ScheduleNotAnchored { start: u64 },

    #[error("Chunk {index} has zero or negative length ({start}..{end})")]
    ZeroLengthChunk { index: usize, start: u64, end: u64 },

    #[error("Chunk {index} starts at frame {found} but the previous chunk ends at {expected}")]
    ScheduleDiscontinuity {
        index: usize,
        expected: u64,
        found: u64,
    },

    #[error("Chunk {index} references speed index {speed_index}, table has {table_len} entries")]
    SpeedIndexOutOfRange {
        index: usize,
        speed_index: usize,
        table_len: usize,
    },

    #[error("Chunk index {index} is out of range for a schedule of {len} chunks")]
    ChunkIndexOutOfRange { index: usize, len: usize },

    #[error("Speed table is empty")]
    EmptySpeedTable,

    #[error("Invalid speed multiplier: {value}")]
    InvalidSpeed { value: f64 },

    #[error("Trying to create an empty file: {reason}")]
    EmptyOutput { reason: String },

    #[error("Invalid timebase {num}/{den}")]
    InvalidTimebase { num: u32, den: u32 },

    #[error("Invalid source label '{label}': {reason}")]
    InvalidSourceLabel { label: String, reason: String },

    #[error("Source already registered: {key}")]
    DuplicateSource { key: String },

    // Processing Errors
    #[error("Unsupported channel layout: expected {expected} channels, got {found}")]
    UnsupportedChannelLayout { expected: usize, found: usize },

    #[error("Time stretch failed: {reason}")]
    StretchFailed { reason: String },

    #[error("Output buffer cannot hold {requested} sample frames")]
    CapacityExceeded { requested: usize },

    #[error("Reconstruction cancelled after {completed} of {total} chunks")]
    Cancelled { completed: usize, total: usize },

    // File Errors
    #[error("File not found: {path}")]
    FileNotFound {
        path: String,
        #[source]
        source: Option<std::io::Error>,
    },

    #[error("Invalid audio file: {reason}")]
    InvalidAudio {
        reason: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Unsupported audio format: {format}")]
    UnsupportedFormat { format: String },

    // I/O Errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // Serialization Errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl SpeedcutError {
    /// Get the error code for this error type
    pub fn error_code(&self) -> &'static str {
        match self {
            SpeedcutError::EmptySchedule => "EMPTY_SCHEDULE",
            SpeedcutError::ScheduleNotAnchored { .. } => "SCHEDULE_NOT_ANCHORED",
            SpeedcutError::ZeroLengthChunk { .. } => "ZERO_LENGTH_CHUNK",
            SpeedcutError::ScheduleDiscontinuity { .. } => "SCHEDULE_DISCONTINUITY",
            SpeedcutError::SpeedIndexOutOfRange { .. } => "SPEED_INDEX_OUT_OF_RANGE",
            SpeedcutError::ChunkIndexOutOfRange { .. } => "CHUNK_INDEX_OUT_OF_RANGE",
            SpeedcutError::EmptySpeedTable => "EMPTY_SPEED_TABLE",
            SpeedcutError::InvalidSpeed { .. } => "INVALID_SPEED",
            SpeedcutError::EmptyOutput { .. } => "EMPTY_OUTPUT",
            SpeedcutError::InvalidTimebase { .. } => "INVALID_TIMEBASE",
            SpeedcutError::InvalidSourceLabel { .. } => "INVALID_SOURCE_LABEL",
            SpeedcutError::DuplicateSource { .. } => "DUPLICATE_SOURCE",
            SpeedcutError::UnsupportedChannelLayout { .. } => "UNSUPPORTED_CHANNEL_LAYOUT",
            SpeedcutError::StretchFailed { .. } => "STRETCH_FAILED",
            SpeedcutError::CapacityExceeded { .. } => "CAPACITY_EXCEEDED",
            SpeedcutError::Cancelled { .. } => "CANCELLED",
            SpeedcutError::FileNotFound { .. } => "FILE_NOT_FOUND",
            SpeedcutError::InvalidAudio { .. } => "INVALID_AUDIO",
            SpeedcutError::UnsupportedFormat { .. } => "UNSUPPORTED_FORMAT",
            SpeedcutError::Io(_) => "IO_ERROR",
            SpeedcutError::Serialization(_) => "SERIALIZATION_ERROR",
        }
    }

    /// Check if this error is recoverable
    ///
    /// Only input-side problems qualify: the caller can fix the file or the
    /// job and run again. Anything raised mid-reconstruction is terminal.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            SpeedcutError::FileNotFound { .. }
                | SpeedcutError::InvalidAudio { .. }
                | SpeedcutError::UnsupportedFormat { .. }
                | SpeedcutError::InvalidSourceLabel { .. }
                | SpeedcutError::DuplicateSource { .. }
        )
    }

    /// True for errors raised while validating a schedule or speed table
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            SpeedcutError::EmptySchedule
                | SpeedcutError::ScheduleNotAnchored { .. }
                | SpeedcutError::ZeroLengthChunk { .. }
                | SpeedcutError::ScheduleDiscontinuity { .. }
                | SpeedcutError::SpeedIndexOutOfRange { .. }
                | SpeedcutError::ChunkIndexOutOfRange { .. }
                | SpeedcutError::EmptySpeedTable
                | SpeedcutError::InvalidSpeed { .. }
                | SpeedcutError::EmptyOutput { .. }
                | SpeedcutError::InvalidTimebase { .. }
        )
    }

    pub(crate) fn stretch(reason: impl Into<String>) -> Self {
        SpeedcutError::StretchFailed {
            reason: reason.into(),
        }
    }
}
