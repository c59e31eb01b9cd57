//! Error types for tactus-core.

use crate::transport::EngineState;
use thiserror::Error;

/// Error type for tactus-core operations.
///
/// Every variant describes a rejected control operation. The audio callback
/// never returns one of these: it degrades to silence and reports a
/// [`CallbackStatus`](crate::CallbackStatus) instead.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    #[error("Invalid tempo: {0}. Must be between 1.0 and 999.0 BPM")]
    InvalidTempo(f64),

    #[error("Invalid sample rate: {0} Hz")]
    InvalidSampleRate(f64),

    #[error("Invalid buffer size: {0} frames")]
    InvalidBufferSize(usize),

    #[error("Invalid resolution: {0} ticks per quarter note")]
    InvalidResolution(u32),

    #[error("Invalid song: {0}")]
    InvalidSong(String),

    #[error("Tempo is controlled by an external timebase master")]
    TempoLocked,

    #[error("Cannot {operation} while engine is {state:?}")]
    InvalidState {
        operation: &'static str,
        state: EngineState,
    },

    #[error("No song loaded")]
    NoSong,

    #[error("Pattern index {index} out of range (song has {len} patterns)")]
    PatternOutOfRange { index: usize, len: usize },

    #[error("Column {index} out of range (song has {len} columns)")]
    ColumnOutOfRange { index: usize, len: usize },

    #[error("Live input queue is full")]
    LiveQueueFull,
}

/// Result type alias.
pub type Result<T> = std::result::Result<T, Error>;
