// Error types shared by the engine and the audio backend
use thiserror::Error;

#[derive(Debug, Error)]
pub enum NotifyError {
    /// The table identifier had no digits left after normalization.
    #[error("invalid table identifier '{input}': no digits")]
    Validation { input: String },

    #[error("notification engine must be created inside a tokio runtime")]
    NoRuntime,
}

/// Reasons an alert failed to play. Reported and logged, never retried.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PlaybackError {
    #[error("failed to load clip {path}: {reason}")]
    Load { path: String, reason: String },

    #[error("audio device error: {0}")]
    Device(String),

    #[error("playback halted")]
    Halted,
}

#[derive(Debug, Error)]
pub enum AudioError {
    #[error("failed to open file: {0}")]
    Open(#[from] std::io::Error),

    #[error("failed to probe file format: {0}")]
    Probe(String),

    #[error("no audio track found")]
    NoTrack,

    #[error("decode failed: {0}")]
    Decode(String),

    #[error("resample failed: {0}")]
    Resample(String),

    #[error("no output device available")]
    NoDevice,

    #[error("output stream error: {0}")]
    Stream(String),

    #[error("unsupported sample format: {0}")]
    UnsupportedFormat(String),
}

pub type Result<T, E = NotifyError> = std::result::Result<T, E>;
