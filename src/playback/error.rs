//! Output device error types

use thiserror::Error;

/// Errors from opening or driving the output device
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AudioError {
    /// No default output device on this host
    #[error("No default audio output device")]
    NoDefaultDevice,

    /// Named device not present
    #[error("Audio device not found: {0}")]
    DeviceNotFound(String),

    /// Failed to list devices
    #[error("Failed to enumerate audio devices: {0}")]
    Enumerate(String),

    /// Device cannot play the requested channel count/rate in a usable format
    #[error("Device does not support {channels} channel(s) at {sample_rate}Hz: {reason}")]
    UnsupportedConfig {
        channels: u16,
        sample_rate: u32,
        reason: String,
    },

    /// Failed to build the output stream
    #[error("Failed to build audio stream: {0}")]
    StreamBuildError(String),

    /// Failed to start the stream
    #[error("Failed to start audio stream: {0}")]
    StreamPlayError(String),

    /// Failed to pause the stream
    #[error("Failed to pause audio stream: {0}")]
    StreamPauseError(String),
}

/// Result type for output device operations
pub type AudioResult<T> = Result<T, AudioError>;
