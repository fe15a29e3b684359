//! Crate-local error type for device/stream failures, following the
//! one-enum-per-crate convention.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AudioError {
    #[error("no output audio device found")]
    NoDevice,

    #[error("failed to get device config: {0}")]
    ConfigError(String),

    #[error("failed to build stream: {0}")]
    StreamBuildError(String),

    #[error("stream error: {0}")]
    StreamError(String),
}

pub type AudioResult<T> = Result<T, AudioError>;
