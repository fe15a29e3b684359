//! Crate-local error type, following the one-enum-per-crate convention used
//! throughout this codebase.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("invalid sample rate: {0}")]
    InvalidSampleRate(f64),

    #[error("invalid block size: {0}")]
    InvalidBlockSize(usize),

    #[error("invalid parameter: {0}")]
    InvalidParam(String),

    #[error("comm link capacity must be nonzero")]
    InvalidCommLinkCapacity,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("engine already stopped")]
    AlreadyStopped,
}

pub type EngineResult<T> = Result<T, EngineError>;
