//! Error types for the filter engine

use thiserror::Error;

/// Core error type
///
/// Only configuration-time calls produce these. The render paths sanitise
/// their inputs instead of failing.
#[derive(Error, Debug)]
pub enum FeError {
    #[error("Invalid parameter: {0}")]
    InvalidParam(String),

    #[error("Invalid sample rate: {0}")]
    InvalidSampleRate(f64),

    #[error("Invalid analyser buffer size {0} (must be zero or a power of two)")]
    InvalidBufferSize(usize),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Result type alias
pub type FeResult<T> = Result<T, FeError>;
