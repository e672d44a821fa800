//! Error handling and custom error types
//!
//! Provides unified error handling across the engine using thiserror.
//! Backend failures are classified so callers can distinguish transient
//! overload from payload problems and candidate exhaustion.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Image processing error: {0}")]
    Image(#[from] image::ImageError),

    /// Missing credential or invalid setup. Fatal, never retried.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Backend is overloaded. A distinct retryable class so callers can
    /// surface "try again shortly" instead of a generic failure.
    #[error("Backend busy: {0}")]
    Busy(String),

    /// Backend-side 500. Usually means the prompt or reference payload is
    /// too complex for the model.
    #[error("Backend internal error: {0}")]
    BackendInternal(String),

    /// A poll loop exceeded its wall-clock deadline.
    #[error("Timed out: {0}")]
    Timeout(String),

    /// Every fallback candidate was exhausted. Carries the aggregate
    /// diagnostic assembled by the orchestrator.
    #[error("Generation failed: {0}")]
    Generation(String),

    #[error("AI provider error: {0}")]
    AiProvider(String),
}

pub type Result<T> = std::result::Result<T, Error>;
