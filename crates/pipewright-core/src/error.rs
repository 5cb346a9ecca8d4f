//! Error types for Pipewright.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// Required options are missing or a raw step is malformed.
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("unknown step kind: {0}")]
    UnknownStep(String),

    /// The container path was extracted but held nothing worth keeping.
    #[error("empty tarball")]
    EmptyTarball,

    #[error("extraction failed: {0}")]
    Extraction(String),

    #[error("randomness source failed: {0}")]
    Randomness(String),

    #[error("step '{step}' failed: {message}")]
    StepFailed { step: String, message: String },

    #[error("execution failed: {0}")]
    ExecutionFailed(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    pub fn is_empty_tarball(&self) -> bool {
        matches!(self, Error::EmptyTarball)
    }
}

pub type Result<T> = std::result::Result<T, Error>;
