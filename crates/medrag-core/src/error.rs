use std::time::Duration;

use thiserror::Error;

use crate::types::FailureKind;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Operation failed: {0}")]
    Operation(String),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Failure signal of a [`crate::traits::Generator`] call.
///
/// Never crosses the answer pipeline boundary as an error; it is turned into
/// its [`GenerateError::sentinel`] text and a failed result.
#[derive(Debug, Clone, Error)]
pub enum GenerateError {
    #[error("generation timed out after {0:?}")]
    Timeout(Duration),

    #[error("generation backend unreachable: {0}")]
    Unreachable(String),

    #[error("generation backend error: {0}")]
    Backend(String),
}

impl GenerateError {
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::Timeout(_) => FailureKind::Timeout,
            Self::Unreachable(_) => FailureKind::Unreachable,
            Self::Backend(_) => FailureKind::Backend,
        }
    }

    /// User-facing answer text substituted for the missing generation.
    pub fn sentinel(&self) -> String {
        match self {
            Self::Timeout(_) => "The model took too long to respond.".to_string(),
            Self::Unreachable(reason) => format!("Error connecting to Ollama: {reason}"),
            Self::Backend(reason) => format!("Error calling Ollama: {reason}"),
        }
    }
}
