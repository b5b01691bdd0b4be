//! Error types for the Converse answer pipeline.
//!
//! This module defines a unified error enum that covers all error categories
//! in the application, including configuration, I/O, LLM, retrieval,
//! composition, and guardrail errors.

use thiserror::Error;

/// Unified error type for the Converse workspace.
///
/// All functions in the application return `Result<T, AppError>`.
/// We never panic; errors must be represented and propagated.
///
/// Each pipeline stage fails fast: a failed external call is never replaced
/// by a silent default. Retry policy belongs to the surrounding job
/// infrastructure, not to the components that raise these errors.
#[derive(Error, Debug)]
pub enum AppError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O and filesystem errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// LLM provider errors (transport failure or malformed response shape)
    #[error("LLM error: {0}")]
    Llm(String),

    /// Guardrail evaluation errors (unrecognized model verdict)
    #[error("Guardrail error: {0}")]
    Guardrail(String),

    /// Search index errors (index unreachable or malformed response)
    #[error("Retrieval error: {0}")]
    Retrieval(String),

    /// Model failure while composing an answer
    #[error("Composition error: {0}")]
    Composition(String),

    /// Prompt template errors
    #[error("Prompt error: {0}")]
    Prompt(String),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Generic errors
    #[error("{0}")]
    Other(String),
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

impl From<serde_yaml::Error> for AppError {
    fn from(err: serde_yaml::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

/// Convenience type alias for Results with AppError.
pub type AppResult<T> = Result<T, AppError>;
