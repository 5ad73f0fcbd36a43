//! Error types for the clustering engine.
//!
//! Each module defines its own error enum next to the code it guards;
//! this module provides the umbrella `EngineError` the engine and CLI
//! propagate, plus stable status codes for JSON output and exit codes
//! for shell scripts.

use thiserror::Error;

use crate::article::RecordError;
use crate::embedding::EmbeddingError;
use crate::hashtag::LabelError;
use crate::storage::StorageError;
use crate::types::VectorError;

/// Main error type for engine operations.
#[derive(Error, Debug)]
pub enum EngineError {
    /// Bad article record. Recovered per-article during ingestion; fatal
    /// only when raised outside the ingestion loop.
    #[error(transparent)]
    Record(#[from] RecordError),

    /// Embedding backend failure. Fatal: clustering must not start (or
    /// continue) with a partially working model.
    #[error(transparent)]
    Embedding(#[from] EmbeddingError),

    /// Vector-level validation failure.
    #[error(transparent)]
    Vector(#[from] VectorError),

    /// Persisted state unreadable or version-mismatched. Fatal for the
    /// partition; the caller rebuilds from scratch.
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// Label generation failure. Non-fatal inside the engine, which
    /// falls back to a placeholder; surfaces here only from direct
    /// generator use.
    #[error(transparent)]
    Label(#[from] LabelError),

    /// In-memory engine state inconsistency (e.g. an indexed article
    /// with no cluster assignment).
    #[error("Engine state corrupted: {reason}")]
    StateCorrupted { reason: String },

    /// Configuration errors.
    #[error("Invalid configuration: {reason}")]
    Config { reason: String },

    /// General errors where preserving the original message is enough.
    #[error("{0}")]
    General(String),
}

impl EngineError {
    /// Get a stable status code for this error type.
    ///
    /// Returns a string identifier usable in JSON responses for
    /// programmatic error handling.
    pub fn status_code(&self) -> &'static str {
        match self {
            Self::Record(_) => "INVALID_RECORD",
            Self::Embedding(_) => "EMBEDDING_BACKEND_ERROR",
            Self::Vector(_) => "VECTOR_ERROR",
            Self::Storage(_) => "STORAGE_ERROR",
            Self::Label(_) => "LABEL_ERROR",
            Self::StateCorrupted { .. } => "STATE_CORRUPTED",
            Self::Config { .. } => "CONFIG_ERROR",
            Self::General(_) => "GENERAL_ERROR",
        }
    }

    /// Exit code for shell scripts, following Unix conventions.
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::Record(_) => 3,
            Self::Embedding(_) => 4,
            Self::Config { .. } => 6,
            Self::Storage(_) | Self::StateCorrupted { .. } => 7,
            _ => 1,
        }
    }

    /// Get recovery suggestions for this error.
    pub fn recovery_suggestions(&self) -> Vec<&'static str> {
        match self {
            Self::Embedding(_) => vec![
                "Verify the embedding model is downloaded (first run needs network access)",
                "Check the configured model name under [embedding] in settings.toml",
            ],
            Self::Storage(_) | Self::StateCorrupted { .. } => vec![
                "Delete the partition directory and re-run to rebuild from raw articles",
                "Check for disk errors or filesystem corruption",
            ],
            Self::Config { .. } => {
                vec!["Check settings.toml syntax and HEADLINER_* environment overrides"]
            }
            _ => vec![],
        }
    }
}

/// Result type alias for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

/// Helper trait for adding context to errors.
pub trait ErrorContext<T> {
    /// Add context to an error.
    fn context(self, msg: &str) -> Result<T, EngineError>;
}

impl<T, E> ErrorContext<T> for Result<T, E>
where
    E: std::error::Error + Send + Sync + 'static,
{
    fn context(self, msg: &str) -> Result<T, EngineError> {
        self.map_err(|e| EngineError::General(format!("{msg}: {e}")))
    }
}
