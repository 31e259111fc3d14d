//! Runtime error taxonomy.
//!
//! Errors are logged where they arise and re-raised; only the HTTP layer
//! turns them into status codes.

use quickmt_langid::LangIdError;
use thiserror::Error;

/// Errors from the manager, runners, and orchestrator.
#[derive(Debug, Error)]
pub enum RuntimeError {
    /// No catalogue entry for the requested pair (404 at the boundary).
    #[error("Model for {src}->{tgt} not found in catalogue")]
    ModelNotFound {
        /// Requested source language.
        src: String,
        /// Requested target language.
        tgt: String,
    },

    /// Artifact fetch or engine load failed (500; retryable).
    #[error("Model load failed: {0}")]
    Load(String),

    /// The engine failed during inference (500; the runner stays up).
    #[error("Translation failed: {0}")]
    Translation(String),

    /// Request shape violation (422).
    #[error("{0}")]
    Validation(String),

    /// The runner is draining or closed and accepts no further jobs.
    #[error("Model runner is shut down")]
    Closed,

    /// Language identification failed or is unavailable.
    #[error(transparent)]
    LangId(#[from] LangIdError),
}

/// Result alias for runtime operations.
pub type Result<T> = std::result::Result<T, RuntimeError>;
