//! Language identification error types.

use thiserror::Error;

/// Errors from the langid pool and its backends.
#[derive(Debug, Error)]
pub enum LangIdError {
    /// A classifier could not be constructed.
    #[error("Classifier init failed: {0}")]
    Init(String),

    /// The langid model file could not be downloaded.
    #[error("Model download failed: {0}")]
    Download(String),

    /// Pool is stopped or was never started.
    #[error("Language identification not initialized")]
    Unavailable,

    /// A worker failed or went away mid-request.
    #[error("Worker error: {0}")]
    Worker(String),

    /// Filesystem error around the model cache.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result alias for langid operations.
pub type Result<T> = std::result::Result<T, LangIdError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unavailable_message_is_stable() {
        // The HTTP layer surfaces this text with a 503.
        assert_eq!(
            LangIdError::Unavailable.to_string(),
            "Language identification not initialized"
        );
    }

    #[test]
    fn io_error_converts() {
        let err: LangIdError = std::io::Error::other("disk").into();
        assert!(matches!(err, LangIdError::Io(_)));
    }
}
