//! Engine error types.

use thiserror::Error;

/// Errors from engine loading, tokenization, and inference.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The model artifact could not be loaded into the engine.
    #[error("Engine load failed: {0}")]
    Load(String),

    /// A tokenizer model is missing or failed to encode/decode.
    #[error("Tokenizer error: {0}")]
    Tokenizer(String),

    /// The engine failed during a batch translation.
    #[error("Inference failed: {0}")]
    Inference(String),
}

/// Result alias for engine operations.
pub type Result<T> = std::result::Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_variants() {
        assert_eq!(
            EngineError::Load("bad config.json".into()).to_string(),
            "Engine load failed: bad config.json"
        );
        assert_eq!(
            EngineError::Tokenizer("missing src.spm.model".into()).to_string(),
            "Tokenizer error: missing src.spm.model"
        );
        assert_eq!(
            EngineError::Inference("oom".into()).to_string(),
            "Inference failed: oom"
        );
    }

    #[test]
    fn error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<EngineError>();
    }
}
