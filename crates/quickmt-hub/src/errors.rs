//! Hub error types.

use thiserror::Error;

/// Errors from catalogue discovery and artifact materialization.
#[derive(Debug, Error)]
pub enum HubError {
    /// The remote catalogue could not be fetched or parsed.
    #[error("Catalogue fetch failed: {0}")]
    Catalogue(String),

    /// The artifact could not be materialized locally.
    #[error("Artifact fetch failed: {0}")]
    Artifact(String),
}

/// Result alias for hub operations.
pub type Result<T> = std::result::Result<T, HubError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_variants() {
        assert_eq!(
            HubError::Catalogue("timeout".into()).to_string(),
            "Catalogue fetch failed: timeout"
        );
        assert_eq!(
            HubError::Artifact("missing model.bin".into()).to_string(),
            "Artifact fetch failed: missing model.bin"
        );
    }
}
