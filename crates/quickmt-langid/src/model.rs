//! Langid model file bootstrap.
//!
//! The FastText identification model is a single binary file. It must be
//! fetched by the main process before any pool worker starts, so workers
//! never race on a partial download.

use std::path::{Path, PathBuf};

use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

use crate::errors::{LangIdError, Result};

/// Public distribution URL for the 176-language identification model.
pub const LANGID_MODEL_URL: &str =
    "https://dl.fbaipublicfiles.com/fasttext/supervised-models/lid.176.bin";

/// Default on-disk location: `$XDG_CACHE_HOME/fasttext_language_id/lid.176.bin`
/// (falling back to `~/.cache`).
pub fn default_model_path() -> PathBuf {
    let cache_root = std::env::var("XDG_CACHE_HOME").map_or_else(
        |_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".into());
            PathBuf::from(home).join(".cache")
        },
        PathBuf::from,
    );
    cache_root.join("fasttext_language_id").join("lid.176.bin")
}

/// Ensure the model file exists at `path`, downloading it if missing.
///
/// The download streams into a sibling temp file and renames into place,
/// so a crashed download never leaves a truncated model behind.
pub async fn ensure_model(path: &Path) -> Result<()> {
    if path.is_file() {
        debug!(path = %path.display(), "langid model already cached");
        return Ok(());
    }
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    info!(url = LANGID_MODEL_URL, path = %path.display(), "downloading langid model");
    let mut response = reqwest::get(LANGID_MODEL_URL)
        .await
        .and_then(reqwest::Response::error_for_status)
        .map_err(|e| LangIdError::Download(e.to_string()))?;

    let staging = path.with_extension("bin.partial");
    let mut file = tokio::fs::File::create(&staging).await?;
    while let Some(chunk) = response
        .chunk()
        .await
        .map_err(|e| LangIdError::Download(e.to_string()))?
    {
        file.write_all(&chunk).await?;
    }
    file.flush().await?;
    drop(file);

    tokio::fs::rename(&staging, path).await?;
    info!(path = %path.display(), "langid model ready");
    Ok(())
}
