//! Artifact store — materialize a model's files on local disk.
//!
//! Lookup is cache-first: if every file the engine needs is already in the
//! hub cache, no network traffic happens. Otherwise the repo's file list
//! is fetched and everything is downloaded, skipping the training-framework
//! dumps some repos carry.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::{debug, info};

use crate::errors::{HubError, Result};
use crate::registry::ModelDescriptor;

/// Files every artifact must provide for serving.
const REQUIRED_FILES: &[&str] = &[
    "config.json",
    "model.bin",
    "source_vocabulary.json",
    "target_vocabulary.json",
];

/// Joint tokenizer model filename.
const JOINT_TOKENIZER: &str = "joint.spm.model";
/// Split tokenizer model filenames.
const SPLIT_TOKENIZERS: &[&str] = &["src.spm.model", "tgt.spm.model"];

/// Path prefixes never downloaded (other-framework training dumps).
const EXCLUDED_PREFIXES: &[&str] = &["eole-model/", "eole_model/"];

/// Turns a descriptor into a local directory holding the artifact.
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// Ensure the artifact is present locally and return its directory.
    async fn ensure(&self, descriptor: &ModelDescriptor) -> Result<PathBuf>;
}

/// Hub-backed store: local cache lookup first, remote fetch on miss.
pub struct HubArtifactStore {
    cache_dir: Option<PathBuf>,
}

impl HubArtifactStore {
    /// Create a store using the hub's default cache location.
    pub fn new() -> Self {
        Self { cache_dir: None }
    }

    /// Create a store with an explicit cache directory.
    pub fn with_cache_dir(cache_dir: PathBuf) -> Self {
        Self {
            cache_dir: Some(cache_dir),
        }
    }
}

impl Default for HubArtifactStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ArtifactStore for HubArtifactStore {
    async fn ensure(&self, descriptor: &ModelDescriptor) -> Result<PathBuf> {
        let id = descriptor.id.clone();
        let cache_dir = self.cache_dir.clone();
        // hf-hub's API is synchronous; keep it off the async workers.
        tokio::task::spawn_blocking(move || ensure_blocking(&id, cache_dir.as_deref()))
            .await
            .map_err(|e| HubError::Artifact(format!("join error: {e}")))?
    }
}

fn ensure_blocking(repo_id: &str, cache_dir: Option<&Path>) -> Result<PathBuf> {
    if let Some(dir) = lookup_cached(repo_id, cache_dir) {
        debug!(repo = repo_id, dir = %dir.display(), "artifact fully cached");
        return Ok(dir);
    }
    info!(repo = repo_id, "artifact not fully cached, fetching");
    fetch_remote(repo_id, cache_dir)
}

/// Cache-only lookup: succeeds when the required files plus a complete
/// tokenizer set are already present.
fn lookup_cached(repo_id: &str, cache_dir: Option<&Path>) -> Option<PathBuf> {
    let cache = cache_dir.map_or_else(hf_hub::Cache::default, |d| {
        hf_hub::Cache::new(d.to_path_buf())
    });
    let repo = cache.model(repo_id.to_string());

    let mut model_bin = None;
    for file in REQUIRED_FILES {
        let path = repo.get(file)?;
        if *file == "model.bin" {
            model_bin = Some(path);
        }
    }

    let has_joint = repo.get(JOINT_TOKENIZER).is_some();
    let has_split = SPLIT_TOKENIZERS.iter().all(|f| repo.get(f).is_some());
    if !has_joint && !has_split {
        return None;
    }

    model_bin.and_then(|p| p.parent().map(Path::to_path_buf))
}

fn fetch_remote(repo_id: &str, cache_dir: Option<&Path>) -> Result<PathBuf> {
    let mut builder = hf_hub::api::sync::ApiBuilder::new();
    if let Some(dir) = cache_dir {
        builder = builder.with_cache_dir(dir.to_path_buf());
    }
    let api = builder
        .build()
        .map_err(|e| HubError::Artifact(e.to_string()))?;
    let repo = api.model(repo_id.to_string());

    let info = repo.info().map_err(|e| HubError::Artifact(e.to_string()))?;
    let mut artifact_dir = None;
    for sibling in info.siblings {
        let name = sibling.rfilename;
        if EXCLUDED_PREFIXES.iter().any(|p| name.starts_with(p)) {
            debug!(repo = repo_id, file = %name, "skipping excluded file");
            continue;
        }
        let path = repo
            .get(&name)
            .map_err(|e| HubError::Artifact(format!("{name}: {e}")))?;
        if artifact_dir.is_none() {
            artifact_dir = path.parent().map(Path::to_path_buf);
        }
    }

    artifact_dir.ok_or_else(|| HubError::Artifact(format!("{repo_id}: empty repository")))
}

/// In-memory store mapping descriptors to fixed directories.
///
/// Test double for the runtime: counts `ensure` calls and serves paths
/// registered up front.
#[derive(Default)]
pub struct StaticArtifactStore {
    paths: Mutex<Vec<(String, PathBuf)>>,
    calls: Mutex<Vec<String>>,
}

impl StaticArtifactStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an artifact directory for a model id.
    pub fn insert(&self, id: impl Into<String>, path: PathBuf) {
        self.paths.lock().push((id.into(), path));
    }

    /// Model ids passed to `ensure`, in call order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }
}

#[async_trait]
impl ArtifactStore for StaticArtifactStore {
    async fn ensure(&self, descriptor: &ModelDescriptor) -> Result<PathBuf> {
        self.calls.lock().push(descriptor.id.clone());
        self.paths
            .lock()
            .iter()
            .find(|(id, _)| *id == descriptor.id)
            .map(|(_, path)| path.clone())
            .ok_or_else(|| HubError::Artifact(format!("{}: not registered", descriptor.id)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quickmt_core::LangPair;

    fn descriptor(id: &str, src: &str, tgt: &str) -> ModelDescriptor {
        ModelDescriptor {
            id: id.into(),
            pair: LangPair::new(src, tgt),
        }
    }

    #[tokio::test]
    async fn static_store_serves_registered_paths() {
        let store = StaticArtifactStore::new();
        let dir = tempfile::tempdir().unwrap();
        store.insert("quickmt/quickmt-fr-en", dir.path().to_path_buf());

        let d = descriptor("quickmt/quickmt-fr-en", "fr", "en");
        let path = store.ensure(&d).await.unwrap();
        assert_eq!(path, dir.path());
        assert_eq!(store.calls(), vec!["quickmt/quickmt-fr-en".to_string()]);
    }

    #[tokio::test]
    async fn static_store_unknown_id_errors() {
        let store = StaticArtifactStore::new();
        let d = descriptor("quickmt/quickmt-zz-en", "zz", "en");
        let err = store.ensure(&d).await.unwrap_err();
        assert!(err.to_string().contains("not registered"));
    }

    #[test]
    fn excluded_prefixes_cover_both_spellings() {
        assert!(EXCLUDED_PREFIXES.iter().any(|p| "eole-model/ckpt".starts_with(p)));
        assert!(EXCLUDED_PREFIXES.iter().any(|p| "eole_model/ckpt".starts_with(p)));
        assert!(!EXCLUDED_PREFIXES.iter().any(|p| "model.bin".starts_with(p)));
    }

    #[test]
    fn cache_miss_on_empty_dir() {
        let dir = tempfile::tempdir().unwrap();
        assert!(lookup_cached("quickmt/quickmt-fr-en", Some(dir.path())).is_none());
    }
}
