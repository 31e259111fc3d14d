//! Bounded working set of model runners.
//!
//! One mutex guards the LRU and the pending-load map; it is only ever held
//! for bookkeeping. Everything slow — artifact fetch, engine load, runner
//! drain — happens outside the lock. Concurrent demand for the same pair
//! shares a single load through a watch channel.

use std::collections::HashMap;
use std::sync::Arc;

use lru::LruCache;
use parking_lot::Mutex;
use tokio::sync::watch;
use tracing::{debug, error, info};

use quickmt_core::LangPair;
use quickmt_engine::{EngineConfig, EngineLoader};
use quickmt_hub::{ArtifactStore, ModelDescriptor, Registry};

use crate::errors::{Result, RuntimeError};
use crate::runner::{ModelRunner, RunnerConfig};

/// Completion broadcast for one in-flight load. `None` until the load
/// finishes; then `Some(Ok(()))` or `Some(Err(message))`.
type LoadSignal = watch::Receiver<Option<std::result::Result<(), String>>>;

/// Manager construction parameters.
#[derive(Clone, Debug)]
pub struct ManagerConfig {
    /// Maximum number of loaded runners.
    pub capacity: usize,
    /// Per-runner batching configuration.
    pub runner: RunnerConfig,
    /// Engine construction parameters.
    pub engine: EngineConfig,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            capacity: 5,
            runner: RunnerConfig::default(),
            engine: EngineConfig::default(),
        }
    }
}

/// Registry entry plus whether a runner for it is currently loaded.
#[derive(Clone, Debug)]
pub struct ModelStatus {
    /// The catalogue descriptor.
    pub descriptor: ModelDescriptor,
    /// Whether the pair is in the LRU right now.
    pub loaded: bool,
}

struct Book {
    lru: LruCache<LangPair, Arc<ModelRunner>>,
    pending: HashMap<LangPair, LoadSignal>,
}

/// Everything a background load task needs, shared by reference counting
/// so the manager itself stays an ordinary owned value.
struct Shared {
    book: Mutex<Book>,
    registry: Arc<Registry>,
    store: Arc<dyn ArtifactStore>,
    loader: Arc<dyn EngineLoader>,
    config: ManagerConfig,
}

/// LRU admission/eviction controller over model runners.
pub struct ModelManager {
    shared: Arc<Shared>,
}

impl ModelManager {
    /// Create a manager over a registry, artifact store, and engine loader.
    pub fn new(
        registry: Arc<Registry>,
        store: Arc<dyn ArtifactStore>,
        loader: Arc<dyn EngineLoader>,
        config: ManagerConfig,
    ) -> Arc<Self> {
        Arc::new(Self {
            shared: Arc::new(Shared {
                book: Mutex::new(Book {
                    lru: LruCache::unbounded(),
                    pending: HashMap::new(),
                }),
                registry,
                store,
                loader,
                config,
            }),
        })
    }

    /// Maximum number of loaded runners.
    pub fn capacity(&self) -> usize {
        self.shared.config.capacity
    }

    /// Get the runner for a pair, loading it on demand.
    ///
    /// Concurrent calls for the same pair share one load; a pair with no
    /// catalogue entry fails fast with [`RuntimeError::ModelNotFound`].
    pub async fn get(&self, src: &str, tgt: &str) -> Result<Arc<ModelRunner>> {
        let pair = LangPair::new(src, tgt);
        loop {
            let mut signal = {
                let mut book = self.shared.book.lock();
                if let Some(runner) = book.lru.get(&pair) {
                    return Ok(runner.clone());
                }
                if let Some(signal) = book.pending.get(&pair) {
                    signal.clone()
                } else {
                    // Fail fast before spawning anything when the pair is
                    // not in the catalogue at all.
                    let Some(descriptor) = self.shared.registry.resolve(&pair.src, &pair.tgt)
                    else {
                        return Err(RuntimeError::ModelNotFound {
                            src: pair.src.clone(),
                            tgt: pair.tgt.clone(),
                        });
                    };
                    let (tx, rx) = watch::channel(None);
                    let _ = book.pending.insert(pair.clone(), rx.clone());
                    let shared = self.shared.clone();
                    let task_pair = pair.clone();
                    let _ = tokio::spawn(async move {
                        load_task(shared, descriptor, task_pair, tx).await;
                    });
                    rx
                }
            };

            let outcome = match signal.wait_for(|v| v.is_some()).await {
                Ok(value) => value.clone().unwrap_or(Err("load interrupted".into())),
                Err(_) => Err("load task dropped".into()),
            };
            if let Err(message) = outcome {
                return Err(RuntimeError::Load(message));
            }

            // Re-acquire and read the entry. In the unlikely event the new
            // runner was already evicted by racing loads, start over.
            {
                let mut book = self.shared.book.lock();
                if let Some(runner) = book.lru.get(&pair) {
                    return Ok(runner.clone());
                }
            }
            debug!(pair = %pair, "runner evicted before first use, retrying");
        }
    }

    /// All catalogue models with their load status.
    pub fn list_models(&self) -> Vec<ModelStatus> {
        let book = self.shared.book.lock();
        self.shared
            .registry
            .models()
            .into_iter()
            .map(|descriptor| {
                let loaded = book.lru.contains(&descriptor.pair);
                ModelStatus { descriptor, loaded }
            })
            .collect()
    }

    /// Currently loaded pairs, most recently used first.
    pub fn loaded_pairs(&self) -> Vec<String> {
        self.shared
            .book
            .lock()
            .lru
            .iter()
            .map(|(pair, _)| pair.to_string())
            .collect()
    }

    /// Source → sorted target languages from the catalogue.
    pub fn language_pairs(&self) -> std::collections::BTreeMap<String, Vec<String>> {
        self.shared.registry.language_pairs()
    }

    /// Stop every runner and clear the working set. Idempotent.
    pub async fn shutdown(&self) {
        let runners: Vec<Arc<ModelRunner>> = {
            let mut book = self.shared.book.lock();
            let mut drained = Vec::with_capacity(book.lru.len());
            while let Some((_, runner)) = book.lru.pop_lru() {
                drained.push(runner);
            }
            drained
        };
        for runner in runners {
            runner.stop().await;
        }
        info!("model manager shut down");
    }
}

async fn load_task(
    shared: Arc<Shared>,
    descriptor: ModelDescriptor,
    pair: LangPair,
    tx: watch::Sender<Option<std::result::Result<(), String>>>,
) {
    let result = do_load(&shared, &descriptor, &pair).await;
    if let Err(message) = &result {
        error!(pair = %pair, error = %message, "model load failed");
    }
    // Removal and completion happen under one lock hold, so a pending
    // entry is never observable after its signal fired.
    let mut book = shared.book.lock();
    let _ = book.pending.remove(&pair);
    let _ = tx.send(Some(result));
}

async fn do_load(
    shared: &Arc<Shared>,
    descriptor: &ModelDescriptor,
    pair: &LangPair,
) -> std::result::Result<(), String> {
    // Potentially slow network/disk work, outside the lock.
    let artifact = shared
        .store
        .ensure(descriptor)
        .await
        .map_err(|e| e.to_string())?;

    let evicted = {
        let mut book = shared.book.lock();
        if book.lru.len() >= shared.config.capacity {
            book.lru.pop_lru()
        } else {
            None
        }
    };
    if let Some((evicted_pair, runner)) = evicted {
        info!(pair = %evicted_pair, "evicting model");
        runner.stop().await;
    }

    info!(model = %descriptor.id, pair = %pair, "loading model");
    let runner = Arc::new(ModelRunner::new(
        descriptor.clone(),
        shared.config.runner.clone(),
    ));
    runner
        .start(&shared.loader, &artifact, &shared.config.engine)
        .await
        .map_err(|e| e.to_string())?;

    let mut book = shared.book.lock();
    let _ = book.lru.push(pair.clone(), runner);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use quickmt_core::TranslationParams;
    use quickmt_engine::MockEngineLoader;
    use quickmt_hub::StaticArtifactStore;
    use std::time::Duration;

    fn registry(pairs: &[(&str, &str)]) -> Arc<Registry> {
        Arc::new(Registry::with_models(
            pairs
                .iter()
                .map(|(src, tgt)| ModelDescriptor {
                    id: format!("quickmt/quickmt-{src}-{tgt}"),
                    pair: LangPair::new(*src, *tgt),
                })
                .collect(),
        ))
    }

    fn store_for(pairs: &[(&str, &str)]) -> Arc<StaticArtifactStore> {
        let store = StaticArtifactStore::new();
        for (src, tgt) in pairs {
            store.insert(format!("quickmt/quickmt-{src}-{tgt}"), std::env::temp_dir());
        }
        Arc::new(store)
    }

    fn manager_with(
        pairs: &[(&str, &str)],
        capacity: usize,
        loader: Arc<MockEngineLoader>,
    ) -> Arc<ModelManager> {
        ModelManager::new(
            registry(pairs),
            store_for(pairs),
            loader,
            ManagerConfig {
                capacity,
                ..ManagerConfig::default()
            },
        )
    }

    #[tokio::test]
    async fn get_loads_on_demand() {
        let loader = Arc::new(MockEngineLoader::new());
        let manager = manager_with(&[("fr", "en")], 2, loader.clone());

        let runner = manager.get("fr", "en").await.unwrap();
        assert_eq!(runner.descriptor().id, "quickmt/quickmt-fr-en");
        assert_eq!(loader.loads(), 1);
        assert_eq!(manager.loaded_pairs(), vec!["fr-en"]);
        manager.shutdown().await;
    }

    #[tokio::test]
    async fn second_get_reuses_runner() {
        let loader = Arc::new(MockEngineLoader::new());
        let manager = manager_with(&[("fr", "en")], 2, loader.clone());

        let a = manager.get("fr", "en").await.unwrap();
        let b = manager.get("fr", "en").await.unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(loader.loads(), 1);
        manager.shutdown().await;
    }

    #[tokio::test]
    async fn unknown_pair_is_not_found() {
        let loader = Arc::new(MockEngineLoader::new());
        let manager = manager_with(&[("fr", "en")], 2, loader.clone());

        let err = manager.get("en", "zz").await.unwrap_err();
        assert_matches!(err, RuntimeError::ModelNotFound { .. });
        assert!(err.to_string().contains("not found"));
        assert_eq!(loader.loads(), 0);
    }

    #[tokio::test]
    async fn concurrent_gets_share_one_load() {
        let loader = Arc::new(MockEngineLoader::with_delay(Duration::from_millis(30)));
        let manager = manager_with(&[("fr", "en")], 2, loader.clone());

        let mut handles = Vec::new();
        for _ in 0..8 {
            let manager = manager.clone();
            handles.push(tokio::spawn(async move { manager.get("fr", "en").await }));
        }
        for handle in handles {
            assert!(handle.await.unwrap().is_ok());
        }
        assert_eq!(loader.loads(), 1);
        manager.shutdown().await;
    }

    #[tokio::test]
    async fn lru_evicts_least_recently_used() {
        let loader = Arc::new(MockEngineLoader::new());
        let manager = manager_with(&[("en", "fr"), ("fr", "en"), ("es", "en")], 2, loader);

        let first = manager.get("en", "fr").await.unwrap();
        let _ = manager.get("fr", "en").await.unwrap();
        let _ = manager.get("es", "en").await.unwrap();

        let loaded = manager.loaded_pairs();
        assert_eq!(loaded.len(), 2);
        assert!(loaded.contains(&"fr-en".to_string()));
        assert!(loaded.contains(&"es-en".to_string()));
        assert!(!loaded.contains(&"en-fr".to_string()));
        // The evicted runner was fully closed.
        assert_eq!(first.state(), crate::runner::RunnerState::Closed);
        manager.shutdown().await;
    }

    #[tokio::test]
    async fn get_promotes_to_most_recently_used() {
        let loader = Arc::new(MockEngineLoader::new());
        let manager = manager_with(&[("en", "fr"), ("fr", "en"), ("es", "en")], 2, loader);

        let _ = manager.get("en", "fr").await.unwrap();
        let _ = manager.get("fr", "en").await.unwrap();
        // Touch en-fr so fr-en becomes the eviction candidate.
        let _ = manager.get("en", "fr").await.unwrap();
        let _ = manager.get("es", "en").await.unwrap();

        let loaded = manager.loaded_pairs();
        assert!(loaded.contains(&"en-fr".to_string()));
        assert!(!loaded.contains(&"fr-en".to_string()));
        manager.shutdown().await;
    }

    #[tokio::test]
    async fn failed_load_propagates_and_allows_retry() {
        let loader = Arc::new(MockEngineLoader::new());
        let manager = manager_with(&[("fr", "en")], 2, loader.clone());

        loader.set_fail(true);
        let err = manager.get("fr", "en").await.unwrap_err();
        assert_matches!(err, RuntimeError::Load(_));
        assert!(manager.loaded_pairs().is_empty());

        // The pending entry is gone; a later request retries cleanly.
        loader.set_fail(false);
        assert!(manager.get("fr", "en").await.is_ok());
        manager.shutdown().await;
    }

    #[tokio::test]
    async fn list_models_reports_loaded_flags() {
        let loader = Arc::new(MockEngineLoader::new());
        let manager = manager_with(&[("en", "fr"), ("fr", "en")], 2, loader);

        let _ = manager.get("fr", "en").await.unwrap();
        let statuses = manager.list_models();
        assert_eq!(statuses.len(), 2);
        let by_id = |id: &str| {
            statuses
                .iter()
                .find(|s| s.descriptor.id == id)
                .unwrap()
                .loaded
        };
        assert!(by_id("quickmt/quickmt-fr-en"));
        assert!(!by_id("quickmt/quickmt-en-fr"));
        manager.shutdown().await;
    }

    #[tokio::test]
    async fn shutdown_stops_everything_and_is_idempotent() {
        let loader = Arc::new(MockEngineLoader::new());
        let manager = manager_with(&[("en", "fr"), ("fr", "en")], 2, loader);

        let a = manager.get("en", "fr").await.unwrap();
        let b = manager.get("fr", "en").await.unwrap();
        manager.shutdown().await;
        manager.shutdown().await;

        assert!(manager.loaded_pairs().is_empty());
        assert_eq!(a.state(), crate::runner::RunnerState::Closed);
        assert_eq!(b.state(), crate::runner::RunnerState::Closed);
    }

    #[tokio::test]
    async fn loaded_runner_translates_end_to_end() {
        let loader = Arc::new(MockEngineLoader::new());
        let manager = manager_with(&[("fr", "en")], 2, loader);

        let runner = manager.get("fr", "en").await.unwrap();
        let out = runner
            .translate("bonjour", "fr", "en", &TranslationParams::default())
            .await
            .unwrap();
        assert_eq!(out, "BONJOUR");
        manager.shutdown().await;
    }
}
