//! # quickmt-serve
//!
//! Gateway server binary — wires the registry, artifact store, language
//! identification pool, and model manager together and serves the HTTP
//! API until interrupted.

#![deny(unsafe_code)]

use std::str::FromStr;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use quickmt_engine::{Device, EngineConfig, EngineLoader};
use quickmt_hub::registry::DEFAULT_COLLECTION_URL;
use quickmt_hub::{HubArtifactStore, Registry};
use quickmt_langid::{ClassifierFactory, LangIdPool};
use quickmt_runtime::{ManagerConfig, ModelManager, Orchestrator, RunnerConfig};
use quickmt_server::{AppState, GatewayServer};
use quickmt_settings::Settings;

/// quickmt translation gateway server.
#[derive(Parser, Debug)]
#[command(name = "quickmt-serve", about = "Multi-model translation gateway")]
struct Cli {
    /// Host to bind (overrides settings).
    #[arg(long)]
    host: Option<String>,

    /// Port to bind (overrides settings).
    #[arg(long)]
    port: Option<u16>,
}

fn manager_config(settings: &Settings) -> ManagerConfig {
    let device = Device::from_str(&settings.device).unwrap_or_else(|e| {
        warn!(device = %settings.device, error = %e, "falling back to cpu");
        Device::Cpu
    });
    ManagerConfig {
        capacity: settings.max_loaded_models,
        runner: RunnerConfig {
            max_batch_size: settings.max_batch_size,
            batch_timeout: std::time::Duration::from_millis(settings.batch_timeout_ms),
            queue_capacity: settings.queue_capacity,
            cache_size: settings.translation_cache_size,
        },
        engine: EngineConfig {
            device,
            compute_type: settings.compute_type.clone(),
            inter_threads: settings.inter_threads,
            intra_threads: settings.intra_threads,
        },
    }
}

/// Pick the inference backend the build carries.
fn engine_loader() -> Result<Arc<dyn EngineLoader>> {
    #[cfg(feature = "ct2")]
    return Ok(Arc::new(quickmt_engine::ct2::Ct2Loader::new()));
    #[cfg(not(feature = "ct2"))]
    anyhow::bail!("built without an inference backend; rebuild with --features ct2")
}

/// Build the language identification pool.
///
/// With the `fasttext` feature the model file is ensured on disk by this
/// (main) process before any worker starts; the default build uses the
/// in-process whatlang backend, which needs no model file.
async fn build_langid(settings: &Settings) -> quickmt_langid::Result<LangIdPool> {
    #[cfg(feature = "fasttext")]
    {
        let path = settings
            .langid_model_path
            .as_ref()
            .map_or_else(quickmt_langid::default_model_path, std::path::PathBuf::from);
        quickmt_langid::ensure_model(&path).await?;
        let factory: Arc<dyn ClassifierFactory> =
            Arc::new(quickmt_langid::fasttext_backend::FastTextFactory::new(path));
        return LangIdPool::start(&factory, settings.langid_workers);
    }
    #[cfg(not(feature = "fasttext"))]
    {
        if settings.langid_model_path.is_some() {
            warn!("LANGID_MODEL_PATH set but built without the fasttext feature; using whatlang");
        }
        let factory: Arc<dyn ClassifierFactory> = Arc::new(quickmt_langid::WhatlangFactory);
        LangIdPool::start(&factory, settings.langid_workers)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let args = Cli::parse();
    let mut settings = Settings::load();
    if let Some(host) = args.host {
        settings.host = host;
    }
    if let Some(port) = args.port {
        settings.port = port;
    }

    // 1. Discover available models from the remote catalogue.
    let registry = Arc::new(Registry::new(DEFAULT_COLLECTION_URL));
    registry.refresh().await;

    // 2. Warm language identification before anything depends on it.
    let langid = match build_langid(&settings).await {
        Ok(pool) => Some(Arc::new(pool)),
        Err(e) => {
            warn!(error = %e, "language identification unavailable; requests must set src_lang");
            None
        }
    };

    // 3. Model manager over the hub artifact store.
    let loader = engine_loader()?;
    let store = Arc::new(HubArtifactStore::new());
    let manager = ModelManager::new(registry, store, loader, manager_config(&settings));
    let orchestrator = Arc::new(Orchestrator::new(manager.clone(), langid.clone()));

    let state = AppState::new(orchestrator, langid.clone(), settings);
    let server = GatewayServer::new(state);
    let (addr, handle) = server.listen().await?;
    info!(%addr, "quickmt gateway ready");

    tokio::signal::ctrl_c().await?;
    info!("shutdown signal received");

    server.shutdown().shutdown();
    let _ = handle.await;
    if let Some(pool) = langid {
        pool.stop();
    }
    manager.shutdown().await;
    Ok(())
}
