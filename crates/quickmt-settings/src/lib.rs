//! # quickmt-settings
//!
//! Gateway configuration. Loading flow:
//!
//! 1. Start with compiled [`Settings::default()`]
//! 2. If a `.env` dotfile is present, load it into the process environment
//! 3. Apply environment variable overrides (highest priority)
//!
//! Variable names are matched case-insensitively (`MAX_LOADED_MODELS` and
//! `max_loaded_models` both work). Invalid or out-of-range values are
//! ignored with a log line, falling back to the default.

#![deny(unsafe_code)]

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// All gateway settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Maximum number of translation models kept loaded (LRU bound).
    pub max_loaded_models: usize,
    /// Compute device for the engine: `cpu`, `gpu`, or `auto`.
    pub device: String,
    /// Engine compute precision tag (forwarded verbatim).
    pub compute_type: String,
    /// Concurrent translations within the engine.
    pub inter_threads: usize,
    /// Threads per translation within the engine.
    pub intra_threads: usize,
    /// Maximum number of jobs coalesced into one inference batch.
    pub max_batch_size: usize,
    /// How long the batcher waits for additional batchable jobs.
    pub batch_timeout_ms: u64,
    /// Per-runner job queue capacity (back-pressure bound).
    pub queue_capacity: usize,
    /// Path to the language-ID model file; `None` uses the XDG cache path.
    pub langid_model_path: Option<String>,
    /// Number of language-ID workers.
    pub langid_workers: usize,
    /// Per-runner translation cache capacity (LRU entries).
    pub translation_cache_size: usize,
    /// Host to bind.
    pub host: String,
    /// Port to bind.
    pub port: u16,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            max_loaded_models: 5,
            device: "cpu".into(),
            compute_type: "default".into(),
            inter_threads: 1,
            intra_threads: 4,
            max_batch_size: 32,
            batch_timeout_ms: 5,
            queue_capacity: 1024,
            langid_model_path: None,
            langid_workers: 2,
            translation_cache_size: 10_000,
            host: "0.0.0.0".into(),
            port: 8000,
        }
    }
}

impl Settings {
    /// Load settings: defaults, then the `.env` dotfile, then env overrides.
    pub fn load() -> Self {
        if let Ok(path) = dotenvy::dotenv() {
            debug!(path = %path.display(), "loaded .env dotfile");
        }
        let mut settings = Self::default();
        apply_overrides(&mut settings, |name| {
            std::env::var(name)
                .or_else(|_| std::env::var(name.to_lowercase()))
                .ok()
                .filter(|v| !v.is_empty())
        });
        settings
    }
}

/// Apply variable overrides to `settings` using `lookup` to resolve names.
///
/// `lookup` receives the canonical uppercase name; the production caller
/// also consults the lowercase spelling for case-insensitivity.
pub fn apply_overrides<F>(settings: &mut Settings, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    let usize_of = |name: &str, min, max| {
        lookup(name).and_then(|raw| parse_usize_range(name, &raw, min, max))
    };
    let u64_of =
        |name: &str, min, max| lookup(name).and_then(|raw| parse_u64_range(name, &raw, min, max));

    if let Some(v) = usize_of("MAX_LOADED_MODELS", 1, 1_000) {
        settings.max_loaded_models = v;
    }
    if let Some(v) = lookup("DEVICE") {
        settings.device = v;
    }
    if let Some(v) = lookup("COMPUTE_TYPE") {
        settings.compute_type = v;
    }
    if let Some(v) = usize_of("INTER_THREADS", 1, 512) {
        settings.inter_threads = v;
    }
    if let Some(v) = usize_of("INTRA_THREADS", 0, 512) {
        settings.intra_threads = v;
    }
    if let Some(v) = usize_of("MAX_BATCH_SIZE", 1, 4096) {
        settings.max_batch_size = v;
    }
    if let Some(v) = u64_of("BATCH_TIMEOUT_MS", 0, 60_000) {
        settings.batch_timeout_ms = v;
    }
    if let Some(v) = usize_of("QUEUE_CAPACITY", 1, 1_000_000) {
        settings.queue_capacity = v;
    }
    if let Some(v) = lookup("LANGID_MODEL_PATH") {
        settings.langid_model_path = Some(v);
    }
    if let Some(v) = usize_of("LANGID_WORKERS", 1, 256) {
        settings.langid_workers = v;
    }
    if let Some(v) = usize_of("TRANSLATION_CACHE_SIZE", 1, 100_000_000) {
        settings.translation_cache_size = v;
    }
    if let Some(v) = lookup("HOST") {
        settings.host = v;
    }
    if let Some(v) = usize_of("PORT", 1, 65_535) {
        settings.port = u16::try_from(v).unwrap_or(settings.port);
    }
}

fn parse_usize_range(name: &str, raw: &str, min: usize, max: usize) -> Option<usize> {
    match raw.parse::<usize>() {
        Ok(v) if (min..=max).contains(&v) => Some(v),
        _ => {
            warn!(name, raw, "invalid value, ignoring");
            None
        }
    }
}

fn parse_u64_range(name: &str, raw: &str, min: u64, max: u64) -> Option<u64> {
    match raw.parse::<u64>() {
        Ok(v) if (min..=max).contains(&v) => Some(v),
        _ => {
            warn!(name, raw, "invalid value, ignoring");
            None
        }
    }
}
