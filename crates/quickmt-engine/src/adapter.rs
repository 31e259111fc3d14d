//! Inference adapter contract.
//!
//! The actual forward pass lives in an external engine. The runtime talks
//! to it through [`TranslationEngine`], and obtains instances through
//! [`EngineLoader`]. Both are blocking interfaces: the runner invokes them
//! on a blocking-safe executor so the cooperative loop is never starved.

use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

use quickmt_core::TranslationParams;

use crate::errors::Result;
use crate::tokenizer::TokenizerPair;

/// Compute device selection forwarded to the engine.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Device {
    /// CPU inference.
    Cpu,
    /// GPU inference.
    Gpu,
    /// Let the engine pick.
    Auto,
}

impl FromStr for Device {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "cpu" => Ok(Self::Cpu),
            "gpu" | "cuda" => Ok(Self::Gpu),
            "auto" => Ok(Self::Auto),
            other => Err(format!("unknown device: {other:?}")),
        }
    }
}

/// Engine construction parameters, derived from settings.
#[derive(Clone, Debug)]
pub struct EngineConfig {
    /// Compute device.
    pub device: Device,
    /// Engine precision tag (e.g. `default`, `int8`, `float16`).
    pub compute_type: String,
    /// Concurrent translations.
    pub inter_threads: usize,
    /// Threads per translation.
    pub intra_threads: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            device: Device::Cpu,
            compute_type: "default".into(),
            inter_threads: 1,
            intra_threads: 4,
        }
    }
}

/// The top hypothesis for one input sequence.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Hypothesis {
    /// Output subword tokens.
    pub tokens: Vec<String>,
}

/// A loaded translation engine.
///
/// Implementations must be thread-safe for concurrent calls; a single
/// runner nevertheless serializes calls through its batcher so the engine
/// sees true batches. Resources are released on drop.
pub trait TranslationEngine: Send + Sync {
    /// Translate a batch of pre-tokenized sentences.
    ///
    /// Returns exactly one [`Hypothesis`] per input sequence, in order.
    fn translate_batch(
        &self,
        batch: &[Vec<String>],
        params: &TranslationParams,
    ) -> Result<Vec<Hypothesis>>;
}

/// An engine plus the tokenizers derived from the same artifact.
pub struct LoadedModel {
    /// The inference engine.
    pub engine: Arc<dyn TranslationEngine>,
    /// Source/target subword tokenizers.
    pub tokenizers: TokenizerPair,
}

impl std::fmt::Debug for LoadedModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoadedModel").finish_non_exhaustive()
    }
}

/// Constructs engines from model artifacts.
///
/// `load` is blocking and potentially slow (weight mapping, device
/// initialization); callers keep it off latency-sensitive paths.
pub trait EngineLoader: Send + Sync {
    /// Load the engine and tokenizers from an artifact directory.
    fn load(&self, artifact: &Path, config: &EngineConfig) -> Result<LoadedModel>;
}
