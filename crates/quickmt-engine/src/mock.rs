//! Counting test doubles for the engine contract.
//!
//! Exported as first-class types because the runtime and server crates
//! exercise batching, caching, and single-flight behavior against them.

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use quickmt_core::TranslationParams;

use crate::adapter::{EngineConfig, EngineLoader, Hypothesis, LoadedModel, TranslationEngine};
use crate::errors::{EngineError, Result};
use crate::tokenizer::{SubwordTokenizer, TokenizerPair, EOS_MARKER};

/// Whitespace "subword" tokenizer: pieces are whole words.
pub struct WhitespaceTokenizer;

impl SubwordTokenizer for WhitespaceTokenizer {
    fn encode(&self, text: &str) -> Result<Vec<String>> {
        Ok(text.split_whitespace().map(String::from).collect())
    }

    fn decode(&self, tokens: &[String]) -> Result<String> {
        Ok(tokens.join(" "))
    }
}

/// One recorded adapter call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RecordedCall {
    /// Number of sequences in the batch.
    pub batch_size: usize,
    /// Canonical parameter string the batch ran with.
    pub params: String,
}

/// Deterministic translation engine: uppercases every token.
///
/// Records every call so tests can assert on batch composition, and can be
/// switched into a failing mode to exercise error isolation.
#[derive(Default)]
pub struct MockEngine {
    calls: AtomicUsize,
    fail: AtomicBool,
    log: Mutex<Vec<RecordedCall>>,
}

impl MockEngine {
    /// Create a new mock engine.
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of `translate_batch` invocations.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// All recorded calls, in order.
    pub fn call_log(&self) -> Vec<RecordedCall> {
        self.log.lock().clone()
    }

    /// When set, every call fails with an inference error.
    pub fn set_fail(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }
}

impl TranslationEngine for MockEngine {
    fn translate_batch(
        &self,
        batch: &[Vec<String>],
        params: &TranslationParams,
    ) -> Result<Vec<Hypothesis>> {
        let _ = self.calls.fetch_add(1, Ordering::SeqCst);
        self.log.lock().push(RecordedCall {
            batch_size: batch.len(),
            params: params.canonical(),
        });
        if self.fail.load(Ordering::SeqCst) {
            return Err(EngineError::Inference("mock engine failure".into()));
        }
        Ok(batch
            .iter()
            .map(|tokens| Hypothesis {
                tokens: tokens
                    .iter()
                    .map(|t| {
                        if t == EOS_MARKER {
                            t.clone()
                        } else {
                            t.to_uppercase()
                        }
                    })
                    .collect(),
            })
            .collect())
    }
}

/// Engine loader double with call counting, optional latency, and a
/// failure mode.
#[derive(Default)]
pub struct MockEngineLoader {
    loads: AtomicUsize,
    fail: AtomicBool,
    delay: Option<Duration>,
    engines: Mutex<Vec<Arc<MockEngine>>>,
}

impl MockEngineLoader {
    /// Create a loader that succeeds immediately.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an artificial load latency, widening race windows in tests.
    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::default()
        }
    }

    /// Number of completed `load` calls.
    pub fn loads(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }

    /// When set, every load fails.
    pub fn set_fail(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    /// Engines created so far, in load order.
    pub fn engines(&self) -> Vec<Arc<MockEngine>> {
        self.engines.lock().clone()
    }

    /// The most recently created engine.
    pub fn last_engine(&self) -> Option<Arc<MockEngine>> {
        self.engines.lock().last().cloned()
    }
}

impl EngineLoader for MockEngineLoader {
    fn load(&self, _artifact: &Path, _config: &EngineConfig) -> Result<LoadedModel> {
        if let Some(delay) = self.delay {
            std::thread::sleep(delay);
        }
        let _ = self.loads.fetch_add(1, Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) {
            return Err(EngineError::Load("mock load failure".into()));
        }
        let engine = Arc::new(MockEngine::new());
        self.engines.lock().push(engine.clone());
        Ok(LoadedModel {
            engine,
            tokenizers: TokenizerPair::split(
                Arc::new(WhitespaceTokenizer),
                Arc::new(WhitespaceTokenizer),
            ),
        })
    }
}
