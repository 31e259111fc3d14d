//! One loaded model and its serving machinery.
//!
//! A runner owns the engine, the tokenizers, a bounded FIFO of jobs, and a
//! background batcher that coalesces compatible jobs into single engine
//! calls. Results are memoized in a per-runner LRU keyed by request
//! fingerprint; the cache is consulted at submission time only, never
//! inside the batcher.

use std::num::NonZeroUsize;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use lru::LruCache;
use parking_lot::{Mutex, RwLock};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use quickmt_core::{RequestFingerprint, TranslationParams};
use quickmt_engine::{EngineConfig, EngineLoader, SentenceSegmenter, TokenizerPair, TranslationEngine};
use quickmt_hub::ModelDescriptor;

use crate::errors::{Result, RuntimeError};

/// Batching and queueing knobs for one runner.
#[derive(Clone, Debug)]
pub struct RunnerConfig {
    /// Maximum jobs coalesced into one engine call.
    pub max_batch_size: usize,
    /// How long to wait for additional batchable jobs.
    pub batch_timeout: Duration,
    /// Bounded queue capacity; a full queue back-pressures submitters.
    pub queue_capacity: usize,
    /// Result cache capacity.
    pub cache_size: usize,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            max_batch_size: 32,
            batch_timeout: Duration::from_millis(5),
            queue_capacity: 1024,
            cache_size: 10_000,
        }
    }
}

/// Runner lifecycle. `Ready → Draining` is one-way; a `Closed` runner
/// accepts no further jobs and its queue is empty.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RunnerState {
    /// Created, engine not loaded yet.
    Loading,
    /// Serving jobs.
    Ready,
    /// Shutting down, queue draining.
    Draining,
    /// Fully stopped, resources released.
    Closed,
}

/// Jobs only batch together when this key matches exactly.
#[derive(Clone, Debug, PartialEq, Eq)]
struct BatchKey {
    src_lang: String,
    tgt_lang: String,
    params: String,
}

struct Job {
    text: String,
    fingerprint: RequestFingerprint,
    key: BatchKey,
    params: TranslationParams,
    reply: oneshot::Sender<std::result::Result<String, String>>,
}

enum QueueItem {
    Job(Box<Job>),
    Sentinel,
}

struct BatcherContext {
    model_id: String,
    engine: Arc<dyn TranslationEngine>,
    tokenizers: TokenizerPair,
    segmenter: Arc<SentenceSegmenter>,
    cache: Arc<Mutex<LruCache<RequestFingerprint, String>>>,
    max_batch_size: usize,
    batch_timeout: Duration,
}

/// A loaded model plus queue, batcher, and cache.
#[derive(Debug)]
pub struct ModelRunner {
    descriptor: ModelDescriptor,
    config: RunnerConfig,
    state: RwLock<RunnerState>,
    tx: Mutex<Option<mpsc::Sender<QueueItem>>>,
    batcher: Mutex<Option<JoinHandle<()>>>,
    cache: Arc<Mutex<LruCache<RequestFingerprint, String>>>,
}

impl ModelRunner {
    /// Create a runner in the `Loading` state.
    pub fn new(descriptor: ModelDescriptor, config: RunnerConfig) -> Self {
        let cache_size = NonZeroUsize::new(config.cache_size.max(1))
            .unwrap_or(NonZeroUsize::MIN);
        Self {
            descriptor,
            config,
            state: RwLock::new(RunnerState::Loading),
            tx: Mutex::new(None),
            batcher: Mutex::new(None),
            cache: Arc::new(Mutex::new(LruCache::new(cache_size))),
        }
    }

    /// The catalogue descriptor this runner serves.
    pub fn descriptor(&self) -> &ModelDescriptor {
        &self.descriptor
    }

    /// Current lifecycle state.
    pub fn state(&self) -> RunnerState {
        *self.state.read()
    }

    /// Load the engine and tokenizers and start the batcher.
    ///
    /// Loading is blocking and runs on a worker thread; on failure the
    /// runner stays in `Loading` and can be discarded.
    pub async fn start(
        &self,
        loader: &Arc<dyn EngineLoader>,
        artifact: &Path,
        engine_config: &EngineConfig,
    ) -> Result<()> {
        let loaded = {
            let loader = loader.clone();
            let artifact = artifact.to_path_buf();
            let engine_config = engine_config.clone();
            tokio::task::spawn_blocking(move || loader.load(&artifact, &engine_config))
                .await
                .map_err(|e| RuntimeError::Load(format!("load task join error: {e}")))?
                .map_err(|e| RuntimeError::Load(e.to_string()))?
        };

        let (tx, rx) = mpsc::channel(self.config.queue_capacity);
        let ctx = BatcherContext {
            model_id: self.descriptor.id.clone(),
            engine: loaded.engine,
            tokenizers: loaded.tokenizers,
            segmenter: Arc::new(SentenceSegmenter::new()),
            cache: self.cache.clone(),
            max_batch_size: self.config.max_batch_size,
            batch_timeout: self.config.batch_timeout,
        };
        *self.batcher.lock() = Some(tokio::spawn(batcher_loop(rx, ctx)));
        *self.tx.lock() = Some(tx);
        *self.state.write() = RunnerState::Ready;
        info!(model = %self.descriptor.id, "model runner ready");
        Ok(())
    }

    /// Translate one source text.
    ///
    /// Returns immediately on a cache hit; otherwise enqueues a job and
    /// awaits its promise. A full queue awaits rather than failing.
    pub async fn translate(
        &self,
        text: &str,
        src_lang: &str,
        tgt_lang: &str,
        params: &TranslationParams,
    ) -> Result<String> {
        let fingerprint = RequestFingerprint::new(text, src_lang, tgt_lang, params);
        if let Some(hit) = self.cache.lock().get(&fingerprint).cloned() {
            debug!(model = %self.descriptor.id, "translation cache hit");
            return Ok(hit);
        }

        let tx = self.tx.lock().clone().ok_or(RuntimeError::Closed)?;
        let (reply_tx, reply_rx) = oneshot::channel();
        let job = Job {
            text: text.to_string(),
            fingerprint,
            key: BatchKey {
                src_lang: src_lang.to_string(),
                tgt_lang: tgt_lang.to_string(),
                params: params.canonical(),
            },
            params: params.clone(),
            reply: reply_tx,
        };
        tx.send(QueueItem::Job(Box::new(job)))
            .await
            .map_err(|_| RuntimeError::Closed)?;

        match reply_rx.await {
            Ok(Ok(translation)) => Ok(translation),
            Ok(Err(msg)) => Err(RuntimeError::Translation(msg)),
            Err(_) => Err(RuntimeError::Closed),
        }
    }

    /// Drain the queue and release engine resources. Idempotent.
    pub async fn stop(&self) {
        {
            let mut state = self.state.write();
            match *state {
                RunnerState::Draining | RunnerState::Closed => return,
                RunnerState::Loading | RunnerState::Ready => *state = RunnerState::Draining,
            }
        }

        let tx = self.tx.lock().take();
        if let Some(tx) = tx {
            // The sentinel lands behind every accepted job; the batcher
            // finishes them before exiting.
            let _ = tx.send(QueueItem::Sentinel).await;
        }
        let handle = self.batcher.lock().take();
        if let Some(handle) = handle {
            if handle.await.is_err() {
                warn!(model = %self.descriptor.id, "batcher task panicked");
            }
        }
        *self.state.write() = RunnerState::Closed;
        info!(model = %self.descriptor.id, "model runner stopped");
    }
}

/// The batch coalescing loop.
///
/// Takes one job, then keeps appending jobs with an identical batch key
/// until the batch is full or the timeout elapses. A non-matching job (or
/// the shutdown sentinel) is parked in a one-slot look-ahead buffer and
/// handled on the next cycle, which guarantees forward progress with
/// bounded reordering.
///
/// Awaiters that gave up are simply absent on the reply channel; batches
/// run to completion regardless and such results are dropped silently.
async fn batcher_loop(mut rx: mpsc::Receiver<QueueItem>, ctx: BatcherContext) {
    let mut lookahead: Option<QueueItem> = None;
    loop {
        let first = match lookahead.take() {
            Some(item) => item,
            None => match rx.recv().await {
                Some(item) => item,
                None => break,
            },
        };
        let first = match first {
            QueueItem::Sentinel => break,
            QueueItem::Job(job) => job,
        };

        let mut batch = vec![first];
        let deadline = Instant::now() + ctx.batch_timeout;
        while batch.len() < ctx.max_batch_size {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                break;
            }
            match tokio::time::timeout(remaining, rx.recv()).await {
                Err(_) => break,
                Ok(None) => break,
                Ok(Some(QueueItem::Sentinel)) => {
                    lookahead = Some(QueueItem::Sentinel);
                    break;
                }
                Ok(Some(QueueItem::Job(next))) => {
                    if next.key == batch[0].key {
                        batch.push(next);
                    } else {
                        lookahead = Some(QueueItem::Job(next));
                        break;
                    }
                }
            }
        }

        process_batch(&ctx, batch).await;
    }
    debug!(model = %ctx.model_id, "batcher exited");
}

async fn process_batch(ctx: &BatcherContext, batch: Vec<Box<Job>>) {
    let texts: Vec<String> = batch.iter().map(|j| j.text.clone()).collect();
    let params = batch[0].params.clone();
    let count = texts.len();

    let engine = ctx.engine.clone();
    let tokenizers = ctx.tokenizers.clone();
    let segmenter = ctx.segmenter.clone();

    // Inference is uninterruptible once started; run it on a worker thread
    // so the cooperative loop is not starved.
    let outcome = tokio::task::spawn_blocking(move || -> quickmt_engine::Result<Vec<String>> {
        let segmented = segmenter.split(&texts);
        if segmented.is_empty() {
            return Ok(vec![String::new(); count]);
        }
        let encoded = tokenizers.encode_batch(&segmented.sentences)?;
        let hypotheses = engine.translate_batch(&encoded, &params)?;
        let decoded: quickmt_engine::Result<Vec<String>> = hypotheses
            .iter()
            .map(|h| tokenizers.decode(&h.tokens))
            .collect();
        Ok(segmenter.join(
            &segmented.input_ids,
            &segmented.paragraph_ids,
            &decoded?,
            count,
        ))
    })
    .await;

    match outcome {
        Ok(Ok(outputs)) => {
            let mut cache = ctx.cache.lock();
            for (job, output) in batch.into_iter().zip(outputs) {
                let _ = cache.put(job.fingerprint.clone(), output.clone());
                let _ = job.reply.send(Ok(output));
            }
        }
        Ok(Err(e)) => {
            let msg = e.to_string();
            warn!(model = %ctx.model_id, error = %msg, batch = count, "batch failed");
            for job in batch {
                let _ = job.reply.send(Err(msg.clone()));
            }
        }
        Err(e) => {
            let msg = format!("inference task failed: {e}");
            warn!(model = %ctx.model_id, error = %msg, "batch join error");
            for job in batch {
                let _ = job.reply.send(Err(msg.clone()));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use quickmt_core::LangPair;
    use quickmt_engine::{MockEngine, MockEngineLoader};

    fn descriptor() -> ModelDescriptor {
        ModelDescriptor {
            id: "quickmt/quickmt-fr-en".into(),
            pair: LangPair::new("fr", "en"),
        }
    }

    fn config(timeout_ms: u64) -> RunnerConfig {
        RunnerConfig {
            batch_timeout: Duration::from_millis(timeout_ms),
            ..RunnerConfig::default()
        }
    }

    async fn started_runner(timeout_ms: u64) -> (ModelRunner, Arc<MockEngine>) {
        let loader = Arc::new(MockEngineLoader::new());
        let runner = ModelRunner::new(descriptor(), config(timeout_ms));
        let dyn_loader: Arc<dyn EngineLoader> = loader.clone();
        runner
            .start(&dyn_loader, Path::new("/unused"), &EngineConfig::default())
            .await
            .unwrap();
        let engine = loader.last_engine().expect("loader ran");
        (runner, engine)
    }

    fn params() -> TranslationParams {
        TranslationParams::default()
    }

    #[tokio::test]
    async fn fresh_runner_is_loading() {
        let runner = ModelRunner::new(descriptor(), RunnerConfig::default());
        assert_eq!(runner.state(), RunnerState::Loading);
    }

    #[tokio::test]
    async fn start_transitions_to_ready() {
        let (runner, _engine) = started_runner(5).await;
        assert_eq!(runner.state(), RunnerState::Ready);
    }

    #[tokio::test]
    async fn failed_load_leaves_runner_loading() {
        let loader = Arc::new(MockEngineLoader::new());
        loader.set_fail(true);
        let runner = ModelRunner::new(descriptor(), config(5));
        let dyn_loader: Arc<dyn EngineLoader> = loader.clone();
        let err = runner
            .start(&dyn_loader, Path::new("/unused"), &EngineConfig::default())
            .await
            .unwrap_err();
        assert_matches!(err, RuntimeError::Load(_));
        assert_eq!(runner.state(), RunnerState::Loading);
    }

    #[tokio::test]
    async fn translates_single_text() {
        let (runner, _engine) = started_runner(5).await;
        let out = runner
            .translate("bonjour le monde", "fr", "en", &params())
            .await
            .unwrap();
        assert_eq!(out, "BONJOUR LE MONDE");
        runner.stop().await;
    }

    #[tokio::test]
    async fn repeated_request_served_from_cache() {
        let (runner, engine) = started_runner(5).await;
        let first = runner
            .translate("bonjour", "fr", "en", &params())
            .await
            .unwrap();
        let second = runner
            .translate("bonjour", "fr", "en", &params())
            .await
            .unwrap();
        assert_eq!(first, second);
        // The second request never reaches the engine.
        assert_eq!(engine.calls(), 1);
        runner.stop().await;
    }

    #[tokio::test]
    async fn different_params_miss_the_cache() {
        let (runner, engine) = started_runner(5).await;
        let _ = runner
            .translate("bonjour", "fr", "en", &params())
            .await
            .unwrap();
        let other = TranslationParams {
            beam_size: 2,
            ..params()
        };
        let _ = runner
            .translate("bonjour", "fr", "en", &other)
            .await
            .unwrap();
        assert_eq!(engine.calls(), 2);
        runner.stop().await;
    }

    #[tokio::test]
    async fn concurrent_compatible_jobs_share_one_batch() {
        let (runner, engine) = started_runner(100).await;
        let p = params();
        let (a, b) = tokio::join!(
            runner.translate("premier texte", "fr", "en", &p),
            runner.translate("deuxieme texte", "fr", "en", &p),
        );
        assert_eq!(a.unwrap(), "PREMIER TEXTE");
        assert_eq!(b.unwrap(), "DEUXIEME TEXTE");

        let log = engine.call_log();
        assert_eq!(log.len(), 1, "expected one coalesced engine call: {log:?}");
        assert_eq!(log[0].batch_size, 2);
        runner.stop().await;
    }

    #[tokio::test]
    async fn jobs_with_different_params_never_share_a_batch() {
        let (runner, engine) = started_runner(100).await;
        let other = TranslationParams {
            beam_size: 2,
            ..params()
        };
        let p = params();
        let (a, b) = tokio::join!(
            runner.translate("premier texte", "fr", "en", &p),
            runner.translate("deuxieme texte", "fr", "en", &other),
        );
        assert!(a.is_ok());
        assert!(b.is_ok());

        for call in engine.call_log() {
            assert_eq!(call.batch_size, 1);
        }
        assert_eq!(engine.calls(), 2);
        runner.stop().await;
    }

    #[tokio::test]
    async fn engine_failure_fails_the_whole_batch_and_recovers() {
        let (runner, engine) = started_runner(100).await;
        engine.set_fail(true);

        let p = params();
        let (a, b) = tokio::join!(
            runner.translate("un texte", "fr", "en", &p),
            runner.translate("autre texte", "fr", "en", &p),
        );
        assert_matches!(a.unwrap_err(), RuntimeError::Translation(_));
        assert_matches!(b.unwrap_err(), RuntimeError::Translation(_));
        assert_eq!(runner.state(), RunnerState::Ready);

        // The runner keeps serving after an engine error.
        engine.set_fail(false);
        let out = runner
            .translate("un texte", "fr", "en", &params())
            .await
            .unwrap();
        assert_eq!(out, "UN TEXTE");
        runner.stop().await;
    }

    #[tokio::test]
    async fn failed_results_are_not_cached() {
        let (runner, engine) = started_runner(5).await;
        engine.set_fail(true);
        let _ = runner.translate("bonjour", "fr", "en", &params()).await;
        engine.set_fail(false);
        let out = runner
            .translate("bonjour", "fr", "en", &params())
            .await
            .unwrap();
        assert_eq!(out, "BONJOUR");
        runner.stop().await;
    }

    #[tokio::test]
    async fn multi_sentence_text_keeps_paragraph_structure() {
        let (runner, _engine) = started_runner(5).await;
        let out = runner
            .translate("Premiere phrase. Deuxieme phrase.\nAutre paragraphe.", "fr", "en", &params())
            .await
            .unwrap();
        assert_eq!(out, "PREMIERE PHRASE. DEUXIEME PHRASE.\nAUTRE PARAGRAPHE.");
        runner.stop().await;
    }

    #[tokio::test]
    async fn empty_text_translates_to_empty() {
        let (runner, engine) = started_runner(5).await;
        let out = runner.translate("", "fr", "en", &params()).await.unwrap();
        assert_eq!(out, "");
        assert_eq!(engine.calls(), 0);
        runner.stop().await;
    }

    #[tokio::test]
    async fn stop_closes_and_rejects_new_jobs() {
        let (runner, _engine) = started_runner(5).await;
        runner.stop().await;
        assert_eq!(runner.state(), RunnerState::Closed);
        let err = runner
            .translate("bonjour", "fr", "en", &params())
            .await
            .unwrap_err();
        assert_matches!(err, RuntimeError::Closed);
    }

    #[tokio::test]
    async fn stop_is_idempotent() {
        let (runner, _engine) = started_runner(5).await;
        runner.stop().await;
        runner.stop().await;
        assert_eq!(runner.state(), RunnerState::Closed);
    }

    #[tokio::test]
    async fn stop_drains_queued_work_first() {
        let (runner, _engine) = started_runner(50).await;
        let p = params();
        let job = runner.translate("avant arret", "fr", "en", &p);
        let stop = async {
            // Give the job a moment to enqueue, then stop.
            tokio::time::sleep(Duration::from_millis(10)).await;
            runner.stop().await;
        };
        let (result, ()) = tokio::join!(job, stop);
        assert_eq!(result.unwrap(), "AVANT ARRET");
        assert_eq!(runner.state(), RunnerState::Closed);
    }

    #[tokio::test]
    async fn cache_hit_while_ready_after_stop_miss_path_closed() {
        let (runner, _engine) = started_runner(5).await;
        let _ = runner
            .translate("bonjour", "fr", "en", &params())
            .await
            .unwrap();
        runner.stop().await;
        // Cached entries still resolve without touching the queue.
        let out = runner
            .translate("bonjour", "fr", "en", &params())
            .await
            .unwrap();
        assert_eq!(out, "BONJOUR");
    }
}
