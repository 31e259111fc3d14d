//! Round-robin classifier worker pool.
//!
//! Workers are dedicated OS threads because classification is CPU-bound;
//! each owns its own classifier instance (never shared). Jobs are
//! dispatched round-robin over per-worker channels and answered through
//! oneshot channels, so a slow worker only delays its own queue.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread::JoinHandle;

use parking_lot::Mutex;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use crate::classifier::{ClassifierFactory, Prediction};
use crate::errors::{LangIdError, Result};

/// Per-worker queue depth. Small: requests are batch-level, not per-text.
const WORKER_QUEUE_DEPTH: usize = 64;

struct Job {
    texts: Vec<String>,
    k: usize,
    threshold: f32,
    reply: oneshot::Sender<Result<Vec<Vec<Prediction>>>>,
}

struct Worker {
    tx: mpsc::Sender<Job>,
    handle: JoinHandle<()>,
}

/// Pool of language-ID workers.
pub struct LangIdPool {
    workers: Mutex<Vec<Worker>>,
    next: AtomicUsize,
}

impl LangIdPool {
    /// Start `count` workers, building one classifier per worker up front.
    ///
    /// Construction is eager so a broken backend fails startup instead of
    /// the first request. Any model file the backend needs must already be
    /// on disk (see [`crate::model::ensure_model`]).
    pub fn start(factory: &Arc<dyn ClassifierFactory>, count: usize) -> Result<Self> {
        let mut workers = Vec::with_capacity(count);
        for worker_id in 0..count {
            let classifier = factory.build()?;
            let (tx, mut rx) = mpsc::channel::<Job>(WORKER_QUEUE_DEPTH);
            let handle = std::thread::spawn(move || {
                debug!(worker_id, "langid worker started");
                while let Some(job) = rx.blocking_recv() {
                    let result = classifier.classify(&job.texts, job.k, job.threshold);
                    if job.reply.send(result).is_err() {
                        debug!(worker_id, "caller went away, dropping result");
                    }
                }
                debug!(worker_id, "langid worker stopped");
            });
            workers.push(Worker { tx, handle });
        }
        info!(workers = count, "language identification pool ready");
        Ok(Self {
            workers: Mutex::new(workers),
            next: AtomicUsize::new(0),
        })
    }

    /// Number of live workers.
    pub fn worker_count(&self) -> usize {
        self.workers.lock().len()
    }

    /// Classify a batch of texts, returning up to `k` predictions per text.
    ///
    /// Newlines are replaced with spaces before dispatch; the underlying
    /// classifiers reject embedded newlines.
    pub async fn classify(
        &self,
        texts: &[String],
        k: usize,
        threshold: f32,
    ) -> Result<Vec<Vec<Prediction>>> {
        let tx = {
            let workers = self.workers.lock();
            if workers.is_empty() {
                return Err(LangIdError::Unavailable);
            }
            let slot = self.next.fetch_add(1, Ordering::Relaxed) % workers.len();
            workers[slot].tx.clone()
        };
        let sanitized: Vec<String> = texts.iter().map(|t| t.replace('\n', " ")).collect();

        let (reply_tx, reply_rx) = oneshot::channel();
        tx.send(Job {
            texts: sanitized,
            k,
            threshold,
            reply: reply_tx,
        })
        .await
        .map_err(|_| LangIdError::Unavailable)?;

        reply_rx
            .await
            .map_err(|_| LangIdError::Worker("worker dropped the request".into()))?
    }

    /// Stop all workers and join their threads. Idempotent.
    pub fn stop(&self) {
        let drained: Vec<Worker> = self.workers.lock().drain(..).collect();
        for worker in drained {
            drop(worker.tx);
            if worker.handle.join().is_err() {
                warn!("langid worker panicked during shutdown");
            }
        }
    }
}

impl Drop for LangIdPool {
    fn drop(&mut self) {
        self.stop();
    }
}
