//! # quickmt-langid
//!
//! CPU-bound language identification behind a worker pool. Each worker
//! thread owns its own classifier instance; requests are distributed
//! round-robin and answered over oneshot channels. The classifier itself
//! is pluggable: the default backend is `whatlang`, and a FastText model
//! file backend is available behind the `fasttext` feature (the model is
//! downloaded once by the main process before workers start).

#![deny(unsafe_code)]

pub mod classifier;
pub mod errors;
#[cfg(feature = "fasttext")]
pub mod fasttext_backend;
pub mod model;
pub mod pool;
pub mod whatlang_backend;

pub use classifier::{ClassifierFactory, LanguageClassifier, Prediction};
pub use errors::{LangIdError, Result};
pub use model::{default_model_path, ensure_model};
pub use pool::LangIdPool;
pub use whatlang_backend::WhatlangFactory;
