//! # quickmt-engine
//!
//! The contract between the serving runtime and a translation engine:
//!
//! - [`TranslationEngine`] / [`EngineLoader`] traits around the external
//!   inference library (batch of token sequences in, hypotheses out)
//! - [`TokenizerPair`] for subword encode/decode with joint or split
//!   tokenizer models
//! - [`SentenceSegmenter`] for splitting text blobs into sentence units and
//!   reassembling them with paragraph structure intact
//! - counting mocks used throughout the workspace's tests
//!
//! A CTranslate2 backend is available behind the `ct2` feature.

#![deny(unsafe_code)]

pub mod adapter;
#[cfg(feature = "ct2")]
pub mod ct2;
pub mod errors;
pub mod mock;
pub mod segment;
pub mod tokenizer;

pub use adapter::{
    Device, EngineConfig, EngineLoader, Hypothesis, LoadedModel, TranslationEngine,
};
pub use errors::{EngineError, Result};
pub use mock::{MockEngine, MockEngineLoader, RecordedCall, WhitespaceTokenizer};
pub use segment::{Segmented, SentenceSegmenter};
pub use tokenizer::{EOS_MARKER, SubwordTokenizer, TokenizerMode, TokenizerPair};
