//! Classifier contract.

use crate::errors::Result;

/// One language prediction for one text.
#[derive(Clone, Debug, PartialEq)]
pub struct Prediction {
    /// ISO-639-1 language code, or `"unknown"`.
    pub lang: String,
    /// Classifier confidence in `[0, 1]`.
    pub score: f32,
}

impl Prediction {
    /// The fallback returned when no label meets the threshold.
    pub fn unknown() -> Self {
        Self {
            lang: "unknown".into(),
            score: 0.0,
        }
    }
}

/// Classifies a batch of texts into per-text `(lang, score)` candidates.
///
/// Implementations receive sanitized input (no embedded newlines) and
/// return up to `k` predictions per text, best first, each meeting
/// `threshold`. An empty inner vector means "no prediction".
pub trait LanguageClassifier: Send {
    /// Classify each text.
    fn classify(&self, texts: &[String], k: usize, threshold: f32)
        -> Result<Vec<Vec<Prediction>>>;
}

/// Builds one classifier instance per pool worker.
pub trait ClassifierFactory: Send + Sync {
    /// Construct a fresh classifier (called once per worker).
    fn build(&self) -> Result<Box<dyn LanguageClassifier>>;
}
