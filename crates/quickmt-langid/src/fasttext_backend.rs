//! FastText classifier backend (feature-gated behind `fasttext`).
//!
//! Loads the `lid.176.bin` model ensured by [`crate::model::ensure_model`]
//! and supports full top-k prediction, unlike the default whatlang backend.

use std::path::{Path, PathBuf};

use crate::classifier::{ClassifierFactory, LanguageClassifier, Prediction};
use crate::errors::{LangIdError, Result};

/// Prefix FastText puts on every predicted label.
const LABEL_PREFIX: &str = "__label__";

/// Classifier over a loaded FastText model.
pub struct FastTextClassifier {
    model: fasttext::FastText,
}

impl FastTextClassifier {
    /// Load the model file at `path`.
    pub fn load(path: &Path) -> Result<Self> {
        let mut model = fasttext::FastText::new();
        model
            .load_model(&path.to_string_lossy())
            .map_err(|e| LangIdError::Init(format!("{}: {e}", path.display())))?;
        Ok(Self { model })
    }
}

impl LanguageClassifier for FastTextClassifier {
    fn classify(
        &self,
        texts: &[String],
        k: usize,
        threshold: f32,
    ) -> Result<Vec<Vec<Prediction>>> {
        texts
            .iter()
            .map(|text| {
                let predictions = self
                    .model
                    .predict(text, i32::try_from(k).unwrap_or(i32::MAX), threshold)
                    .map_err(|e| LangIdError::Worker(e.to_string()))?;
                Ok(predictions
                    .into_iter()
                    .map(|p| Prediction {
                        lang: p
                            .label
                            .strip_prefix(LABEL_PREFIX)
                            .unwrap_or(&p.label)
                            .to_string(),
                        score: p.prob,
                    })
                    .collect())
            })
            .collect()
    }
}

/// Factory producing one [`FastTextClassifier`] per worker.
///
/// Each worker loads its own copy of the model; the file itself is shared
/// read-only on disk.
pub struct FastTextFactory {
    path: PathBuf,
}

impl FastTextFactory {
    /// Create a factory over a model file path.
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

impl ClassifierFactory for FastTextFactory {
    fn build(&self) -> Result<Box<dyn LanguageClassifier>> {
        Ok(Box::new(FastTextClassifier::load(&self.path)?))
    }
}
