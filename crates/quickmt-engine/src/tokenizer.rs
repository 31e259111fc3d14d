//! Subword tokenizer pair.
//!
//! An artifact ships either a single joint tokenizer model used for both
//! sides, or separate source/target models. The pair owns the engine's
//! end-of-sentence convention: encoded sequences carry a trailing
//! [`EOS_MARKER`], and it is stripped again before decoding.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::errors::{EngineError, Result};

/// End-of-sentence marker appended to every encoded sequence.
pub const EOS_MARKER: &str = "</s>";

/// Joint tokenizer model filename inside an artifact.
const JOINT_MODEL: &str = "joint.spm.model";
/// Split source tokenizer model filename.
const SRC_MODEL: &str = "src.spm.model";
/// Split target tokenizer model filename.
const TGT_MODEL: &str = "tgt.spm.model";

/// Encodes text to subword pieces and decodes pieces back to text.
///
/// Implementations return raw pieces; the EOS convention is applied by
/// [`TokenizerPair`], not by the backend.
pub trait SubwordTokenizer: Send + Sync {
    /// Encode one sentence into subword pieces.
    fn encode(&self, text: &str) -> Result<Vec<String>>;

    /// Decode subword pieces into plain text.
    fn decode(&self, tokens: &[String]) -> Result<String>;
}

/// Tokenizer model files found in an artifact directory.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TokenizerMode {
    /// One model shared by both sides.
    Joint(PathBuf),
    /// Separate source and target models.
    Split {
        /// Source-side model path.
        src: PathBuf,
        /// Target-side model path.
        tgt: PathBuf,
    },
}

impl TokenizerMode {
    /// Inspect an artifact directory and decide which mode it uses.
    ///
    /// A joint model wins when present; otherwise both split files must
    /// exist.
    pub fn detect(artifact: &Path) -> Result<Self> {
        let joint = artifact.join(JOINT_MODEL);
        if joint.is_file() {
            return Ok(Self::Joint(joint));
        }
        let src = artifact.join(SRC_MODEL);
        let tgt = artifact.join(TGT_MODEL);
        if src.is_file() && tgt.is_file() {
            return Ok(Self::Split { src, tgt });
        }
        Err(EngineError::Tokenizer(format!(
            "no tokenizer models in {}: expected {JOINT_MODEL} or {SRC_MODEL} + {TGT_MODEL}",
            artifact.display()
        )))
    }
}

/// Source and target tokenizers for one model.
#[derive(Clone)]
pub struct TokenizerPair {
    source: Arc<dyn SubwordTokenizer>,
    target: Arc<dyn SubwordTokenizer>,
}

impl TokenizerPair {
    /// Build a pair from separate source/target tokenizers.
    pub fn split(source: Arc<dyn SubwordTokenizer>, target: Arc<dyn SubwordTokenizer>) -> Self {
        Self { source, target }
    }

    /// Build a pair sharing one joint tokenizer for both sides.
    pub fn joint(tokenizer: Arc<dyn SubwordTokenizer>) -> Self {
        Self {
            source: tokenizer.clone(),
            target: tokenizer,
        }
    }

    /// Encode one source sentence, appending the EOS marker.
    pub fn encode(&self, text: &str) -> Result<Vec<String>> {
        let mut tokens = self.source.encode(text)?;
        tokens.push(EOS_MARKER.to_string());
        Ok(tokens)
    }

    /// Encode a batch of source sentences.
    pub fn encode_batch(&self, texts: &[String]) -> Result<Vec<Vec<String>>> {
        texts.iter().map(|t| self.encode(t)).collect()
    }

    /// Decode hypothesis tokens, ignoring any EOS markers.
    pub fn decode(&self, tokens: &[String]) -> Result<String> {
        let content: Vec<String> = tokens
            .iter()
            .filter(|t| t.as_str() != EOS_MARKER)
            .cloned()
            .collect();
        self.target.decode(&content)
    }
}
