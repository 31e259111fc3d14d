//! Language pair — the key for the registry and the model LRU.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// A `(source, target)` pair of lowercase ISO-639-1 language codes.
///
/// Rendered as `"src-tgt"` at API boundaries (`/health`, log lines);
/// internally it is always this struct.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LangPair {
    /// Source language code.
    pub src: String,
    /// Target language code.
    pub tgt: String,
}

impl LangPair {
    /// Create a pair, normalizing both codes to lowercase.
    pub fn new(src: impl Into<String>, tgt: impl Into<String>) -> Self {
        Self {
            src: src.into().to_lowercase(),
            tgt: tgt.into().to_lowercase(),
        }
    }
}

impl fmt::Display for LangPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.src, self.tgt)
    }
}

impl FromStr for LangPair {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once('-') {
            Some((src, tgt)) if !src.is_empty() && !tgt.is_empty() => {
                Ok(Self::new(src, tgt))
            }
            _ => Err(format!("invalid language pair: {s:?}")),
        }
    }
}
