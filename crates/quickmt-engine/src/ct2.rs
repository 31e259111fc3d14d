//! CTranslate2 backend (feature-gated behind `ct2`).
//!
//! Wraps `ct2rs` for inference and `sentencepiece` for the subword models
//! shipped in quickmt artifacts. The runtime pre-tokenizes, so the `ct2rs`
//! translator is constructed with a passthrough tokenizer that maps between
//! token sequences and space-joined piece strings.

use std::path::Path;
use std::sync::Arc;

use quickmt_core::TranslationParams;
use tracing::info;

use crate::adapter::{Device, EngineConfig, EngineLoader, Hypothesis, LoadedModel, TranslationEngine};
use crate::errors::{EngineError, Result};
use crate::tokenizer::{SubwordTokenizer, TokenizerMode, TokenizerPair};

/// Passthrough tokenizer for `ct2rs`: the pieces are already subwords.
struct PiecePassthrough;

impl ct2rs::Tokenizer for PiecePassthrough {
    fn encode(&self, input: &str) -> anyhow::Result<Vec<String>> {
        Ok(input.split(' ').map(String::from).collect())
    }

    fn decode(&self, tokens: Vec<String>) -> anyhow::Result<String> {
        Ok(tokens.join(" "))
    }
}

/// SentencePiece-backed subword tokenizer.
pub struct SentencePieceTokenizer {
    processor: sentencepiece::SentencePieceProcessor,
}

impl SentencePieceTokenizer {
    /// Open a `.spm.model` file.
    pub fn open(path: &Path) -> Result<Self> {
        let processor = sentencepiece::SentencePieceProcessor::open(path)
            .map_err(|e| EngineError::Tokenizer(format!("{}: {e}", path.display())))?;
        Ok(Self { processor })
    }
}

impl SubwordTokenizer for SentencePieceTokenizer {
    fn encode(&self, text: &str) -> Result<Vec<String>> {
        let pieces = self
            .processor
            .encode(text)
            .map_err(|e| EngineError::Tokenizer(e.to_string()))?;
        Ok(pieces.into_iter().map(|p| p.piece).collect())
    }

    fn decode(&self, tokens: &[String]) -> Result<String> {
        // Standard SentencePiece detokenization: concatenate pieces and
        // turn the word-boundary marker back into spaces.
        let joined: String = tokens.concat();
        Ok(joined.replace('\u{2581}', " ").trim_start().to_string())
    }
}

/// CTranslate2 translation engine.
pub struct Ct2Engine {
    translator: ct2rs::Translator<PiecePassthrough>,
}

impl TranslationEngine for Ct2Engine {
    fn translate_batch(
        &self,
        batch: &[Vec<String>],
        params: &TranslationParams,
    ) -> Result<Vec<Hypothesis>> {
        let sources: Vec<String> = batch.iter().map(|tokens| tokens.join(" ")).collect();
        let options = ct2rs::TranslationOptions {
            beam_size: params.beam_size,
            patience: params.patience as f32,
            length_penalty: params.length_penalty,
            coverage_penalty: params.coverage_penalty,
            repetition_penalty: params.repetition_penalty,
            max_decoding_length: params.max_decoding_length,
            ..Default::default()
        };
        let results = self
            .translator
            .translate_batch(&sources, &options, None)
            .map_err(|e| EngineError::Inference(e.to_string()))?;
        Ok(results
            .into_iter()
            .map(|(text, _score)| Hypothesis {
                tokens: text.split(' ').map(String::from).collect(),
            })
            .collect())
    }
}

/// Loads [`Ct2Engine`]s and their SentencePiece tokenizers from artifacts.
#[derive(Default)]
pub struct Ct2Loader;

impl Ct2Loader {
    /// Create the loader.
    pub fn new() -> Self {
        Self
    }
}

fn map_compute_type(tag: &str) -> ct2rs::ComputeType {
    match tag {
        "auto" => ct2rs::ComputeType::AUTO,
        "int8" => ct2rs::ComputeType::INT8,
        "int8_float16" => ct2rs::ComputeType::INT8_FLOAT16,
        "int16" => ct2rs::ComputeType::INT16,
        "float16" => ct2rs::ComputeType::FLOAT16,
        "float32" => ct2rs::ComputeType::FLOAT32,
        _ => ct2rs::ComputeType::DEFAULT,
    }
}

fn map_device(device: Device) -> ct2rs::Device {
    match device {
        // CTranslate2 has no auto selection at this level; auto means CPU
        // unless a CUDA build is explicitly requested.
        Device::Cpu | Device::Auto => ct2rs::Device::CPU,
        Device::Gpu => ct2rs::Device::CUDA,
    }
}

impl EngineLoader for Ct2Loader {
    fn load(&self, artifact: &Path, config: &EngineConfig) -> Result<LoadedModel> {
        let tokenizers = match TokenizerMode::detect(artifact)? {
            TokenizerMode::Joint(path) => {
                TokenizerPair::joint(Arc::new(SentencePieceTokenizer::open(&path)?))
            }
            TokenizerMode::Split { src, tgt } => TokenizerPair::split(
                Arc::new(SentencePieceTokenizer::open(&src)?),
                Arc::new(SentencePieceTokenizer::open(&tgt)?),
            ),
        };

        let ct2_config = ct2rs::Config {
            device: map_device(config.device),
            compute_type: map_compute_type(&config.compute_type),
            num_threads_per_replica: config.intra_threads,
            ..Default::default()
        };
        let translator = ct2rs::Translator::with_tokenizer(artifact, PiecePassthrough, &ct2_config)
            .map_err(|e| EngineError::Load(e.to_string()))?;
        info!(artifact = %artifact.display(), "CTranslate2 model loaded");

        Ok(LoadedModel {
            engine: Arc::new(Ct2Engine { translator }),
            tokenizers,
        })
    }
}
