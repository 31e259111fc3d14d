//! Decoding parameters and the cacheable request fingerprint.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Parameter validation errors.
#[derive(Debug, Error)]
pub enum ParamsError {
    /// `patience` must not exceed `beam_size`.
    #[error("patience cannot be greater than beam_size")]
    PatienceExceedsBeam,
}

/// Per-request decoding configuration, forwarded to the inference engine.
///
/// Two jobs may share an inference batch only if their parameters are
/// identical; [`TranslationParams::canonical`] is the comparison form.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TranslationParams {
    /// Beam search width.
    pub beam_size: usize,
    /// Number of finished hypotheses before stopping (≤ `beam_size`).
    pub patience: usize,
    /// Length penalty applied during decoding.
    pub length_penalty: f32,
    /// Coverage penalty applied during decoding.
    pub coverage_penalty: f32,
    /// Repetition penalty applied during decoding.
    pub repetition_penalty: f32,
    /// Maximum number of decoded tokens per sentence.
    pub max_decoding_length: usize,
}

impl Default for TranslationParams {
    fn default() -> Self {
        Self {
            beam_size: 5,
            patience: 1,
            length_penalty: 1.0,
            coverage_penalty: 0.0,
            repetition_penalty: 1.0,
            max_decoding_length: 256,
        }
    }
}

impl TranslationParams {
    /// Check cross-field constraints.
    pub fn validate(&self) -> Result<(), ParamsError> {
        if self.patience > self.beam_size {
            return Err(ParamsError::PatienceExceedsBeam);
        }
        Ok(())
    }

    /// Canonical text form with a fixed key order, so equal parameter sets
    /// always hash and compare identically.
    pub fn canonical(&self) -> String {
        format!(
            "beam_size={};coverage_penalty={};length_penalty={};max_decoding_length={};patience={};repetition_penalty={}",
            self.beam_size,
            self.coverage_penalty,
            self.length_penalty,
            self.max_decoding_length,
            self.patience,
            self.repetition_penalty,
        )
    }
}

/// Uniquely identifies a cacheable translation request.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct RequestFingerprint {
    /// The source text as submitted.
    pub src_text: String,
    /// Resolved source language.
    pub src_lang: String,
    /// Target language.
    pub tgt_lang: String,
    /// Canonical parameter string.
    pub params: String,
}

impl RequestFingerprint {
    /// Build a fingerprint from a request's components.
    pub fn new(
        src_text: &str,
        src_lang: &str,
        tgt_lang: &str,
        params: &TranslationParams,
    ) -> Self {
        Self {
            src_text: src_text.to_string(),
            src_lang: src_lang.to_string(),
            tgt_lang: tgt_lang.to_string(),
            params: params.canonical(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_api_contract() {
        let p = TranslationParams::default();
        assert_eq!(p.beam_size, 5);
        assert_eq!(p.patience, 1);
        assert!((p.length_penalty - 1.0).abs() < f32::EPSILON);
        assert!((p.coverage_penalty - 0.0).abs() < f32::EPSILON);
        assert!((p.repetition_penalty - 1.0).abs() < f32::EPSILON);
        assert_eq!(p.max_decoding_length, 256);
    }

    #[test]
    fn default_params_validate() {
        assert!(TranslationParams::default().validate().is_ok());
    }

    #[test]
    fn patience_above_beam_rejected() {
        let p = TranslationParams {
            beam_size: 2,
            patience: 3,
            ..TranslationParams::default()
        };
        let err = p.validate().unwrap_err();
        assert_eq!(err.to_string(), "patience cannot be greater than beam_size");
    }

    #[test]
    fn canonical_is_stable_for_equal_params() {
        let a = TranslationParams::default();
        let b = TranslationParams::default();
        assert_eq!(a.canonical(), b.canonical());
    }

    #[test]
    fn canonical_differs_when_any_field_differs() {
        let base = TranslationParams::default();
        let other = TranslationParams {
            beam_size: 6,
            ..base.clone()
        };
        assert_ne!(base.canonical(), other.canonical());
    }

    #[test]
    fn fingerprint_equal_for_equal_requests() {
        let p = TranslationParams::default();
        let a = RequestFingerprint::new("Bonjour", "fr", "en", &p);
        let b = RequestFingerprint::new("Bonjour", "fr", "en", &p);
        assert_eq!(a, b);
    }

    #[test]
    fn fingerprint_sensitive_to_params() {
        let a = RequestFingerprint::new("Bonjour", "fr", "en", &TranslationParams::default());
        let b = RequestFingerprint::new(
            "Bonjour",
            "fr",
            "en",
            &TranslationParams {
                beam_size: 2,
                patience: 1,
                ..TranslationParams::default()
            },
        );
        assert_ne!(a, b);
    }

    #[test]
    fn partial_json_uses_defaults() {
        let p: TranslationParams = serde_json::from_str(r#"{"beam_size": 8}"#).unwrap();
        assert_eq!(p.beam_size, 8);
        assert_eq!(p.patience, 1);
        assert_eq!(p.max_decoding_length, 256);
    }
}
