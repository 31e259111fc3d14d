//! Request orchestration.
//!
//! Normalized inputs come in as a list; the orchestrator resolves one
//! source language per item (explicit or detected), groups items by
//! language, short-circuits identity pairs, fans out the rest to model
//! runners, and stitches results back in input order.
//!
//! The fan-out is intentionally naive: one job per source item, submitted
//! concurrently, so the runner's batcher sees many items inside its
//! coalescing window. That is the throughput mechanism.

use std::sync::Arc;

use tracing::debug;

use quickmt_core::TranslationParams;
use quickmt_langid::{LangIdError, LangIdPool};

use crate::IDENTITY_MODEL;
use crate::errors::{Result, RuntimeError};
use crate::manager::ModelManager;

/// How the request specified source languages.
#[derive(Clone, Debug, PartialEq)]
pub enum SourceLangSpec {
    /// Detect per item.
    Auto,
    /// One language for every item.
    One(String),
    /// One language per item; must match the input length.
    PerItem(Vec<String>),
}

/// Index-aligned translation results.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TranslateOutcome {
    /// Translated texts, aligned with the input.
    pub translations: Vec<String>,
    /// Resolved source language per item.
    pub src_langs: Vec<String>,
    /// Detection confidence per item (1.0 when explicit).
    pub src_lang_scores: Vec<f32>,
    /// Model id per item, or `"identity"`.
    pub models_used: Vec<String>,
}

/// Entry point for translation requests.
pub struct Orchestrator {
    manager: Arc<ModelManager>,
    langid: Option<Arc<LangIdPool>>,
}

impl Orchestrator {
    /// Create an orchestrator. Without a langid pool, requests that omit
    /// `src_lang` fail with the pool-unavailable error.
    pub fn new(manager: Arc<ModelManager>, langid: Option<Arc<LangIdPool>>) -> Self {
        Self { manager, langid }
    }

    /// The model manager this orchestrator dispatches to.
    pub fn manager(&self) -> &Arc<ModelManager> {
        &self.manager
    }

    /// Translate a batch of texts into `tgt_lang`.
    pub async fn translate(
        &self,
        texts: &[String],
        src_lang: &SourceLangSpec,
        tgt_lang: &str,
        params: &TranslationParams,
    ) -> Result<TranslateOutcome> {
        let count = texts.len();
        if count == 0 {
            return Ok(TranslateOutcome::default());
        }

        let (src_langs, src_lang_scores) = self.resolve_languages(texts, src_lang).await?;

        // Group item indices by resolved source language, preserving the
        // order in which languages first appear.
        let mut groups: Vec<(String, Vec<usize>)> = Vec::new();
        for (index, lang) in src_langs.iter().enumerate() {
            match groups.iter_mut().find(|(l, _)| l.as_str() == lang.as_str()) {
                Some((_, indices)) => indices.push(index),
                None => groups.push((lang.clone(), vec![index])),
            }
        }
        debug!(items = count, buckets = groups.len(), tgt = tgt_lang, "dispatching translation");

        let mut translations = vec![String::new(); count];
        let mut models_used = vec![String::new(); count];

        let mut bucket_futures = Vec::new();
        for (lang, indices) in groups {
            if lang == tgt_lang {
                for &index in &indices {
                    translations[index] = texts[index].clone();
                    models_used[index] = IDENTITY_MODEL.to_string();
                }
                continue;
            }

            let manager = self.manager.clone();
            let params = params.clone();
            let tgt = tgt_lang.to_string();
            let items: Vec<(usize, String)> =
                indices.into_iter().map(|i| (i, texts[i].clone())).collect();
            bucket_futures.push(async move {
                let runner = manager.get(&lang, &tgt).await?;
                let model_id = runner.descriptor().id.clone();
                let jobs = items
                    .iter()
                    .map(|(_, text)| runner.translate(text, &lang, &tgt, &params));
                let outputs = futures::future::try_join_all(jobs).await?;
                let placed: Vec<(usize, String, String)> = items
                    .into_iter()
                    .zip(outputs)
                    .map(|((index, _), output)| (index, output, model_id.clone()))
                    .collect();
                Ok::<_, RuntimeError>(placed)
            });
        }

        for bucket in futures::future::try_join_all(bucket_futures).await? {
            for (index, output, model_id) in bucket {
                translations[index] = output;
                models_used[index] = model_id;
            }
        }

        Ok(TranslateOutcome {
            translations,
            src_langs,
            src_lang_scores,
            models_used,
        })
    }

    async fn resolve_languages(
        &self,
        texts: &[String],
        spec: &SourceLangSpec,
    ) -> Result<(Vec<String>, Vec<f32>)> {
        let count = texts.len();
        match spec {
            SourceLangSpec::One(lang) => Ok((vec![lang.clone(); count], vec![1.0; count])),
            SourceLangSpec::PerItem(langs) => {
                if langs.len() != count {
                    return Err(RuntimeError::Validation(
                        "src_lang list length must match src list length".into(),
                    ));
                }
                Ok((langs.clone(), vec![1.0; count]))
            }
            SourceLangSpec::Auto => {
                let pool = self.langid.as_ref().ok_or(LangIdError::Unavailable)?;
                let predictions = pool.classify(texts, 1, 0.0).await?;
                let mut langs = Vec::with_capacity(count);
                let mut scores = Vec::with_capacity(count);
                for item in predictions {
                    match item.first() {
                        Some(p) => {
                            langs.push(p.lang.clone());
                            scores.push(p.score);
                        }
                        None => {
                            langs.push("unknown".to_string());
                            scores.push(0.0);
                        }
                    }
                }
                Ok((langs, scores))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use quickmt_core::LangPair;
    use quickmt_engine::MockEngineLoader;
    use quickmt_hub::{ModelDescriptor, Registry, StaticArtifactStore};
    use quickmt_langid::{ClassifierFactory, WhatlangFactory};
    use crate::manager::ManagerConfig;

    const PAIRS: &[(&str, &str)] = &[("fr", "en"), ("es", "en"), ("en", "fr")];

    fn manager() -> Arc<ModelManager> {
        let registry = Arc::new(Registry::with_models(
            PAIRS
                .iter()
                .map(|(src, tgt)| ModelDescriptor {
                    id: format!("quickmt/quickmt-{src}-{tgt}"),
                    pair: LangPair::new(*src, *tgt),
                })
                .collect(),
        ));
        let store = StaticArtifactStore::new();
        for (src, tgt) in PAIRS {
            store.insert(
                format!("quickmt/quickmt-{src}-{tgt}"),
                std::env::temp_dir(),
            );
        }
        ModelManager::new(
            registry,
            Arc::new(store),
            Arc::new(MockEngineLoader::new()),
            ManagerConfig::default(),
        )
    }

    fn orchestrator(with_langid: bool) -> Orchestrator {
        let langid = with_langid.then(|| {
            let factory: Arc<dyn ClassifierFactory> = Arc::new(WhatlangFactory);
            Arc::new(LangIdPool::start(&factory, 2).unwrap())
        });
        Orchestrator::new(manager(), langid)
    }

    fn texts(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| (*s).to_string()).collect()
    }

    #[tokio::test]
    async fn explicit_single_language() {
        let orch = orchestrator(false);
        let outcome = orch
            .translate(
                &texts(&["bonjour"]),
                &SourceLangSpec::One("fr".into()),
                "en",
                &TranslationParams::default(),
            )
            .await
            .unwrap();
        assert_eq!(outcome.translations, vec!["BONJOUR"]);
        assert_eq!(outcome.src_langs, vec!["fr"]);
        assert!((outcome.src_lang_scores[0] - 1.0).abs() < f32::EPSILON);
        assert!(outcome.models_used[0].ends_with("quickmt-fr-en"));
    }

    #[tokio::test]
    async fn identity_short_circuit() {
        let orch = orchestrator(false);
        let outcome = orch
            .translate(
                &texts(&["This is already English"]),
                &SourceLangSpec::One("en".into()),
                "en",
                &TranslationParams::default(),
            )
            .await
            .unwrap();
        assert_eq!(outcome.translations, vec!["This is already English"]);
        assert_eq!(outcome.models_used, vec![IDENTITY_MODEL]);
    }

    #[tokio::test]
    async fn mixed_languages_keep_input_order() {
        let orch = orchestrator(false);
        let outcome = orch
            .translate(
                &texts(&["bonjour", "already english", "hola"]),
                &SourceLangSpec::PerItem(vec!["fr".into(), "en".into(), "es".into()]),
                "en",
                &TranslationParams::default(),
            )
            .await
            .unwrap();
        assert_eq!(
            outcome.translations,
            vec!["BONJOUR", "already english", "HOLA"]
        );
        assert!(outcome.models_used[0].ends_with("quickmt-fr-en"));
        assert_eq!(outcome.models_used[1], IDENTITY_MODEL);
        assert!(outcome.models_used[2].ends_with("quickmt-es-en"));
    }

    #[tokio::test]
    async fn swapping_inputs_swaps_outputs() {
        let orch = orchestrator(false);
        let spec = SourceLangSpec::PerItem(vec!["fr".into(), "es".into()]);
        let forward = orch
            .translate(
                &texts(&["bonjour", "hola"]),
                &spec,
                "en",
                &TranslationParams::default(),
            )
            .await
            .unwrap();
        let swapped_spec = SourceLangSpec::PerItem(vec!["es".into(), "fr".into()]);
        let swapped = orch
            .translate(
                &texts(&["hola", "bonjour"]),
                &swapped_spec,
                "en",
                &TranslationParams::default(),
            )
            .await
            .unwrap();
        assert_eq!(forward.translations[0], swapped.translations[1]);
        assert_eq!(forward.translations[1], swapped.translations[0]);
    }

    #[tokio::test]
    async fn per_item_length_mismatch_is_validation_error() {
        let orch = orchestrator(false);
        let err = orch
            .translate(
                &texts(&["a", "b"]),
                &SourceLangSpec::PerItem(vec!["en".into()]),
                "fr",
                &TranslationParams::default(),
            )
            .await
            .unwrap_err();
        assert_matches!(err, RuntimeError::Validation(_));
        assert_eq!(
            err.to_string(),
            "src_lang list length must match src list length"
        );
    }

    #[tokio::test]
    async fn auto_detection_resolves_languages() {
        let orch = orchestrator(true);
        let outcome = orch
            .translate(
                &texts(&[
                    "Bonjour, je voudrais acheter une baguette et un croissant ce matin.",
                ]),
                &SourceLangSpec::Auto,
                "en",
                &TranslationParams::default(),
            )
            .await
            .unwrap();
        assert_eq!(outcome.src_langs, vec!["fr"]);
        assert!(outcome.src_lang_scores[0] > 0.0);
        assert!(outcome.models_used[0].ends_with("quickmt-fr-en"));
    }

    #[tokio::test]
    async fn auto_detection_without_pool_is_unavailable() {
        let orch = orchestrator(false);
        let err = orch
            .translate(
                &texts(&["hello"]),
                &SourceLangSpec::Auto,
                "fr",
                &TranslationParams::default(),
            )
            .await
            .unwrap_err();
        assert_matches!(err, RuntimeError::LangId(LangIdError::Unavailable));
    }

    #[tokio::test]
    async fn undetectable_text_maps_to_unknown_and_404s() {
        let orch = orchestrator(true);
        let err = orch
            .translate(
                &texts(&[""]),
                &SourceLangSpec::Auto,
                "en",
                &TranslationParams::default(),
            )
            .await
            .unwrap_err();
        assert_matches!(
            err,
            RuntimeError::ModelNotFound { ref src, .. } if src == "unknown"
        );
    }

    #[tokio::test]
    async fn unknown_pair_propagates_not_found() {
        let orch = orchestrator(false);
        let err = orch
            .translate(
                &texts(&["Hello"]),
                &SourceLangSpec::One("en".into()),
                "zz",
                &TranslationParams::default(),
            )
            .await
            .unwrap_err();
        assert_matches!(err, RuntimeError::ModelNotFound { .. });
    }

    #[tokio::test]
    async fn empty_input_yields_empty_outcome() {
        let orch = orchestrator(false);
        let outcome = orch
            .translate(
                &[],
                &SourceLangSpec::Auto,
                "en",
                &TranslationParams::default(),
            )
            .await
            .unwrap();
        assert_eq!(outcome, TranslateOutcome::default());
    }
}
