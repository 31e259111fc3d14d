//! `/api` routes: request/response shapes, validation, handlers.
//!
//! The layer is deliberately thin — normalize shapes, call the
//! orchestrator or pool, map errors. Response fields mirror the request
//! shape: scalars stay scalars, lists stay lists.

use std::time::Instant;

use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::instrument;

use quickmt_core::{OneOrMany, TranslationParams};
use quickmt_runtime::SourceLangSpec;

use crate::error::ApiError;
use crate::state::AppState;

const MANAGER_UNAVAILABLE: &str = "Model manager not initialized";
const LANGID_UNAVAILABLE: &str = "Language identification not initialized";

/// Body of `POST /api/translate`.
#[derive(Debug, Deserialize)]
pub struct TranslateRequest {
    /// Text(s) to translate.
    pub src: OneOrMany<String>,
    /// Source language(s); omitted means auto-detect per item.
    #[serde(default)]
    pub src_lang: Option<OneOrMany<String>>,
    /// Target language.
    #[serde(default = "default_tgt_lang")]
    pub tgt_lang: String,
    /// Decoding parameters, all optional with defaults.
    #[serde(flatten)]
    pub params: TranslationParams,
}

fn default_tgt_lang() -> String {
    "en".to_string()
}

/// Body of `POST /api/translate` responses.
#[derive(Debug, Serialize)]
pub struct TranslateResponse {
    /// Translation(s), shaped like `src`.
    pub translation: OneOrMany<String>,
    /// Resolved source language(s), shaped like `src`.
    pub src_lang: OneOrMany<String>,
    /// Detection confidence(s), shaped like `src`.
    pub src_lang_score: OneOrMany<f32>,
    /// Target language echoed back.
    pub tgt_lang: String,
    /// Wall-clock seconds spent serving the request.
    pub processing_time: f64,
    /// Model id(s) used, shaped like `src`.
    pub model_used: OneOrMany<String>,
}

/// Body of `POST /api/identify-language`.
#[derive(Debug, Deserialize)]
pub struct IdentifyRequest {
    /// Text(s) to classify.
    pub src: OneOrMany<String>,
    /// Number of candidates per text.
    #[serde(default = "default_k")]
    pub k: usize,
    /// Minimum score for a candidate to be reported.
    #[serde(default)]
    pub threshold: f32,
}

fn default_k() -> usize {
    1
}

/// One language candidate.
#[derive(Debug, Serialize)]
pub struct DetectionResult {
    /// ISO-639-1 code or `"unknown"`.
    pub lang: String,
    /// Classifier confidence.
    pub score: f32,
}

/// Body of `POST /api/identify-language` responses.
#[derive(Debug, Serialize)]
pub struct IdentifyResponse {
    /// Candidates per text; a flat list when `src` was a scalar.
    pub results: OneOrMany<Vec<DetectionResult>>,
    /// Wall-clock seconds spent serving the request.
    pub processing_time: f64,
}

/// One row of `GET /api/models`.
#[derive(Debug, Serialize)]
pub struct ModelRow {
    /// Catalogue model id.
    pub model_id: String,
    /// Source language.
    pub src_lang: String,
    /// Target language.
    pub tgt_lang: String,
    /// Whether a runner for it is currently loaded.
    pub loaded: bool,
}

/// Body of `GET /api/models`.
#[derive(Debug, Serialize)]
pub struct ModelsResponse {
    /// All catalogue models.
    pub models: Vec<ModelRow>,
}

/// Body of `GET /api/health`.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Always `"ok"` when the server is responding.
    pub status: String,
    /// Loaded pairs rendered `"src-tgt"`, most recently used first.
    pub loaded_models: Vec<String>,
    /// Configured LRU capacity.
    pub max_models: usize,
}

/// Build the `/api` router over shared state.
pub fn router(state: AppState) -> Router {
    let api = Router::new()
        .route("/translate", post(translate))
        .route("/identify-language", post(identify_language))
        .route("/models", get(models))
        .route("/languages", get(languages))
        .route("/health", get(health));
    Router::new()
        .nest("/api", api)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

#[instrument(skip_all, fields(tgt = %request.tgt_lang))]
async fn translate(
    State(state): State<AppState>,
    Json(request): Json<TranslateRequest>,
) -> Result<Json<TranslateResponse>, ApiError> {
    let started = Instant::now();
    let orchestrator = state
        .orchestrator()
        .ok_or_else(|| ApiError::unavailable(MANAGER_UNAVAILABLE))?;

    request
        .params
        .validate()
        .map_err(|e| ApiError::unprocessable(e.to_string()))?;

    let scalar = request.src.is_one();
    let texts = request.src.into_vec();
    if texts.is_empty() {
        return Ok(Json(TranslateResponse {
            translation: OneOrMany::Many(Vec::new()),
            src_lang: OneOrMany::Many(Vec::new()),
            src_lang_score: OneOrMany::Many(Vec::new()),
            tgt_lang: request.tgt_lang,
            processing_time: started.elapsed().as_secs_f64(),
            model_used: OneOrMany::Many(Vec::new()),
        }));
    }

    let spec = match request.src_lang {
        None => SourceLangSpec::Auto,
        Some(OneOrMany::One(lang)) => SourceLangSpec::One(lang),
        Some(OneOrMany::Many(langs)) => SourceLangSpec::PerItem(langs),
    };

    let outcome = orchestrator
        .translate(&texts, &spec, &request.tgt_lang, &request.params)
        .await?;

    Ok(Json(TranslateResponse {
        translation: OneOrMany::from_parts(scalar, outcome.translations),
        src_lang: OneOrMany::from_parts(scalar, outcome.src_langs),
        src_lang_score: OneOrMany::from_parts(scalar, outcome.src_lang_scores),
        tgt_lang: request.tgt_lang,
        processing_time: started.elapsed().as_secs_f64(),
        model_used: OneOrMany::from_parts(scalar, outcome.models_used),
    }))
}

#[instrument(skip_all)]
async fn identify_language(
    State(state): State<AppState>,
    Json(request): Json<IdentifyRequest>,
) -> Result<Json<IdentifyResponse>, ApiError> {
    let started = Instant::now();
    let pool = state
        .langid()
        .ok_or_else(|| ApiError::unavailable(LANGID_UNAVAILABLE))?;

    let scalar = request.src.is_one();
    let texts = request.src.into_vec();
    let predictions = pool
        .classify(&texts, request.k, request.threshold)
        .await?;

    let results: Vec<Vec<DetectionResult>> = predictions
        .into_iter()
        .map(|item| {
            item.into_iter()
                .map(|p| DetectionResult {
                    lang: p.lang,
                    score: p.score,
                })
                .collect()
        })
        .collect();

    Ok(Json(IdentifyResponse {
        results: OneOrMany::from_parts(scalar, results),
        processing_time: started.elapsed().as_secs_f64(),
    }))
}

async fn models(State(state): State<AppState>) -> Result<Json<ModelsResponse>, ApiError> {
    let manager = state
        .manager()
        .ok_or_else(|| ApiError::unavailable(MANAGER_UNAVAILABLE))?;
    let models = manager
        .list_models()
        .into_iter()
        .map(|status| ModelRow {
            model_id: status.descriptor.id,
            src_lang: status.descriptor.pair.src,
            tgt_lang: status.descriptor.pair.tgt,
            loaded: status.loaded,
        })
        .collect();
    Ok(Json(ModelsResponse { models }))
}

async fn languages(
    State(state): State<AppState>,
) -> Result<Json<std::collections::BTreeMap<String, Vec<String>>>, ApiError> {
    let manager = state
        .manager()
        .ok_or_else(|| ApiError::unavailable(MANAGER_UNAVAILABLE))?;
    Ok(Json(manager.language_pairs()))
}

async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let loaded_models = state
        .manager()
        .map(|m| m.loaded_pairs())
        .unwrap_or_default();
    Json(HealthResponse {
        status: "ok".into(),
        loaded_models,
        max_models: state.settings().max_loaded_models,
    })
}
