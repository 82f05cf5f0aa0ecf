use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::json;
use stanza_db::{LexiconStore, PoemStore, StoreError};
use stanza_types::{LexemeKey, Poem, PoemId, Token};
use thiserror::Error;
use tracing::error;

use crate::card::lookup_card;
use crate::ingest::{ImportRequest, IngestError, Synchronizer};

const LEXEME_CACHE: &str = "public, max-age=86400, stale-while-revalidate=604800";
const POEM_CACHE: &str = "public, max-age=60";

#[derive(Clone)]
pub struct AppState {
    pub poems: Arc<dyn PoemStore>,
    pub lexicon: Arc<dyn LexiconStore>,
    pub sync: Arc<Synchronizer>,
    pub disable_cache: bool,
}

impl AppState {
    /// State whose synchronizer writes to `poems`.
    pub fn new(
        poems: Arc<dyn PoemStore>,
        lexicon: Arc<dyn LexiconStore>,
        disable_cache: bool,
    ) -> Self {
        let sync = Arc::new(Synchronizer::new(Arc::clone(&poems)));
        Self {
            poems,
            lexicon,
            sync,
            disable_cache,
        }
    }
}

#[derive(Deserialize)]
pub struct ReannotateQuery {
    #[serde(rename = "poemId")]
    pub poem_id: Option<String>,
}

#[derive(Deserialize)]
pub struct LexemeQuery {
    pub lemma: Option<String>,
    pub pos: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct MutationResponse {
    ok: bool,
    poem_id: PoemId,
}

#[derive(Serialize)]
struct PoemResponse {
    poem: Poem,
    lines: Vec<LineResponse>,
}

#[derive(Serialize)]
struct LineResponse {
    index: usize,
    text: String,
    tokens: Vec<Token>,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/v1/admin/import", post(import_poem))
        .route("/v1/admin/reannotate", post(reannotate))
        .route("/v1/lexeme", get(lexeme))
        .route("/v1/poems/{slug}", get(poem))
        .with_state(state)
}

async fn healthz() -> impl IntoResponse {
    "ok"
}

async fn import_poem(State(state): State<AppState>, body: Bytes) -> Result<Response, ApiError> {
    let request: ImportRequest = if body.iter().all(u8::is_ascii_whitespace) {
        ImportRequest::default()
    } else {
        serde_json::from_slice(&body)
            .map_err(|e| ApiError::bad_request(format!("invalid request body: {e}")))?
    };

    let sync = Arc::clone(&state.sync);
    let poem = tokio::task::spawn_blocking(move || sync.import(request))
        .await
        .map_err(|e| {
            error!("import task failed: {e}");
            ApiError::Internal
        })??;

    Ok(Json(MutationResponse {
        ok: true,
        poem_id: poem.id,
    })
    .into_response())
}

async fn reannotate(
    State(state): State<AppState>,
    Query(params): Query<ReannotateQuery>,
) -> Result<Response, ApiError> {
    let raw = params
        .poem_id
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| ApiError::bad_request("poemId is required"))?;
    let id: PoemId = raw
        .parse()
        .map_err(|_| ApiError::bad_request(format!("invalid poemId: {raw}")))?;

    let sync = Arc::clone(&state.sync);
    let poem = tokio::task::spawn_blocking(move || sync.reannotate(id))
        .await
        .map_err(|e| {
            error!("reannotate task failed: {e}");
            ApiError::Internal
        })??;

    Ok(Json(MutationResponse {
        ok: true,
        poem_id: poem.id,
    })
    .into_response())
}

async fn lexeme(
    State(state): State<AppState>,
    Query(params): Query<LexemeQuery>,
) -> Result<Response, ApiError> {
    let present = |v: &String| !v.is_empty();
    let (Some(lemma), Some(pos)) = (params.lemma.filter(present), params.pos.filter(present))
    else {
        return Err(ApiError::bad_request("lemma and pos are required"));
    };
    let key = LexemeKey::new(lemma, pos);
    let (poems, lexicon) = (Arc::clone(&state.poems), Arc::clone(&state.lexicon));
    let card = tokio::task::spawn_blocking(move || {
        lookup_card(poems.as_ref(), lexicon.as_ref(), &key)
    })
    .await
    .map_err(|e| {
        error!("lexeme lookup task failed: {e}");
        ApiError::Internal
    })??;
    Ok(cached(Json(card), LEXEME_CACHE, state.disable_cache))
}

async fn poem(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<Response, ApiError> {
    let (poem, text) = state
        .poems
        .snapshot_by_slug(&slug)?
        .ok_or_else(|| ApiError::NotFound(format!("poem {slug} not found")))?;
    let lines = text
        .lines
        .iter()
        .map(|line| LineResponse {
            index: line.index,
            text: line.text.clone(),
            tokens: text.tokens_for_line(line.index).to_vec(),
        })
        .collect();
    Ok(cached(
        Json(PoemResponse { poem, lines }),
        POEM_CACHE,
        state.disable_cache,
    ))
}

fn cached(body: impl IntoResponse, policy: &'static str, disable_cache: bool) -> Response {
    if disable_cache {
        return body.into_response();
    }
    (
        [(header::CACHE_CONTROL, HeaderValue::from_static(policy))],
        body,
    )
        .into_response()
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    NotFound(String),
    #[error("internal server error")]
    Internal,
}

impl ApiError {
    fn bad_request<T: Into<String>>(msg: T) -> Self {
        ApiError::BadRequest(msg.into())
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        error!("store failure: {err}");
        ApiError::Internal
    }
}

impl From<IngestError> for ApiError {
    fn from(err: IngestError) -> Self {
        match err {
            IngestError::MissingField(_) => ApiError::BadRequest(err.to_string()),
            IngestError::PoemNotFound(_) => ApiError::NotFound(err.to_string()),
            IngestError::Store(store) => store.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::BadRequest(msg) => {
                let body = Json(ErrorResponse { error: msg });
                (StatusCode::BAD_REQUEST, body).into_response()
            }
            ApiError::NotFound(msg) => {
                let body = Json(ErrorResponse { error: msg });
                (StatusCode::NOT_FOUND, body).into_response()
            }
            ApiError::Internal => {
                let body = Json(json!({ "error": "internal server error" }));
                (StatusCode::INTERNAL_SERVER_ERROR, body).into_response()
            }
        }
    }
}
