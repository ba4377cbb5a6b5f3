//! HTTP surface of the node.
//!
//! | Method | Path              | Description                          |
//! |--------|-------------------|--------------------------------------|
//! | GET    | `/health`         | Liveness probe                       |
//! | GET    | `/chain/head`     | Tip index, length and digest         |
//! | GET    | `/chain/verify`   | Integrity check of the whole chain   |
//! | GET    | `/blocks`         | Page of blocks (`start`, `limit`)    |
//! | POST   | `/blocks`         | Seal the JSON body into a new block  |
//! | GET    | `/blocks/{index}` | Block by index                       |

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use linkchain_core::{Block, ChainManager, ProposeError, StoreError, ValidationResult};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::constants::{BLOCKS_PER_BATCH, MAX_BLOCKS_PER_REQUEST};

#[derive(Clone)]
pub struct AppState {
    pub chain: Arc<ChainManager>,
}

#[derive(Serialize, Deserialize)]
pub struct Health {
    pub status: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Head {
    pub height: u64,
    pub length: u64,
    pub hash: String,
}

/// Block as rendered over HTTP, digests in lowercase hex.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockView {
    pub index: u64,
    pub timestamp: u64,
    pub payload: Value,
    pub previous_digest: String,
    pub digest: String,
}

impl From<&Block> for BlockView {
    fn from(block: &Block) -> Self {
        Self {
            index: block.index(),
            timestamp: block.timestamp(),
            payload: block.payload().clone(),
            previous_digest: hex::encode(block.previous_digest()),
            digest: hex::encode(block.digest()),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct VerifyReport {
    pub valid: bool,
    pub result: ValidationResult,
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub struct Page {
    pub start: Option<u64>,
    pub limit: Option<u64>,
}

#[derive(Debug)]
pub enum ApiError {
    Propose(ProposeError),
    Store(StoreError),
    Internal(String),
}

impl From<ProposeError> for ApiError {
    fn from(e: ProposeError) -> Self {
        Self::Propose(e)
    }
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        Self::Store(e)
    }
}

impl From<tokio::task::JoinError> for ApiError {
    fn from(e: tokio::task::JoinError) -> Self {
        Self::Internal(e.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::Propose(ProposeError::Serialization(e)) => (StatusCode::BAD_REQUEST, e.to_string()),
            Self::Propose(ProposeError::LockTimeout(wait)) => (
                StatusCode::SERVICE_UNAVAILABLE,
                format!("chain busy, gave up after {wait:?}"),
            ),
            Self::Propose(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
            Self::Store(e @ StoreError::IndexOutOfRange { .. }) => (StatusCode::NOT_FOUND, e.to_string()),
            Self::Store(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
            Self::Internal(e) => (StatusCode::INTERNAL_SERVER_ERROR, e),
        };
        if status.is_server_error() {
            warn!(%status, %message, "request failed");
        }
        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/healthz", get(health))
        .route("/chain/head", get(head))
        .route("/chain/verify", get(verify))
        .route("/blocks", get(list_blocks).post(propose))
        .route("/blocks/{index}", get(block_by_index))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health() -> Json<Health> {
    Json(Health {
        status: "ok".into(),
    })
}

async fn head(State(state): State<AppState>) -> Result<Json<Head>, ApiError> {
    let tail = state.chain.tail()?;
    Ok(Json(Head {
        height: tail.index(),
        length: tail.index() + 1,
        hash: hex::encode(tail.digest()),
    }))
}

async fn verify(State(state): State<AppState>) -> Result<Json<VerifyReport>, ApiError> {
    let chain = Arc::clone(&state.chain);
    let result = tokio::task::spawn_blocking(move || chain.verify()).await?;
    if !result.is_valid() {
        warn!(%result, "chain failed verification");
    }
    Ok(Json(VerifyReport {
        valid: result.is_valid(),
        result,
        message: result.to_string(),
    }))
}

async fn list_blocks(
    State(state): State<AppState>,
    Query(page): Query<Page>,
) -> Json<Vec<BlockView>> {
    let start = page.start.unwrap_or(0);
    let limit = page
        .limit
        .unwrap_or(BLOCKS_PER_BATCH)
        .min(MAX_BLOCKS_PER_REQUEST);
    let blocks = state.chain.blocks(start, limit);
    Json(blocks.iter().map(BlockView::from).collect())
}

async fn block_by_index(
    State(state): State<AppState>,
    Path(index): Path<u64>,
) -> Result<Json<BlockView>, ApiError> {
    let block = state.chain.block_at(index)?;
    Ok(Json(BlockView::from(&block)))
}

async fn propose(
    State(state): State<AppState>,
    Json(payload): Json<Value>,
) -> Result<(StatusCode, Json<BlockView>), ApiError> {
    let chain = Arc::clone(&state.chain);
    let block = tokio::task::spawn_blocking(move || chain.propose(&payload)).await??;
    let view = BlockView::from(&block);
    info!(index = view.index, digest = %view.digest, "block accepted");
    Ok((StatusCode::CREATED, Json(view)))
}
