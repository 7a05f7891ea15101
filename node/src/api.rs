//! # Peer Wire Protocol + Operator API
//!
//! Builds the axum router that exposes both the consensus peer wire
//! protocol (the surface other delegates call into) and a pair of ambient
//! operator endpoints, `/health` and `/status`.
//!
//! ## Endpoints
//!
//! | Method | Path                              | Description                         |
//! |--------|-----------------------------------|--------------------------------------|
//! | POST   | `/block/api/blockFromPeer`        | Ingest a block from a peer           |
//! | POST   | `/vote/api/vote`                  | Ingest a vote from a peer            |
//! | POST   | `/vote/api/voteResult`            | Ingest a certificate from a peer     |
//! | GET    | `/block/api/getBlockByHeight`     | Block by height, or 404              |
//! | GET    | `/block/api/getHeaderByHeight`    | Header by height, or 404             |
//! | GET    | `/block/api/getHeaderByHash`      | Header by hash, or null              |
//! | POST   | `/block/api/last`                 | Current chain tip header             |
//! | GET    | `/vote/api/getVotes`              | Certificate for a committed block    |
//! | GET    | `/health`                         | Liveness probe                       |
//! | GET    | `/status`                         | Node/round/height snapshot           |

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use nova_dbft::consensus::driver::{now_ms, ConsensusDriver};
use nova_dbft::consensus::vote::{Certificate, Vote};
use nova_dbft::storage::block::Block;
use serde::Deserialize;
use tower_http::trace::TraceLayer;

/// Shared application state handed to every request handler.
#[derive(Clone)]
pub struct AppState {
    pub driver: Arc<ConsensusDriver>,
    pub version: String,
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/block/api/blockFromPeer", post(block_from_peer))
        .route("/vote/api/vote", post(vote_from_peer))
        .route("/vote/api/voteResult", post(vote_result_from_peer))
        .route("/block/api/getBlockByHeight", get(get_block_by_height))
        .route("/block/api/getHeaderByHeight", get(get_header_by_height))
        .route("/block/api/getHeaderByHash", get(get_header_by_hash))
        .route("/block/api/last", post(get_last))
        .route("/vote/api/getVotes", get(get_votes))
        .route("/health", get(health_handler))
        .route("/status", get(status_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn block_from_peer(State(state): State<AppState>, Json(block): Json<Block>) -> impl IntoResponse {
    match state.driver.on_peer_block(block, now_ms()).await {
        Ok(()) => StatusCode::OK.into_response(),
        Err(e) => {
            tracing::warn!(error = %e, "on_peer_block failed");
            // Protocol violations never surface as 5xx on the peer boundary.
            StatusCode::OK.into_response()
        }
    }
}

async fn vote_from_peer(State(state): State<AppState>, Json(vote): Json<Vote>) -> impl IntoResponse {
    match state.driver.on_peer_vote(vote).await {
        Ok(()) => Json(true).into_response(),
        Err(e) => {
            tracing::warn!(error = %e, "on_peer_vote failed");
            Json(false).into_response()
        }
    }
}

async fn vote_result_from_peer(State(state): State<AppState>, Json(certificate): Json<Certificate>) -> impl IntoResponse {
    let driver = state.driver.clone();
    tokio::spawn(async move {
        if let Err(e) = driver.on_peer_certificate(certificate, now_ms()).await {
            tracing::warn!(error = %e, "on_peer_certificate failed");
        }
    });
    Json(serde_json::json!({}))
}

#[derive(Deserialize)]
struct HeightQuery {
    height: i64,
}

async fn get_block_by_height(State(state): State<AppState>, Query(q): Query<HeightQuery>) -> impl IntoResponse {
    match state.driver.persistence().block_by_height(q.height).await {
        Ok(Some(block)) => Json(block).into_response(),
        Ok(None) => StatusCode::NOT_FOUND.into_response(),
        Err(e) => {
            tracing::error!(error = %e, "persistence lookup failed");
            StatusCode::NOT_FOUND.into_response()
        }
    }
}

async fn get_header_by_height(State(state): State<AppState>, Query(q): Query<HeightQuery>) -> impl IntoResponse {
    let last_height = state.driver.last_header().height;
    if q.height > last_height {
        return (StatusCode::NOT_FOUND, format!("height {} exceeds chain tip {last_height}", q.height)).into_response();
    }
    match state.driver.persistence().header_by_height(q.height).await {
        Ok(Some(header)) => Json(header).into_response(),
        Ok(None) => StatusCode::NOT_FOUND.into_response(),
        Err(e) => {
            tracing::error!(error = %e, "persistence lookup failed");
            StatusCode::NOT_FOUND.into_response()
        }
    }
}

#[derive(Deserialize)]
struct HashQuery {
    hash: String,
}

async fn get_header_by_hash(State(state): State<AppState>, Query(q): Query<HashQuery>) -> impl IntoResponse {
    let hash = match hex::decode(&q.hash).ok().and_then(|b| <[u8; 32]>::try_from(b).ok()) {
        Some(h) => h,
        None => return Json(serde_json::Value::Null),
    };
    match state.driver.persistence().header_by_hash(&hash).await {
        Ok(Some(header)) => Json(serde_json::to_value(header).unwrap_or(serde_json::Value::Null)),
        _ => Json(serde_json::Value::Null),
    }
}

async fn get_last(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.driver.last_header())
}

async fn get_votes(State(state): State<AppState>, Query(q): Query<HashQuery>) -> impl IntoResponse {
    let hash = match hex::decode(&q.hash).ok().and_then(|b| <[u8; 32]>::try_from(b).ok()) {
        Some(h) => h,
        None => return Json(serde_json::Value::Null),
    };
    let header = state.driver.persistence().header_by_hash(&hash).await.ok().flatten();
    let Some(header) = header else {
        return Json(serde_json::Value::Null);
    };
    match state.driver.persistence().certificate_by_height(header.height).await {
        Ok(Some(certificate)) => Json(serde_json::to_value(certificate).unwrap_or(serde_json::Value::Null)),
        _ => Json(serde_json::Value::Null),
    }
}

async fn health_handler() -> impl IntoResponse {
    (StatusCode::OK, Json(serde_json::json!({ "status": "ok" })))
}

async fn status_handler(State(state): State<AppState>) -> impl IntoResponse {
    let header = state.driver.last_header();
    Json(serde_json::json!({
        "version": state.version,
        "height": header.height,
        "hash": header.hash_hex(),
        "round_time_ms": state.driver.round_time(),
        "roster_len": state.driver.roster_len(),
        "quorum": state.driver.quorum(),
        "self_account": state.driver.self_peer().account,
    }))
}
