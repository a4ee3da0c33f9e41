use crate::cache::ResponseCache;
use crate::guard::{guarded, CacheStatus, GuardError, Operation};
use crate::run::Playground;
use crate::{Request, Response as PlayResponse};

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use axum::Router;
use serde_json::json;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{debug, error};

#[derive(Clone)]
pub struct AppState {
    pub playground: Arc<Playground>,
    pub cache: Arc<dyn ResponseCache>,
    /// Toolchain version, part of every cache key.
    pub version: Arc<str>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/compile", post(compile_handler))
        .route("/vet", post(vet_handler))
        .route("/version", get(version_handler))
        .route("/_ah/health", get(health_handler))
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

fn parse_request(body: &[u8]) -> Result<Request, Response> {
    serde_json::from_slice(body).map_err(|err| {
        error!(%err, "error decoding request");
        status_text(StatusCode::BAD_REQUEST)
    })
}

fn status_text(status: StatusCode) -> Response {
    let text = status.canonical_reason().unwrap_or_default();
    (status, text).into_response()
}

async fn compile_handler(State(state): State<AppState>, body: Bytes) -> Response {
    let req = match parse_request(&body) {
        Ok(req) => req,
        Err(res) => return res,
    };
    let op = Operation::compile(req.with_vet);
    let result = guarded(&*state.cache, op, &state.version, &req.body, || {
        state.playground.compile_and_run(&req)
    })
    .await;
    respond(result)
}

async fn vet_handler(State(state): State<AppState>, body: Bytes) -> Response {
    let req = match parse_request(&body) {
        Ok(req) => req,
        Err(res) => return res,
    };
    let result = guarded(&*state.cache, Operation::Vet, &state.version, &req.body, || {
        state.playground.vet_check(&req)
    })
    .await;
    respond(result)
}

fn respond(result: Result<(PlayResponse, CacheStatus), GuardError>) -> Response {
    match result {
        Ok((resp, cache)) => {
            debug!(?cache, "responding");
            Json(resp).into_response()
        }
        Err(err) => {
            error!(%err, "request failed");
            status_text(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

async fn version_handler(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(json!({ "Version": &*state.version }))
}

async fn health_handler(State(state): State<AppState>) -> Response {
    match state.playground.health_check().await {
        Ok(()) => "ok".into_response(),
        Err(err) => {
            error!(?err, "health check failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Health check failed: {:#}", err),
            )
                .into_response()
        }
    }
}
