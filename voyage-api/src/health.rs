use axum::{
    extract::State,
    http::header,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde_json::{json, Value};
use crate::error::AppError;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/metrics", get(metrics))
}

/// GET /health
/// Pings Postgres when the engine runs on it.
async fn health(State(state): State<AppState>) -> Result<Json<Value>, AppError> {
    if let Some(db) = &state.db {
        db.ping().await?;
    }
    Ok(Json(json!({ "status": "ok" })))
}

/// GET /metrics
async fn metrics(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    let body = state.metrics.render().map_err(anyhow::Error::from)?;
    Ok(([(header::CONTENT_TYPE, "text/plain; version=0.0.4")], body))
}
