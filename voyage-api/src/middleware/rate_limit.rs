use axum::{
    extract::{ConnectInfo, Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::net::SocketAddr;
use voyage_store::redis_repo::ip_rate_key;
use crate::state::AppState;

/// Per-client-IP fixed window limit. Skipped when Redis is not configured or
/// the peer address is unknown; fails open when Redis errors.
pub async fn rate_limit_middleware(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Response {
    let Some(redis) = state.redis.clone() else {
        return next.run(req).await;
    };
    let Some(addr) = req
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|info| info.0)
    else {
        return next.run(req).await;
    };

    let key = ip_rate_key(&addr.ip().to_string());
    let limits = &state.rate_limit;
    match redis
        .check_rate_limit(&key, limits.requests_per_window, limits.window_seconds)
        .await
    {
        Ok(true) => next.run(req).await,
        Ok(false) => {
            tracing::warn!("Rate limit exceeded for {}", addr.ip());
            (
                StatusCode::TOO_MANY_REQUESTS,
                Json(json!({ "error": "Rate limit exceeded" })),
            )
                .into_response()
        }
        Err(e) => {
            tracing::warn!("Rate limiter unavailable, allowing request: {}", e);
            next.run(req).await
        }
    }
}
