use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json},
};
use serde_json::json;

use crate::state::AppState;

/// GET / - public service info
pub async fn root(State(state): State<AppState>) -> impl IntoResponse {
    Json(json!({
        "data": {
            "name": "Mizan API",
            "version": env!("CARGO_PKG_VERSION"),
            "description": "Multi-tenant REST API gateway for the Mizan ERP platform",
            "endpoints": {
                "data": "/v1/:resource[/:id] (API key or bearer token required)",
                "health": "/health (public)",
            },
            "documentation": state.config.security.docs_url,
        }
    }))
}

/// GET /health - liveness, including store reachability
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let now = chrono::Utc::now();

    match state.store.ping().await {
        Ok(()) => (
            StatusCode::OK,
            Json(json!({
                "data": {
                    "status": "ok",
                    "timestamp": now,
                    "database": "ok",
                }
            })),
        ),
        Err(e) => {
            tracing::error!("health check failed: {}", e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({
                    "error": "database unavailable",
                    "status": 503,
                })),
            )
        }
    }
}
