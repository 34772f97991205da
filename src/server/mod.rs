pub mod routes;

use crate::errors::IpvError;
use crate::state::AppState;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use std::sync::Arc;

/// Upload bodies larger than this are rejected before parsing.
const MAX_BODY_BYTES: usize = 32 * 1024 * 1024;

pub fn build_router(state: Arc<AppState>) -> axum::Router {
    axum::Router::new()
        .route("/api/price", post(routes::post_price))
        .route("/api/spot", get(routes::get_spot))
        .route("/api/ipv", post(routes::post_ipv))
        .route("/api/ipv/export", post(routes::post_ipv_export))
        .route("/api/runs", get(routes::get_runs))
        .route("/api/pricings", get(routes::get_pricings))
        .route("/api/counters", get(routes::get_counters))
        .layer(axum::extract::DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(
            tower_http::cors::CorsLayer::new()
                .allow_origin(tower_http::cors::Any)
                .allow_methods(tower_http::cors::Any)
                .allow_headers(tower_http::cors::Any),
        )
        .with_state(state)
}

impl IntoResponse for IpvError {
    fn into_response(self) -> Response {
        let status = if self.is_client_error() {
            StatusCode::BAD_REQUEST
        } else {
            match self {
                IpvError::SpotFeed(_) => StatusCode::BAD_GATEWAY,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            }
        };
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }
        (status, Json(serde_json::json!({ "error": self.to_string() }))).into_response()
    }
}
