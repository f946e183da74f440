//! Liveness check.

use axum::http::StatusCode;

/// `GET /health`: 200 as long as the server accepts connections. Store
/// reachability is reported per request (503), not here.
pub async fn health_handler() -> (StatusCode, &'static str) {
    (StatusCode::OK, "OK")
}
