use axum::http::StatusCode;

use crate::app::errors;

pub async fn health() -> (StatusCode, &'static str) {
    (StatusCode::OK, "ok")
}

pub async fn not_found() -> axum::response::Response {
    errors::json_error(StatusCode::NOT_FOUND, "not_found", "route not found")
}
