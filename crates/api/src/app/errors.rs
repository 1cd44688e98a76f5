use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use vendorauth_infra::AuthorizationError;

pub fn authorization_error_to_response(err: AuthorizationError) -> axum::response::Response {
    match &err {
        AuthorizationError::InvalidId(_) => {
            json_error(StatusCode::BAD_REQUEST, "invalid_id", err.to_string())
        }
        AuthorizationError::NotFound(_) => {
            json_error(StatusCode::NOT_FOUND, "not_found", err.to_string())
        }
        AuthorizationError::Store(e) => {
            tracing::error!(error = %e, "store failure surfaced to client");
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "store_error", err.to_string())
        }
    }
}

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}

/// Parse the vendor id path segment. Range checks are left to the engine.
pub fn parse_vendor_id(raw: &str) -> Result<i64, axum::response::Response> {
    raw.parse::<i64>().map_err(|_| {
        json_error(
            StatusCode::BAD_REQUEST,
            "invalid_id",
            format!("vendor id must be an integer, got {raw:?}"),
        )
    })
}
