use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};

use vendorauth_infra::AuthorizationError;
use vendorauth_vendors::Transition;

use crate::app::services::{self, AppServices};
use crate::app::{dto, errors};
use crate::context::ActorContext;

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_vendors))
        .route("/:id/authorize", post(authorize_vendor))
        .route("/:id/revoke", post(revoke_vendor))
        .route("/:id/status", get(vendor_status))
        .route("/:id/history", get(vendor_history))
}

pub async fn list_vendors(
    Extension(services): Extension<Arc<AppServices>>,
) -> axum::response::Response {
    match services::with_engine(services, |engine| engine.list_vendors()).await {
        Ok(vendors) => (StatusCode::OK, Json(vendors)).into_response(),
        Err(resp) => resp,
    }
}

pub async fn authorize_vendor(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(actor): Extension<ActorContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    change_state(services, actor, id, Transition::Authorize).await
}

pub async fn revoke_vendor(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(actor): Extension<ActorContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    change_state(services, actor, id, Transition::Revoke).await
}

pub async fn vendor_status(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let vendor_id = match errors::parse_vendor_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    match services::with_engine(services, move |engine| engine.query_state(vendor_id)).await {
        Ok(result) => state_response(result),
        Err(resp) => resp,
    }
}

pub async fn vendor_history(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let vendor_id = match errors::parse_vendor_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    match services::with_engine(services, move |engine| engine.history(vendor_id)).await {
        Ok(history) => (StatusCode::OK, Json(history)).into_response(),
        Err(resp) => resp,
    }
}

async fn change_state(
    services: Arc<AppServices>,
    actor: ActorContext,
    id: String,
    transition: Transition,
) -> axum::response::Response {
    let vendor_id = match errors::parse_vendor_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    let result = match services::with_engine(services, move |engine| {
        engine.set_state(vendor_id, transition.target(), actor.actor())
    })
    .await
    {
        Ok(r) => r,
        Err(resp) => return resp,
    };

    state_response(result)
}

fn state_response(result: Result<bool, AuthorizationError>) -> axum::response::Response {
    match result {
        Ok(authorized) => {
            (StatusCode::OK, Json(dto::StateResponse::from(authorized))).into_response()
        }
        Err(e) => errors::authorization_error_to_response(e),
    }
}
