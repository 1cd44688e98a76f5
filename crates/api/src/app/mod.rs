//! HTTP API application wiring (Axum router + service wiring).
//!
//! - `services.rs`: store + engine wiring
//! - `routes/`: HTTP routes + handlers
//! - `dto.rs`: request/response DTOs
//! - `errors.rs`: consistent error responses

use std::sync::Arc;
use std::time::Duration;

use axum::{
    Extension, Router,
    http::{HeaderName, Method, header},
    routing::get,
};
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    timeout::TimeoutLayer,
};

use vendorauth_infra::{Config, StoreError};

use crate::middleware;

pub mod dto;
pub mod errors;
pub mod routes;
pub mod services;

/// Build the full HTTP router (public entrypoint used by `main.rs`).
///
/// Opens the vendor store described by `config`; a store that cannot be
/// loaded is an error and no router is built.
pub fn build_app(config: &Config) -> Result<Router, StoreError> {
    let services = Arc::new(services::build_services(config)?);
    Ok(router(services, config.request_timeout))
}

/// Router over already-built services.
pub fn router(services: Arc<services::AppServices>, request_timeout: Duration) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([
            header::CONTENT_TYPE,
            HeaderName::from_static(middleware::ACTOR_HEADER),
        ]);

    Router::new()
        .route("/health", get(routes::system::health))
        .merge(routes::router())
        .fallback(routes::system::not_found)
        .layer(Extension(services))
        .layer(axum::middleware::from_fn(middleware::actor_middleware))
        .layer(
            ServiceBuilder::new()
                .layer(cors)
                .layer(TimeoutLayer::new(request_timeout)),
        )
}
