use std::sync::Arc;

use axum::http::StatusCode;

use vendorauth_infra::{
    AuthorizationEngine, Config, FileBackend, JsonStore, StoreError, VendorStore,
};

use crate::app::errors;

/// Engine type served by the API (store erased behind the trait).
pub type Engine = AuthorizationEngine<Arc<dyn VendorStore>>;

pub struct AppServices {
    engine: Engine,
}

impl AppServices {
    pub fn new(store: Arc<dyn VendorStore>) -> Self {
        Self {
            engine: AuthorizationEngine::new(store),
        }
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }
}

/// Open the file-backed store configured in `config`.
pub fn build_services(config: &Config) -> Result<AppServices, StoreError> {
    let backend = FileBackend::new(&config.vendor_store_path, &config.history_store_path)?;
    let store = JsonStore::open(backend)?;
    tracing::info!(
        vendor_store = %config.vendor_store_path.display(),
        history_store = %config.history_store_path.display(),
        "vendor store opened"
    );
    Ok(AppServices::new(Arc::new(store)))
}

/// Run an engine call on the blocking pool.
///
/// Writers hold the store locks while the collection files are rewritten, so
/// reads can block as well; neither may run on an async worker thread.
pub async fn with_engine<T, F>(
    services: Arc<AppServices>,
    f: F,
) -> Result<T, axum::response::Response>
where
    F: FnOnce(&Engine) -> T + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(move || f(services.engine()))
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "blocking engine task failed");
            errors::json_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal_error",
                "request could not be completed",
            )
        })
}
