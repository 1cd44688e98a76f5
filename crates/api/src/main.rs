use anyhow::Context;

use vendorauth_infra::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    vendorauth_observability::init();

    let config = Config::from_env().context("invalid configuration")?;
    tracing::info!(
        http_addr = %config.http_addr,
        request_timeout_secs = config.request_timeout.as_secs(),
        "configuration loaded"
    );

    let app = vendorauth_api::app::build_app(&config).context("failed to open vendor store")?;

    let listener = tokio::net::TcpListener::bind(&config.http_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.http_addr))?;

    tracing::info!("listening on {}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    tracing::info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown signal received");
}
