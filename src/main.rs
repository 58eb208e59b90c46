use anyhow::Context;
use doclens::api::{self, RouterSettings};
use doclens::{config, logging, pipeline::DocumentService};
use std::net::Ipv4Addr;
use std::sync::Arc;
use tokio::net::TcpListener;

const DEFAULT_PORT: u16 = 8000;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = config::init_config().context("Failed to load configuration")?;
    logging::init_tracing();

    let service = Arc::new(
        DocumentService::connect(config)
            .await
            .context("Failed to initialize document service")?,
    );
    let app = api::create_router(service.clone(), &RouterSettings::from_config(config));

    let port = config.server_port.unwrap_or(DEFAULT_PORT);
    let listener = TcpListener::bind((Ipv4Addr::UNSPECIFIED, port))
        .await
        .with_context(|| format!("Failed to bind port {port}"))?;
    tracing::info!("Listening on http://0.0.0.0:{}", port);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    service
        .shutdown()
        .await
        .context("Failed to flush stores on shutdown")?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(error) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %error, "Failed to listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown requested");
}
