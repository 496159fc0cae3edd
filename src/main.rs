use std::sync::Arc;

use idnet::{AppState, app, config::Config, registry::MemoryRegistry};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,idnet=debug")),
        )
        .init();

    let config = Config::from_env();
    info!(?config, "loaded configuration");

    let http_addr = config.http_addr;
    let state = AppState::new(Arc::new(MemoryRegistry::default()), config);

    let listener = tokio::net::TcpListener::bind(http_addr).await?;
    info!(addr = %http_addr, "serving");

    axum::serve(listener, app(state))
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "failed to listen for ctrl+c");
                std::future::pending::<()>().await;
            }
            info!("shutting down");
        })
        .await?;

    Ok(())
}
