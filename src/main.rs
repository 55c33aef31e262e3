use anyhow::{Context, Result};
use gutensearch::{
    api, config,
    elastic::{ElasticService, ElasticSettings},
    logging,
    search::SearchService,
};
use std::net::Ipv4Addr;
use std::sync::Arc;
use tokio::net::TcpListener;

#[tokio::main]
async fn main() -> Result<()> {
    let config = config::init_config().context("failed to load configuration")?;
    logging::init_tracing("gutensearch");

    let elastic = ElasticService::connect(&ElasticSettings::from_config(config))
        .context("failed to build Elasticsearch client")?;
    let service = Arc::new(SearchService::new(elastic));
    let app = api::create_router(service.clone());

    let port = config.server_port;
    let listener = TcpListener::bind((Ipv4Addr::UNSPECIFIED, port))
        .await
        .with_context(|| format!("failed to bind port {port}"))?;
    tracing::info!("Listening on http://0.0.0.0:{}", port);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(err) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %err, "Failed to listen for shutdown signal");
            }
        })
        .await
        .context("HTTP server terminated unexpectedly")?;

    if let Ok(service) = Arc::try_unwrap(service) {
        service.close();
    }
    tracing::info!("Server stopped");
    Ok(())
}
