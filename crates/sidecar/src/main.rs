//! Argus sidecar entry point.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use argus_sidecar::client::{AnalysisClient, DEFAULT_TIMEOUT, GuardedSender};
use argus_sidecar::config::SidecarConfig;
use argus_sidecar::proxy::OriginProxy;
use argus_sidecar::rules::RuleEngine;
use argus_sidecar::{SidecarState, build_router};
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = SidecarConfig::from_env()?;

    let waf = Arc::new(RuleEngine::new().context("failed to initialize rule engine")?);
    let client = AnalysisClient::new(&config.api_url, &config.api_key, DEFAULT_TIMEOUT)
        .context("failed to build analysis client")?;
    let sender = Arc::new(GuardedSender::new(client));
    let proxy = Arc::new(OriginProxy::new(&config.target_url)?);

    let state = Arc::new(SidecarState::new(waf, sender, proxy));
    let app = build_router(state);

    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(addr = %addr, target = %config.target_url, "Argus sidecar active");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
