//! Argus analysis backend entry point.

use std::sync::Arc;

use argus_analyzer::{Analyzer, GeminiClient};
use argus_server::config::{GEMINI_MODEL, ServerConfig};
use argus_server::{AppState, build_router};
use argus_storage::PostgresStore;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .json()
        .init();

    let config = ServerConfig::from_env()?;

    let store = PostgresStore::connect(&config.database_url).await?;
    store.migrate().await?;

    let gemini = GeminiClient::new(config.gemini_api_key.clone(), GEMINI_MODEL)?;
    let analyzer = Analyzer::new(Arc::new(gemini));

    let state = Arc::new(AppState::new(
        Arc::new(store),
        analyzer,
        config.jwt_secret.clone(),
    ));
    let app = build_router(state);

    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(addr = %addr, "Starting Argus API");
    axum::serve(listener, app).await?;

    Ok(())
}
