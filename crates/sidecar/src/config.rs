//! Sidecar configuration from the environment.

use anyhow::Context;

#[derive(Debug, Clone)]
pub struct SidecarConfig {
    /// Origin the sidecar protects.
    pub target_url: String,
    /// Port the sidecar listens on.
    pub port: u16,
    /// Project API key for the analysis backend.
    pub api_key: String,
    /// Base URL of the analysis backend.
    pub api_url: String,
}

impl SidecarConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let target_url = env_or("TARGET_URL", "http://localhost:5000");
        let api_url = env_or("ARGUS_API_URL", "http://localhost:8080");
        let api_key = std::env::var("ARGUS_API_KEY").context("ARGUS_API_KEY is required")?;
        let port = env_or("SIDECAR_PORT", "8000")
            .parse::<u16>()
            .context("SIDECAR_PORT must be a valid port number")?;

        Ok(Self {
            target_url,
            port,
            api_key,
            api_url,
        })
    }
}

fn env_or(key: &str, fallback: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| fallback.to_string())
}
