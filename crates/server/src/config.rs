//! Backend configuration from the environment.

use anyhow::Context;

/// Model used for classification.
pub const GEMINI_MODEL: &str = "gemini-2.5-flash";

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub gemini_api_key: String,
    pub database_url: String,
    pub jwt_secret: String,
    pub port: u16,
}

impl ServerConfig {
    /// Read and validate the environment. Missing required variables are
    /// fatal for startup.
    pub fn from_env() -> anyhow::Result<Self> {
        let gemini_api_key =
            std::env::var("GEMINI_API_KEY").context("GEMINI_API_KEY is required")?;
        let database_url = std::env::var("DATABASE_URL").context("DATABASE_URL is required")?;
        let jwt_secret =
            std::env::var("SUPABASE_JWT_SECRET").context("SUPABASE_JWT_SECRET is required")?;
        let port = std::env::var("PORT")
            .unwrap_or_else(|_| "8080".to_string())
            .parse::<u16>()
            .context("PORT must be a valid port number")?;

        Ok(Self {
            gemini_api_key,
            database_url,
            jwt_secret,
            port,
        })
    }
}
