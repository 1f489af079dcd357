use anyhow::{Context, Result};

/// Core configuration loaded from environment variables.
/// `ANTHROPIC_API_KEY` is required; everything else has a default.
#[derive(Debug, Clone)]
pub struct Config {
    pub anthropic_api_key: String,
    /// Model used by the bundled Anthropic gateway.
    pub model: String,
    /// Per-call timeout for gateway requests, in seconds. A timeout is a
    /// retryable provider failure at the pipeline-stage level.
    pub llm_timeout_secs: u64,
    /// Postgres connection string for the sqlx store. Optional — embedders
    /// running on the in-memory store never set it.
    pub database_url: Option<String>,
    pub rust_log: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        Ok(Config {
            anthropic_api_key: require_env("ANTHROPIC_API_KEY")?,
            model: std::env::var("VIVA_MODEL").unwrap_or_else(|_| "claude-sonnet-4-5".to_string()),
            llm_timeout_secs: std::env::var("LLM_TIMEOUT_SECS")
                .unwrap_or_else(|_| "120".to_string())
                .parse::<u64>()
                .context("LLM_TIMEOUT_SECS must be a number of seconds")?,
            database_url: std::env::var("DATABASE_URL").ok(),
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
        })
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}
