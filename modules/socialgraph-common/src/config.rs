use std::env;
use std::path::PathBuf;
use std::time::Duration;

use tracing::info;

use crate::error::CrawlError;

/// Seed used when neither the CLI nor the environment names one.
pub const DEFAULT_SEED_USER_ID: &str = "326621197";
pub const DEFAULT_MAX_DEPTH: u32 = 2;
pub const DEFAULT_PACING_MS: u64 = 1000;
pub const DEFAULT_POOL_SIZE: usize = 8;
pub const DEFAULT_REPORT_OUTPUT: &str = "output.json";

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    // Neo4j
    pub neo4j_uri: String,
    pub neo4j_user: String,
    pub neo4j_password: String,

    // VK
    pub vk_access_token: String,

    // Crawl
    pub seed_user_id: String,
    pub max_depth: u32,
    pub pacing_delay: Duration,
    pub pool_size: usize,

    // Report
    pub report_output: PathBuf,
}

impl Config {
    /// Load configuration for a crawl run.
    pub fn from_env() -> Result<Self, CrawlError> {
        let store = Self::store_from_env()?;
        Ok(Self {
            vk_access_token: required_env("VK_ACCESS_TOKEN")?,
            seed_user_id: env::var("SEED_USER_ID")
                .unwrap_or_else(|_| DEFAULT_SEED_USER_ID.to_string()),
            max_depth: parsed_env("CRAWL_MAX_DEPTH", DEFAULT_MAX_DEPTH)?,
            pacing_delay: Duration::from_millis(parsed_env("CRAWL_PACING_MS", DEFAULT_PACING_MS)?),
            pool_size: positive(parsed_env("CRAWL_POOL_SIZE", DEFAULT_POOL_SIZE)?, "CRAWL_POOL_SIZE")?,
            report_output: env::var("REPORT_OUTPUT")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from(DEFAULT_REPORT_OUTPUT)),
            ..store
        })
    }

    /// Load a minimal config for store-only tools (no VK token needed).
    pub fn store_from_env() -> Result<Self, CrawlError> {
        Ok(Self {
            neo4j_uri: env::var("NEO4J_URI").unwrap_or_else(|_| "bolt://localhost:7687".to_string()),
            neo4j_user: env::var("NEO4J_USER").unwrap_or_else(|_| "neo4j".to_string()),
            neo4j_password: required_env("NEO4J_PASSWORD")?,
            vk_access_token: String::new(),
            seed_user_id: DEFAULT_SEED_USER_ID.to_string(),
            max_depth: DEFAULT_MAX_DEPTH,
            pacing_delay: Duration::from_millis(DEFAULT_PACING_MS),
            pool_size: DEFAULT_POOL_SIZE,
            report_output: PathBuf::from(DEFAULT_REPORT_OUTPUT),
        })
    }

    /// Log the effective configuration with secrets masked.
    pub fn log_redacted(&self) {
        info!(
            neo4j_uri = self.neo4j_uri.as_str(),
            neo4j_user = self.neo4j_user.as_str(),
            neo4j_password = redact(&self.neo4j_password),
            vk_access_token = redact(&self.vk_access_token),
            seed_user_id = self.seed_user_id.as_str(),
            max_depth = self.max_depth,
            pacing_ms = self.pacing_delay.as_millis() as u64,
            pool_size = self.pool_size,
            report_output = %self.report_output.display(),
            "Configuration loaded"
        );
    }
}

fn required_env(key: &str) -> Result<String, CrawlError> {
    env::var(key).map_err(|_| CrawlError::Config(format!("{key} environment variable is required")))
}

fn parsed_env<T: std::str::FromStr>(key: &str, default: T) -> Result<T, CrawlError> {
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|_| CrawlError::Config(format!("{key} must be a number, got {raw:?}"))),
        Err(_) => Ok(default),
    }
}

fn positive(value: usize, key: &str) -> Result<usize, CrawlError> {
    if value == 0 {
        return Err(CrawlError::Config(format!("{key} must be at least 1")));
    }
    Ok(value)
}

fn redact(secret: &str) -> &'static str {
    if secret.is_empty() {
        "<unset>"
    } else {
        "***"
    }
}
