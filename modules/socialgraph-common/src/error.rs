use thiserror::Error;

/// Failures inside a single crawl branch. None of these abort the crawl;
/// the engine logs them against the offending id and moves on.
#[derive(Error, Debug)]
pub enum CrawlError {
    /// Transport failure or malformed upstream response for one id.
    #[error("Fetch error for {id}: {message}")]
    Fetch { id: String, message: String },

    /// Entity without a usable id.
    #[error("Invalid entity: missing id")]
    InvalidEntity,

    /// The graph store rejected a write.
    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl CrawlError {
    pub fn fetch(id: &str, err: impl std::fmt::Display) -> Self {
        CrawlError::Fetch {
            id: id.to_string(),
            message: err.to_string(),
        }
    }

    pub fn persistence(err: impl std::fmt::Display) -> Self {
        CrawlError::Persistence(err.to_string())
    }
}
