use thiserror::Error;

pub type Result<T> = std::result::Result<T, VkError>;

#[derive(Debug, Error)]
pub enum VkError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("HTTP error (status {status}): {message}")]
    Http { status: u16, message: String },

    /// VK answers most failures with HTTP 200 and an `error` object in the body.
    #[error("VK API error {code}: {message}")]
    Api { code: i64, message: String },

    #[error("Parse error: {0}")]
    Parse(String),
}

impl From<reqwest::Error> for VkError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            VkError::Parse(err.to_string())
        } else {
            VkError::Network(err.to_string())
        }
    }
}

impl From<serde_json::Error> for VkError {
    fn from(err: serde_json::Error) -> Self {
        VkError::Parse(err.to_string())
    }
}
