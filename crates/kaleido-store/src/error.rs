//! Error types for the storage backends

/// Storage backend failure
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// HTTP transport failure talking to a hosted store
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// Local filesystem failure
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Value could not be encoded or decoded
    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    /// Backend rejected the operation
    #[error("backend error: {0}")]
    Backend(String),

    /// Backend is not configured for this operation
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

impl StoreError {
    /// Backend error for a non-success HTTP status
    #[must_use]
    pub fn status(operation: &str, status: u16, body: &str) -> Self {
        let body: String = body.chars().take(300).collect();
        Self::Backend(format!("{operation} failed with {status}: {body}"))
    }
}

impl From<redis::RedisError> for StoreError {
    fn from(e: redis::RedisError) -> Self {
        Self::Backend(format!("redis: {e}"))
    }
}
