//! Error types for model calls

/// Failure of a text or image model call
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    /// No API key configured
    #[error("model credentials are not configured")]
    MissingCredentials,

    /// Connection, timeout or body read failure
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// Non-success status not covered by a more specific variant
    #[error("provider returned {status}: {body}")]
    Api {
        /// HTTP status code
        status: u16,
        /// Response body, truncated
        body: String,
    },

    /// Key rejected (401/403)
    #[error("authentication failed with status {0}")]
    Auth(u16),

    /// Provider throttled the call (429)
    #[error("rate limited by provider")]
    RateLimited,

    /// Response carried no choices or image data
    #[error("empty response from provider")]
    EmptyResponse,

    /// Response body did not have the expected shape
    #[error("failed to decode provider response: {0}")]
    Decode(String),
}

impl LlmError {
    /// Map a non-success HTTP status and body to an error
    #[must_use]
    pub fn from_status(status: u16, body: impl Into<String>) -> Self {
        match status {
            401 | 403 => Self::Auth(status),
            429 => Self::RateLimited,
            _ => {
                let mut body = body.into();
                if body.len() > 512 {
                    let mut cut = 512;
                    while !body.is_char_boundary(cut) {
                        cut -= 1;
                    }
                    body.truncate(cut);
                }
                Self::Api { status, body }
            }
        }
    }

    /// Check if the same call might succeed when repeated
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Transport(_) | Self::RateLimited | Self::EmptyResponse => true,
            Self::Api { status, .. } => *status >= 500,
            Self::MissingCredentials | Self::Auth(_) | Self::Decode(_) => false,
        }
    }

    /// Check if a different model could plausibly succeed
    ///
    /// Everything except missing credentials qualifies.
    #[inline]
    #[must_use]
    pub fn allows_fallback(&self) -> bool {
        !matches!(self, Self::MissingCredentials)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_mapping() {
        assert!(matches!(LlmError::from_status(401, ""), LlmError::Auth(401)));
        assert!(matches!(LlmError::from_status(403, ""), LlmError::Auth(403)));
        assert!(matches!(LlmError::from_status(429, ""), LlmError::RateLimited));
        assert!(matches!(
            LlmError::from_status(500, "boom"),
            LlmError::Api { status: 500, .. }
        ));
    }

    #[test]
    fn long_bodies_are_truncated() {
        let LlmError::Api { body, .. } = LlmError::from_status(400, "é".repeat(600)) else {
            panic!("expected api error");
        };
        assert!(body.len() <= 512);
    }

    #[test]
    fn retryability() {
        assert!(LlmError::RateLimited.is_retryable());
        assert!(LlmError::from_status(502, "").is_retryable());
        assert!(!LlmError::from_status(400, "").is_retryable());
        assert!(!LlmError::MissingCredentials.is_retryable());
        assert!(!LlmError::MissingCredentials.allows_fallback());
        assert!(LlmError::Auth(401).allows_fallback());
    }
}
