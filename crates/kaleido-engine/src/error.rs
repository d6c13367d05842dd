//! Error types for the generation pipeline

use kaleido_llm::LlmError;
use kaleido_store::{LeaseError, StoreError};

/// Pipeline failure
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Model call failed after any fallback
    #[error("model call failed: {0}")]
    Model(#[from] LlmError),

    /// Model answered with something that is not JSON at all
    #[error("malformed model response: {0}")]
    MalformedResponse(String),

    /// Critical section could not run
    #[error(transparent)]
    Lease(#[from] LeaseError),

    /// Persistence failed
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// Runtime settings rejected or unreadable
    #[error(transparent)]
    Settings(#[from] SettingsError),

    /// No pipeline registered for the requested strategy
    #[error("strategy not available: {0}")]
    StrategyUnavailable(String),

    /// Per-minute generation budget exhausted
    #[error("rate limited: {current}/{limit} generations this minute")]
    RateLimited { limit: u64, current: u64 },
}

impl EngineError {
    /// Whether a later attempt may succeed
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Model(e) => e.is_retryable(),
            Self::Lease(LeaseError::Timeout { .. }) | Self::RateLimited { .. } => true,
            Self::Lease(LeaseError::Store(_)) | Self::Store(_) => true,
            Self::MalformedResponse(_) | Self::Settings(_) | Self::StrategyUnavailable(_) => false,
        }
    }

    /// Whether the lease wait budget ran out
    #[inline]
    #[must_use]
    pub fn is_lease_timeout(&self) -> bool {
        matches!(self, Self::Lease(LeaseError::Timeout { .. }))
    }
}

/// Runtime settings failure
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    /// Admin update rejected
    #[error("invalid value for {key}: {reason}")]
    Invalid { key: &'static str, reason: String },

    /// Backing store failed
    #[error("settings store error: {0}")]
    Store(#[from] StoreError),
}

impl SettingsError {
    #[must_use]
    pub fn invalid(key: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key,
            reason: reason.into(),
        }
    }
}
