//! Fallback decorator: one retry with a second model name

use crate::error::LlmError;
use crate::model::TextModel;
use crate::types::{ChatRequest, Completion};
use async_trait::async_trait;
use std::sync::Arc;

/// Retries a failed completion once with `fallback_model`
///
/// Missing credentials are returned as-is, and so is a failure of a request
/// that already targets the fallback model.
#[derive(Clone)]
pub struct FallbackTextModel {
    inner: Arc<dyn TextModel>,
    fallback_model: String,
}

impl FallbackTextModel {
    #[must_use]
    pub fn new(inner: Arc<dyn TextModel>, fallback_model: impl Into<String>) -> Self {
        Self {
            inner,
            fallback_model: fallback_model.into(),
        }
    }

    #[inline]
    #[must_use]
    pub fn fallback_model(&self) -> &str {
        &self.fallback_model
    }
}

impl std::fmt::Debug for FallbackTextModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FallbackTextModel")
            .field("fallback_model", &self.fallback_model)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl TextModel for FallbackTextModel {
    async fn complete(&self, request: ChatRequest) -> Result<Completion, LlmError> {
        match self.inner.complete(request.clone()).await {
            Ok(completion) => Ok(completion),
            Err(e) if e.allows_fallback() && request.model != self.fallback_model => {
                tracing::warn!(
                    model = %request.model,
                    fallback = %self.fallback_model,
                    "model call failed, retrying with fallback: {e}"
                );
                self.inner
                    .complete(request.with_model(self.fallback_model.clone()))
                    .await
            }
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kaleido_core::GenUsage;
    use std::sync::Mutex;

    /// Fails for every model except `good`
    struct Recorder {
        good: &'static str,
        seen: Mutex<Vec<String>>,
        missing_key: bool,
    }

    #[async_trait]
    impl TextModel for Recorder {
        async fn complete(&self, request: ChatRequest) -> Result<Completion, LlmError> {
            self.seen.lock().unwrap().push(request.model.clone());
            if self.missing_key {
                return Err(LlmError::MissingCredentials);
            }
            if request.model == self.good {
                Ok(Completion::new("ok", GenUsage::model_only(request.model)))
            } else {
                Err(LlmError::from_status(500, "down"))
            }
        }
    }

    fn recorder(good: &'static str, missing_key: bool) -> Arc<Recorder> {
        Arc::new(Recorder {
            good,
            seen: Mutex::new(Vec::new()),
            missing_key,
        })
    }

    #[tokio::test]
    async fn retries_once_with_fallback() {
        let inner = recorder("gpt-4o", false);
        let model = FallbackTextModel::new(inner.clone(), "gpt-4o");
        let completion = model.complete(ChatRequest::new("gpt-4o-mini")).await.unwrap();
        assert_eq!(completion.usage.model.as_deref(), Some("gpt-4o"));
        assert_eq!(*inner.seen.lock().unwrap(), vec!["gpt-4o-mini", "gpt-4o"]);
    }

    #[tokio::test]
    async fn missing_credentials_are_not_retried() {
        let inner = recorder("gpt-4o", true);
        let model = FallbackTextModel::new(inner.clone(), "gpt-4o");
        let err = model.complete(ChatRequest::new("gpt-4o-mini")).await.unwrap_err();
        assert!(matches!(err, LlmError::MissingCredentials));
        assert_eq!(inner.seen.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn fallback_failure_is_returned() {
        let inner = recorder("none", false);
        let model = FallbackTextModel::new(inner.clone(), "gpt-4o");
        let err = model.complete(ChatRequest::new("gpt-4o-mini")).await.unwrap_err();
        assert!(matches!(err, LlmError::Api { status: 500, .. }));
        assert_eq!(inner.seen.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn same_model_is_not_retried() {
        let inner = recorder("none", false);
        let model = FallbackTextModel::new(inner.clone(), "gpt-4o");
        assert!(model.complete(ChatRequest::new("gpt-4o")).await.is_err());
        assert_eq!(inner.seen.lock().unwrap().len(), 1);
    }
}
