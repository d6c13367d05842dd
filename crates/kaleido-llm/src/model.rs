//! Model capabilities and their absent implementations

use crate::error::LlmError;
use crate::types::{ChatRequest, Completion, ImageRequest};
use async_trait::async_trait;

/// Chat-style text generation
#[async_trait]
pub trait TextModel: Send + Sync {
    /// Run one completion
    async fn complete(&self, request: ChatRequest) -> Result<Completion, LlmError>;
}

/// Image generation
#[async_trait]
pub trait ImageModel: Send + Sync {
    /// Generate one image and return its base64 payload
    ///
    /// `Ok(None)` means no image is available, which is not an error.
    async fn generate_image(&self, request: ImageRequest) -> Result<Option<String>, LlmError>;
}

/// Text model used when no API key is configured
#[derive(Debug, Clone, Copy, Default)]
pub struct UnconfiguredTextModel;

#[async_trait]
impl TextModel for UnconfiguredTextModel {
    async fn complete(&self, _request: ChatRequest) -> Result<Completion, LlmError> {
        Err(LlmError::MissingCredentials)
    }
}

/// Image model that never produces an image
#[derive(Debug, Clone, Copy, Default)]
pub struct NoImageModel;

#[async_trait]
impl ImageModel for NoImageModel {
    async fn generate_image(&self, _request: ImageRequest) -> Result<Option<String>, LlmError> {
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn null_models() {
        let err = UnconfiguredTextModel
            .complete(ChatRequest::new("m").user("hi"))
            .await
            .unwrap_err();
        assert!(matches!(err, LlmError::MissingCredentials));

        let image = NoImageModel
            .generate_image(ImageRequest::new("p"))
            .await
            .unwrap();
        assert!(image.is_none());
    }
}
