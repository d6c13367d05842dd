//! Request and response types shared by all model backends

use kaleido_core::GenUsage;
use serde::{Deserialize, Serialize};

/// Author of a chat message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

/// One chat message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    #[must_use]
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::System,
            content: content.into(),
        }
    }

    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }
}

/// Requested output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResponseFormat {
    /// Free text
    #[default]
    Text,
    /// A single JSON object
    JsonObject,
}

/// A chat completion request
///
/// Sampling parameters left at `None` use the provider default.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub temperature: Option<f32>,
    pub top_p: Option<f32>,
    pub frequency_penalty: Option<f32>,
    pub presence_penalty: Option<f32>,
    pub max_tokens: Option<u32>,
    pub response_format: ResponseFormat,
}

impl ChatRequest {
    /// Create a request for `model` with no messages
    #[must_use]
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            messages: Vec::new(),
            temperature: None,
            top_p: None,
            frequency_penalty: None,
            presence_penalty: None,
            max_tokens: None,
            response_format: ResponseFormat::Text,
        }
    }

    /// Append a system message
    #[must_use]
    pub fn system(mut self, content: impl Into<String>) -> Self {
        self.messages.push(ChatMessage::system(content));
        self
    }

    /// Append a user message
    #[must_use]
    pub fn user(mut self, content: impl Into<String>) -> Self {
        self.messages.push(ChatMessage::user(content));
        self
    }

    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    #[must_use]
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    #[must_use]
    pub fn with_top_p(mut self, top_p: f32) -> Self {
        self.top_p = Some(top_p);
        self
    }

    #[must_use]
    pub fn with_penalties(mut self, frequency: f32, presence: f32) -> Self {
        self.frequency_penalty = Some(frequency);
        self.presence_penalty = Some(presence);
        self
    }

    #[must_use]
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    /// Ask for a single JSON object
    #[must_use]
    pub fn json_object(mut self) -> Self {
        self.response_format = ResponseFormat::JsonObject;
        self
    }

    /// Content of the first system message
    #[must_use]
    pub fn system_prompt(&self) -> Option<&str> {
        self.messages
            .iter()
            .find(|m| m.role == ChatRole::System)
            .map(|m| m.content.as_str())
    }

    /// Content of the last user message
    #[must_use]
    pub fn user_prompt(&self) -> Option<&str> {
        self.messages
            .iter()
            .rev()
            .find(|m| m.role == ChatRole::User)
            .map(|m| m.content.as_str())
    }
}

/// Result of a chat completion
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Completion {
    /// Trimmed text of the first choice; empty when the model produced nothing
    pub content: String,
    pub usage: GenUsage,
}

impl Completion {
    #[must_use]
    pub fn new(content: impl Into<String>, usage: GenUsage) -> Self {
        Self {
            content: content.into(),
            usage,
        }
    }
}

/// An image generation request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageRequest {
    pub prompt: String,
    /// Model override; the backend default when `None`
    pub model: Option<String>,
    /// Pixel size such as `1024x1024`
    pub size: String,
}

impl ImageRequest {
    /// Square 1024px image for `prompt`
    #[must_use]
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            model: None,
            size: "1024x1024".to_string(),
        }
    }

    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_collects_messages_and_params() {
        let request = ChatRequest::new("gpt-4o-mini")
            .system("be wild")
            .user("go")
            .with_temperature(1.6)
            .with_top_p(0.95)
            .with_penalties(1.2, 1.0)
            .json_object();

        assert_eq!(request.messages.len(), 2);
        assert_eq!(request.system_prompt(), Some("be wild"));
        assert_eq!(request.user_prompt(), Some("go"));
        assert_eq!(request.frequency_penalty, Some(1.2));
        assert_eq!(request.response_format, ResponseFormat::JsonObject);
        assert!(request.max_tokens.is_none());
    }

    #[test]
    fn image_request_defaults_to_square() {
        let request = ImageRequest::new("a cat");
        assert_eq!(request.size, "1024x1024");
        assert!(request.model.is_none());
    }
}
