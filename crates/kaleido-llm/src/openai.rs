//! OpenAI backend over the REST API
//!
//! Implements both [`TextModel`] (`/chat/completions`) and [`ImageModel`]
//! (`/images/generations` with base64 payloads).

use crate::error::LlmError;
use crate::model::{ImageModel, TextModel};
use crate::types::{ChatMessage, ChatRequest, Completion, ImageRequest, ResponseFormat};
use async_trait::async_trait;
use kaleido_core::GenUsage;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default API root
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Default image model
pub const DEFAULT_IMAGE_MODEL: &str = "dall-e-3";

/// Connection settings for [`OpenAiClient`]
#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    pub api_key: String,
    pub base_url: String,
    pub image_model: String,
    pub timeout: Duration,
}

impl OpenAiConfig {
    /// Settings for the public API with `api_key`
    #[must_use]
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            image_model: DEFAULT_IMAGE_MODEL.to_string(),
            timeout: Duration::from_secs(120),
        }
    }

    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    #[must_use]
    pub fn with_image_model(mut self, model: impl Into<String>) -> Self {
        self.image_model = model.into();
        self
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[derive(Serialize)]
struct WireFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Serialize)]
struct WireChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    frequency_penalty: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    presence_penalty: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<WireFormat>,
}

impl<'a> From<&'a ChatRequest> for WireChatRequest<'a> {
    fn from(request: &'a ChatRequest) -> Self {
        Self {
            model: &request.model,
            messages: &request.messages,
            temperature: request.temperature,
            top_p: request.top_p,
            frequency_penalty: request.frequency_penalty,
            presence_penalty: request.presence_penalty,
            max_tokens: request.max_tokens,
            response_format: match request.response_format {
                ResponseFormat::Text => None,
                ResponseFormat::JsonObject => Some(WireFormat {
                    kind: "json_object",
                }),
            },
        }
    }
}

#[derive(Deserialize)]
struct WireChatResponse {
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    choices: Vec<WireChoice>,
    #[serde(default)]
    usage: Option<WireUsage>,
}

#[derive(Deserialize)]
struct WireChoice {
    message: WireMessage,
}

#[derive(Deserialize)]
struct WireMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize)]
struct WireUsage {
    #[serde(default)]
    prompt_tokens: u64,
    #[serde(default)]
    completion_tokens: u64,
}

#[derive(Serialize)]
struct WireImageRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    n: u8,
    size: &'a str,
    response_format: &'static str,
}

#[derive(Deserialize)]
struct WireImageResponse {
    #[serde(default)]
    data: Vec<WireImage>,
}

#[derive(Deserialize)]
struct WireImage {
    #[serde(default)]
    b64_json: Option<String>,
}

/// OpenAI client
#[derive(Debug, Clone)]
pub struct OpenAiClient {
    http: reqwest::Client,
    config: OpenAiConfig,
}

impl OpenAiClient {
    /// Build a client; fails only if the TLS backend cannot initialise
    pub fn new(config: OpenAiConfig) -> Result<Self, LlmError> {
        let http = reqwest::Client::builder().timeout(config.timeout).build()?;
        Ok(Self { http, config })
    }

    #[inline]
    #[must_use]
    pub fn config(&self) -> &OpenAiConfig {
        &self.config
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{path}", self.config.base_url)
    }

    async fn post<B: Serialize + ?Sized, R: for<'de> Deserialize<'de>>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<R, LlmError> {
        if self.config.api_key.is_empty() {
            return Err(LlmError::MissingCredentials);
        }
        let response = self
            .http
            .post(self.url(path))
            .bearer_auth(&self.config.api_key)
            .json(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::from_status(status.as_u16(), body));
        }
        let bytes = response.bytes().await?;
        serde_json::from_slice(&bytes).map_err(|e| LlmError::Decode(e.to_string()))
    }
}

#[async_trait]
impl TextModel for OpenAiClient {
    async fn complete(&self, request: ChatRequest) -> Result<Completion, LlmError> {
        tracing::debug!(
            model = %request.model,
            max_tokens = ?request.max_tokens,
            "chat completion"
        );
        let wire = WireChatRequest::from(&request);
        let response: WireChatResponse = self.post("chat/completions", &wire).await?;

        let choice = response
            .choices
            .into_iter()
            .next()
            .ok_or(LlmError::EmptyResponse)?;
        let content = choice.message.content.unwrap_or_default().trim().to_string();

        let model = response.model.unwrap_or_else(|| request.model.clone());
        let usage = match response.usage {
            Some(u) => GenUsage::new(u.prompt_tokens, u.completion_tokens, model),
            None => GenUsage::model_only(model),
        };
        Ok(Completion { content, usage })
    }
}

#[async_trait]
impl ImageModel for OpenAiClient {
    async fn generate_image(&self, request: ImageRequest) -> Result<Option<String>, LlmError> {
        let model = request.model.as_deref().unwrap_or(&self.config.image_model);
        tracing::debug!(model, size = %request.size, "image generation");
        let wire = WireImageRequest {
            model,
            prompt: &request.prompt,
            n: 1,
            size: &request.size,
            response_format: "b64_json",
        };
        let response: WireImageResponse = self.post("images/generations", &wire).await?;
        Ok(response
            .data
            .into_iter()
            .next()
            .and_then(|image| image.b64_json)
            .filter(|b64| !b64.is_empty()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::net::SocketAddr;
    use warp::Filter;

    fn spawn_fake(reply: serde_json::Value, status: u16) -> SocketAddr {
        let chat = warp::post()
            .and(warp::path!("v1" / "chat" / "completions"))
            .and(warp::body::json())
            .map(move |body: serde_json::Value| {
                assert_eq!(body["model"], "gpt-4o-mini");
                let code = warp::http::StatusCode::from_u16(status).unwrap();
                warp::reply::with_status(warp::reply::json(&reply), code)
            });
        let (addr, server) = warp::serve(chat).bind_ephemeral(([127, 0, 0, 1], 0));
        tokio::spawn(server);
        addr
    }

    fn client(addr: SocketAddr) -> OpenAiClient {
        OpenAiClient::new(OpenAiConfig::new("sk-test").with_base_url(format!("http://{addr}/v1/")))
            .unwrap()
    }

    #[test]
    fn wire_request_omits_unset_params() {
        let request = ChatRequest::new("gpt-4o-mini").user("hi").json_object();
        let value = serde_json::to_value(WireChatRequest::from(&request)).unwrap();
        assert_eq!(value["response_format"]["type"], "json_object");
        assert_eq!(value["messages"][0]["role"], "user");
        assert!(value.get("temperature").is_none());
        assert!(value.get("max_tokens").is_none());
    }

    #[tokio::test]
    async fn completion_reads_content_and_usage() {
        let addr = spawn_fake(
            json!({
                "model": "gpt-4o-mini-2024",
                "choices": [{ "message": { "content": "  <p>hi</p>\n" } }],
                "usage": { "prompt_tokens": 12, "completion_tokens": 34 }
            }),
            200,
        );
        let completion = client(addr)
            .complete(ChatRequest::new("gpt-4o-mini").user("hi"))
            .await
            .unwrap();
        assert_eq!(completion.content, "<p>hi</p>");
        assert_eq!(completion.usage, GenUsage::new(12, 34, "gpt-4o-mini-2024"));
    }

    #[tokio::test]
    async fn no_choices_is_empty_response() {
        let addr = spawn_fake(json!({ "choices": [] }), 200);
        let err = client(addr)
            .complete(ChatRequest::new("gpt-4o-mini"))
            .await
            .unwrap_err();
        assert!(matches!(err, LlmError::EmptyResponse));
    }

    #[tokio::test]
    async fn throttling_maps_to_rate_limited() {
        let addr = spawn_fake(json!({ "error": "slow down" }), 429);
        let err = client(addr)
            .complete(ChatRequest::new("gpt-4o-mini"))
            .await
            .unwrap_err();
        assert!(matches!(err, LlmError::RateLimited));
    }

    #[tokio::test]
    async fn empty_key_never_hits_the_network() {
        let client = OpenAiClient::new(OpenAiConfig::new("").with_base_url("http://127.0.0.1:9")).unwrap();
        let err = client.complete(ChatRequest::new("m")).await.unwrap_err();
        assert!(matches!(err, LlmError::MissingCredentials));
    }
}
