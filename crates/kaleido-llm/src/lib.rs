//! Kaleido LLM - text and image model capabilities
//!
//! The pipeline only ever sees the [`TextModel`] and [`ImageModel`] traits:
//! - [`OpenAiClient`] talks to the OpenAI REST API
//! - [`FallbackTextModel`] retries a failed call once with a second model
//! - [`UnconfiguredTextModel`] and [`NoImageModel`] stand in when no key is set

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod error;
pub mod fallback;
pub mod model;
pub mod openai;
pub mod types;

pub use error::LlmError;
pub use fallback::FallbackTextModel;
pub use model::{ImageModel, NoImageModel, TextModel, UnconfiguredTextModel};
pub use openai::{OpenAiClient, OpenAiConfig, DEFAULT_BASE_URL, DEFAULT_IMAGE_MODEL};
pub use types::{ChatMessage, ChatRequest, ChatRole, Completion, ImageRequest, ResponseFormat};
