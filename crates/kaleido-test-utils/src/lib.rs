//! Testing utilities for the Kaleido workspace
//!
//! Scripted text and image models that record every request, plus plan fixtures.

#![allow(missing_docs)]

use async_trait::async_trait;
use kaleido_core::{ensure_plan, GenUsage, RawSitePlan, SitePlan};
use kaleido_llm::{ChatRequest, Completion, ImageModel, ImageRequest, LlmError, TextModel};
use parking_lot::Mutex;
use serde_json::{json, Value};

type Script = dyn Fn(&ChatRequest) -> Result<String, LlmError> + Send + Sync;

/// Text model answering from a closure
pub struct ScriptedTextModel {
    script: Box<Script>,
    usage: Option<(u64, u64)>,
    calls: Mutex<Vec<ChatRequest>>,
}

impl ScriptedTextModel {
    pub fn new<F>(script: F) -> Self
    where
        F: Fn(&ChatRequest) -> Result<String, LlmError> + Send + Sync + 'static,
    {
        Self {
            script: Box::new(script),
            usage: None,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Same reply to every request
    pub fn constant(reply: impl Into<String>) -> Self {
        let reply = reply.into();
        Self::new(move |_| Ok(reply.clone()))
    }

    /// Every request fails with a fresh error from `make`
    pub fn failing<F>(make: F) -> Self
    where
        F: Fn() -> LlmError + Send + Sync + 'static,
    {
        Self::new(move |_| Err(make()))
    }

    /// Report these token counts for every answered call
    #[must_use]
    pub fn with_usage(mut self, input_tokens: u64, output_tokens: u64) -> Self {
        self.usage = Some((input_tokens, output_tokens));
        self
    }

    /// Requests received so far, in arrival order
    pub fn calls(&self) -> Vec<ChatRequest> {
        self.calls.lock().clone()
    }
}

impl std::fmt::Debug for ScriptedTextModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScriptedTextModel")
            .field("calls", &self.calls.lock().len())
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl TextModel for ScriptedTextModel {
    async fn complete(&self, request: ChatRequest) -> Result<Completion, LlmError> {
        self.calls.lock().push(request.clone());
        let content = (self.script)(&request)?;
        let usage = match self.usage {
            Some((input, output)) => GenUsage::new(input, output, request.model.clone()),
            None => GenUsage::model_only(request.model.clone()),
        };
        Ok(Completion::new(content, usage))
    }
}

/// Image model returning a fixed payload or failing, recording prompts
#[derive(Debug, Default)]
pub struct FakeImageModel {
    payload: Option<String>,
    prompts: Mutex<Vec<String>>,
}

impl FakeImageModel {
    pub fn returning(base64: impl Into<String>) -> Self {
        Self {
            payload: Some(base64.into()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn failing() -> Self {
        Self::default()
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().clone()
    }
}

#[async_trait]
impl ImageModel for FakeImageModel {
    async fn generate_image(&self, request: ImageRequest) -> Result<Option<String>, LlmError> {
        self.prompts.lock().push(request.prompt);
        match &self.payload {
            Some(payload) => Ok(Some(payload.clone())),
            None => Err(LlmError::EmptyResponse),
        }
    }
}

/// Well-formed plan reply with three sections
pub fn sample_plan_json() -> Value {
    json!({
        "summary": "A listening bar for deep-sea whales",
        "slogan": "SonarLounge",
        "vibe": "bioluminescent calm",
        "motif": "sonar ripples",
        "palette": {
            "name": "Abyss",
            "background": "#020617",
            "surface": "#0f172a",
            "primary": "#38bdf8",
            "secondary": "#6366f1",
            "accent": "#f472b6",
            "text": "#e2e8f0"
        },
        "sections": [
            {"id": "hero", "title": "Dive In", "purpose": "Welcome", "features": ["Headline"], "interactive": ["Ripple on hover"]},
            {"id": "menu", "title": "Menu", "purpose": "Show drinks", "features": ["Cards"], "interactive": ["Flip cards"]},
            {"id": "visit", "title": "Visit", "purpose": "Directions", "features": ["Map"], "interactive": ["Depth gauge"]}
        ],
        "includeHeader": true,
        "layoutStyle": "stacked"
    })
}

/// Normalised plan with `n` sections after the hero's position
pub fn plan_with_sections(n: usize) -> SitePlan {
    let sections: Vec<Value> = (0..n)
        .map(|i| json!({"title": format!("Part {i}"), "purpose": format!("Purpose {i}")}))
        .collect();
    let raw = RawSitePlan::from_value(&json!({
        "summary": "Fixture site",
        "slogan": "Fixture",
        "sections": sections,
    }));
    let mut plan = ensure_plan(raw, "fixture-seed");
    plan.include_header = Some(true);
    plan.layout_style = Some("stacked".to_string());
    plan
}

/// Position of the section a section-render request asks for
///
/// `None` for any request whose user message is not a section brief.
pub fn section_index(request: &ChatRequest) -> Option<usize> {
    let prompt = request.user_prompt()?;
    let brief = prompt.split_once("\n\n").map_or(prompt, |(head, _)| head);
    let value: Value = serde_json::from_str(brief).ok()?;
    value
        .get("position")?
        .get("index")?
        .as_u64()
        .and_then(|i| usize::try_from(i).ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixture_plan_has_requested_sections() {
        let plan = plan_with_sections(4);
        assert_eq!(plan.sections.len(), 4);
        assert_eq!(plan.sections[0].id, "hero");
    }

    #[test]
    fn section_index_ignores_other_prompts() {
        let section = ChatRequest::new("m").user("{\"position\": {\"index\": 2, \"total\": 3}}\n\nGo!");
        assert_eq!(section_index(&section), Some(2));
        let plan = ChatRequest::new("m").user("Seed: abc");
        assert_eq!(section_index(&plan), None);
    }
}
