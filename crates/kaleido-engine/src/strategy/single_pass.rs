//! One call returns the plan and the complete document

use super::{complete_json, GeneratedSite, GenerationStrategy, StrategyKind};
use crate::error::EngineError;
use crate::options::GenerationOptions;
use crate::prompts;
use async_trait::async_trait;
use kaleido_core::{ensure_plan, minimal_html, normalize_fenced_html, post_process, RawSitePlan};
use kaleido_llm::{ChatRequest, TextModel};
use serde_json::Value;
use std::sync::Arc;

const LAYOUT: &str = "unified";

/// Single-pass pipeline
#[derive(Clone)]
pub struct SinglePassStrategy {
    model: Arc<dyn TextModel>,
}

impl SinglePassStrategy {
    #[must_use]
    pub fn new(model: Arc<dyn TextModel>) -> Self {
        Self { model }
    }
}

impl std::fmt::Debug for SinglePassStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SinglePassStrategy")
    }
}

#[async_trait]
impl GenerationStrategy for SinglePassStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::SinglePass
    }

    async fn generate(
        &self,
        seed: &str,
        hint: Option<&str>,
        options: &GenerationOptions,
    ) -> Result<GeneratedSite, EngineError> {
        let request = ChatRequest::new(&options.plan_model)
            .system(prompts::SINGLE_PASS_PROMPT)
            .user(prompts::single_pass_user_prompt(seed, hint))
            .with_temperature(1.5)
            .with_top_p(0.95)
            .with_penalties(1.0, 0.8)
            .with_max_tokens(4000)
            .json_object();

        let (reply, usage) = complete_json(self.model.as_ref(), request).await?;

        let raw_plan = reply.get("plan").map(RawSitePlan::from_value).unwrap_or_default();
        let mut plan = ensure_plan(raw_plan, seed);
        plan.include_header = Some(plan.include_header != Some(false));
        plan.layout_style.get_or_insert_with(|| LAYOUT.to_string());

        let html = match reply.get("html").and_then(Value::as_str).map(normalize_fenced_html) {
            Some(html) if !html.is_empty() => html,
            _ => {
                tracing::warn!(seed, "single-pass reply had no html, serving fallback page");
                minimal_html(&plan.slogan, "Generation failed")
            }
        };

        Ok(GeneratedSite {
            html: post_process(&html, &options.post_process()),
            plan,
            usage,
            image_src: None,
            strategy: StrategyKind::SinglePass,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kaleido_llm::ResponseFormat;
    use kaleido_test_utils::ScriptedTextModel;
    use serde_json::json;

    #[tokio::test]
    async fn document_and_plan_come_from_one_call() {
        let reply = json!({
            "plan": {
                "slogan": "EchoFlux",
                "palette": {"background": "#000", "primary": "nope"},
                "sections": [{"id": "top", "title": "Top"}, {"id": "more", "title": "More"}]
            },
            "html": "<!doctype html><html><head></head><body><section id=\"hero\">Hi</section></body></html>"
        });
        let model = Arc::new(ScriptedTextModel::constant(reply.to_string()).with_usage(100, 900));
        let strategy = SinglePassStrategy::new(model.clone());
        let site = strategy
            .generate("abc123", None, &GenerationOptions::new().with_site_id("abc123"))
            .await
            .unwrap();

        assert_eq!(site.plan.slogan, "EchoFlux");
        assert_eq!(site.plan.sections[0].id, "hero");
        assert_eq!(site.plan.sections[1].id, "more");
        assert_eq!(site.plan.layout_style.as_deref(), Some("unified"));
        assert_eq!(site.plan.include_header, Some(true));
        assert_eq!(site.usage.output_tokens, 900);
        assert!(site.html.contains("kaleidosite-base"));
        assert!(site.html.contains(">Hi</section>"));

        let call = &model.calls()[0];
        assert_eq!(call.temperature, Some(1.5));
        assert_eq!(call.max_tokens, Some(4000));
        assert_eq!(call.response_format, ResponseFormat::JsonObject);
    }

    #[tokio::test]
    async fn missing_html_serves_fallback_page() {
        let model = Arc::new(ScriptedTextModel::constant(json!({"plan": {"slogan": "Zap"}}).to_string()));
        let site = SinglePassStrategy::new(model)
            .generate("s", None, &GenerationOptions::new())
            .await
            .unwrap();
        assert!(site.html.contains("Generation failed"));
        assert!(site.html.contains("<title>Zap</title>"));
    }
}
