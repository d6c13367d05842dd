//! Planning stage: one structured-output call producing a [`SitePlan`]

use crate::error::EngineError;
use crate::prompts;
use crate::settings::Settings;
use kaleido_core::{ensure_plan, normalize_fenced_html, GenUsage, RawSitePlan, SitePlan};
use kaleido_llm::{ChatRequest, TextModel};
use serde_json::Value;
use std::sync::Arc;

/// Plan plus the usage of the call that produced it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanOutcome {
    pub plan: SitePlan,
    pub usage: GenUsage,
}

/// Decode a model reply that should be a JSON document
///
/// An empty reply reads as `{}`; text that is not JSON at all is an error.
pub(crate) fn parse_model_json(content: &str) -> Result<Value, EngineError> {
    let text = normalize_fenced_html(content);
    if text.is_empty() {
        return Ok(Value::Object(serde_json::Map::new()));
    }
    serde_json::from_str(&text).map_err(|e| {
        let preview: String = text.chars().take(120).collect();
        EngineError::MalformedResponse(format!("{e}: {preview}"))
    })
}

/// Plan generator
#[derive(Clone)]
pub struct PlanGenerator {
    model: Arc<dyn TextModel>,
    settings: Settings,
}

impl PlanGenerator {
    #[must_use]
    pub fn new(model: Arc<dyn TextModel>, settings: Settings) -> Self {
        Self { model, settings }
    }

    /// System prompt for the next call: the stored override or the built-in one
    async fn system_prompt(&self) -> String {
        match self.settings.planning_prompt().await {
            Ok(Some(custom)) => custom,
            Ok(None) => prompts::planning_system_prompt(&RawSitePlan::schema_json()),
            Err(e) => {
                tracing::warn!("could not read planning prompt, using built-in: {e}");
                prompts::planning_system_prompt(&RawSitePlan::schema_json())
            }
        }
    }

    /// Ask `model_name` for a plan and normalise whatever comes back
    ///
    /// # Errors
    /// Model failures and replies that are not JSON propagate; any JSON reply
    /// yields a valid plan.
    pub async fn create_plan(
        &self,
        seed: &str,
        hint: Option<&str>,
        model_name: &str,
    ) -> Result<PlanOutcome, EngineError> {
        let request = ChatRequest::new(model_name)
            .system(self.system_prompt().await)
            .user(prompts::planning_user_prompt(seed, hint))
            .with_temperature(1.6)
            .with_top_p(0.95)
            .with_penalties(1.2, 1.0)
            .json_object();

        tracing::debug!(seed, model = model_name, "requesting site plan");
        let completion = self.model.complete(request).await?;
        let value = parse_model_json(&completion.content)?;
        let plan = ensure_plan(RawSitePlan::from_value(&value), seed);
        tracing::info!(
            seed = %plan.seed,
            sections = plan.sections.len(),
            slogan = %plan.slogan,
            "site plan ready"
        );
        Ok(PlanOutcome {
            plan,
            usage: completion.usage,
        })
    }
}

impl std::fmt::Debug for PlanGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlanGenerator").finish_non_exhaustive()
    }
}
