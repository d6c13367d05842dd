//! Section rendering: one model call per planned section, all in flight at once
//!
//! A failed or empty section is dropped with a warning; it never aborts the
//! batch. Results keep plan order.

use crate::error::EngineError;
use crate::prompts;
use crate::settings::Settings;
use futures::future::join_all;
use kaleido_core::{normalize_fenced_html, GenUsage, SitePalette, SitePlan, SiteSectionPlan, SizeHint};
use kaleido_llm::{ChatRequest, TextModel};
use serde::Serialize;
use std::sync::Arc;

/// Smallest per-section token budget
pub const MIN_SECTION_BUDGET: u32 = 600;

/// Headroom added to every section's share of the size budget
const SECTION_HEADROOM: u32 = 300;

/// Token budget of each section when `sections` share `size`
///
/// `max(600, round(size_tokens / max(n, 1)) + 300)`
#[must_use]
pub fn section_budget(size: SizeHint, sections: usize) -> u32 {
    let total = size.token_budget();
    let n = u32::try_from(sections.max(1)).unwrap_or(u32::MAX);
    let share = (total + n / 2) / n;
    (share + SECTION_HEADROOM).max(MIN_SECTION_BUDGET)
}

/// HTML fragment for one section
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedSection {
    /// Position in the plan
    pub index: usize,
    /// Section id from the plan
    pub id: String,
    pub html: String,
    pub usage: GenUsage,
}

/// Outcome of rendering every section of a plan
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RenderedBatch {
    /// Non-empty fragments in plan order
    pub sections: Vec<RenderedSection>,
    /// Combined usage of every call that answered
    pub usage: GenUsage,
    /// Sections that failed or came back empty
    pub dropped: usize,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SectionBrief<'a> {
    summary: &'a str,
    slogan: &'a str,
    palette: &'a SitePalette,
    vibe: &'a str,
    motif: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    layout_style: Option<&'a str>,
    section: &'a SiteSectionPlan,
    position: Position,
    hints: Vec<String>,
}

#[derive(Serialize)]
struct Position {
    index: usize,
    total: usize,
}

/// User message for one section
fn section_user_prompt(plan: &SitePlan, section: &SiteSectionPlan, index: usize, total: usize) -> String {
    let hints = if index == 0 {
        vec![prompts::hero_hint()]
    } else {
        vec![prompts::CONTINUATION_HINT.to_string()]
    };
    let brief = SectionBrief {
        summary: &plan.summary,
        slogan: &plan.slogan,
        palette: &plan.palette,
        vibe: &plan.vibe,
        motif: &plan.motif,
        layout_style: plan.layout_style.as_deref(),
        section,
        position: Position { index, total },
        hints,
    };
    let body = serde_json::to_string_pretty(&brief).unwrap_or_default();
    format!("{body}\n\n{}", prompts::SECTION_CLOSING)
}

/// Section renderer
#[derive(Clone)]
pub struct SectionRenderer {
    model: Arc<dyn TextModel>,
    settings: Settings,
}

impl SectionRenderer {
    #[must_use]
    pub fn new(model: Arc<dyn TextModel>, settings: Settings) -> Self {
        Self { model, settings }
    }

    async fn system_prompt(&self) -> String {
        match self.settings.section_prompt().await {
            Ok(Some(custom)) => custom,
            Ok(None) => prompts::SECTION_PROMPT.to_string(),
            Err(e) => {
                tracing::warn!("could not read section prompt, using built-in: {e}");
                prompts::SECTION_PROMPT.to_string()
            }
        }
    }

    /// Render one section
    ///
    /// # Errors
    /// Propagates the model failure; [`render_all`](Self::render_all) absorbs it.
    pub async fn render(
        &self,
        plan: &SitePlan,
        section: &SiteSectionPlan,
        index: usize,
        total: usize,
        token_budget: u32,
        model_name: &str,
    ) -> Result<RenderedSection, EngineError> {
        let system = self.system_prompt().await;
        self.render_with(&system, plan, section, index, total, token_budget, model_name)
            .await
    }

    #[allow(clippy::too_many_arguments)]
    async fn render_with(
        &self,
        system: &str,
        plan: &SitePlan,
        section: &SiteSectionPlan,
        index: usize,
        total: usize,
        token_budget: u32,
        model_name: &str,
    ) -> Result<RenderedSection, EngineError> {
        let request = ChatRequest::new(model_name)
            .system(system)
            .user(section_user_prompt(plan, section, index, total))
            .with_temperature(1.1)
            .with_max_tokens(token_budget);

        let completion = self.model.complete(request).await?;
        Ok(RenderedSection {
            index,
            id: section.id.clone(),
            html: normalize_fenced_html(&completion.content),
            usage: completion.usage,
        })
    }

    /// Render every section of `plan` concurrently
    pub async fn render_all(&self, plan: &SitePlan, size: SizeHint, model_name: &str) -> RenderedBatch {
        let total = plan.sections.len();
        let budget = section_budget(size, total);
        let system = self.system_prompt().await;
        tracing::debug!(sections = total, budget, model = model_name, "rendering sections");

        let calls = plan.sections.iter().enumerate().map(|(index, section)| {
            self.render_with(&system, plan, section, index, total, budget, model_name)
        });
        let results = join_all(calls).await;

        let mut batch = RenderedBatch::default();
        let mut usages = Vec::with_capacity(total);
        for (index, result) in results.into_iter().enumerate() {
            match result {
                Ok(rendered) => {
                    usages.push(rendered.usage.clone());
                    if rendered.html.is_empty() {
                        tracing::warn!(index, id = %rendered.id, "section came back empty, skipping");
                        batch.dropped += 1;
                    } else {
                        batch.sections.push(rendered);
                    }
                }
                Err(e) => {
                    tracing::warn!(index, id = %plan.sections[index].id, "section failed, skipping: {e}");
                    batch.dropped += 1;
                }
            }
        }
        batch.usage = GenUsage::combine(&usages);
        batch
    }
}

impl std::fmt::Debug for SectionRenderer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SectionRenderer").finish_non_exhaustive()
    }
}
