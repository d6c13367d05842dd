//! The model composes sections from a fixed component vocabulary

use super::{complete_json, palette_vars, GeneratedSite, GenerationStrategy, StrategyKind};
use crate::error::EngineError;
use crate::options::GenerationOptions;
use crate::prompts;
use async_trait::async_trait;
use kaleido_core::{ensure_plan, escape_html, normalize_fenced_html, post_process, RawSitePlan, SitePlan};
use kaleido_llm::{ChatRequest, TextModel};
use serde_json::Value;
use std::sync::Arc;

const LAYOUT: &str = "component-library";

const COMPONENT_CSS: &str = "    .btn-primary { @apply px-6 py-3 bg-[var(--color-primary)] rounded-lg font-semibold hover:scale-105 transition-transform; }
    .btn-secondary { @apply px-6 py-3 bg-white/10 backdrop-blur-sm rounded-lg font-semibold hover:scale-105 transition-transform; }
    .card { @apply p-6 rounded-xl bg-white/5 border border-white/10 backdrop-blur-sm hover:bg-white/10 transition-all hover:-translate-y-1; }
    .card-title { @apply text-xl font-bold mb-2; }
    .card-text { @apply text-white/70; }
    .container { @apply max-w-6xl mx-auto px-4; }
    .section { @apply py-20; }
    .grid-2 { @apply grid md:grid-cols-2 gap-6; }
    .grid-3 { @apply grid md:grid-cols-3 gap-6; }
    .grid-4 { @apply grid md:grid-cols-4 gap-6; }
    .heading-1 { @apply text-5xl md:text-6xl font-bold mb-6; }
    .heading-2 { @apply text-4xl font-bold mb-4; }
    .heading-3 { @apply text-2xl font-bold mb-3; }
    .badge { @apply px-3 py-1 bg-[var(--color-primary)]/20 text-[var(--color-primary)] rounded-full text-sm font-medium; }
    .gradient-box { @apply p-12 rounded-2xl bg-gradient-to-br from-[var(--color-primary)]/10 to-[var(--color-accent)]/10 border border-white/10; }
    .animate-on-scroll { @apply opacity-0 translate-y-8 transition-all duration-700; }
    .animate-on-scroll.visible { @apply opacity-100 translate-y-0; }";

const SCROLL_SCRIPT: &str = "  <script>
    const observer = new IntersectionObserver((entries) => {
      entries.forEach(entry => {
        if (entry.isIntersecting) {
          entry.target.classList.add('visible');
        }
      });
    }, { threshold: 0.1 });

    document.querySelectorAll('.animate-on-scroll').forEach(el => observer.observe(el));
  </script>";

/// Wrap each returned fragment, naming it after the planned section at the same position
fn wrap_sections(plan: &SitePlan, fragments: &[(usize, String)]) -> String {
    fragments
        .iter()
        .map(|(i, html)| {
            let id = plan
                .sections
                .get(*i)
                .map_or_else(|| format!("section-{i}"), |s| escape_html(&s.id));
            format!("<section id=\"{id}\">\n{html}\n</section>")
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Non-empty fragments with their position in the reply
fn fragments(reply: &Value) -> Vec<(usize, String)> {
    reply
        .get("sections")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .enumerate()
                .filter_map(|(i, item)| item.as_str().map(|html| (i, normalize_fenced_html(html))))
                .filter(|(_, html)| !html.is_empty())
                .collect()
        })
        .unwrap_or_default()
}

fn page(plan: &SitePlan, sections: &str) -> String {
    format!(
        "<!doctype html>
<html lang=\"en\">
<head>
  <meta charset=\"utf-8\" />
  <meta name=\"viewport\" content=\"width=device-width, initial-scale=1\" />
  <title>{title}</title>
  <script src=\"https://cdn.tailwindcss.com\"></script>
  <style>
    {vars}
    body {{
      margin: 0;
      background: var(--color-bg);
      color: var(--color-text);
      font-family: system-ui, -apple-system, sans-serif;
    }}
{COMPONENT_CSS}
  </style>
</head>
<body>
  {sections}
  <footer class=\"py-12 text-center text-white/50 text-sm\">
    <p>{summary}</p>
  </footer>
{SCROLL_SCRIPT}
</body>
</html>",
        title = escape_html(&plan.slogan),
        vars = palette_vars(&plan.palette),
        summary = escape_html(&plan.summary),
    )
}

/// Component-library pipeline
#[derive(Clone)]
pub struct ComponentLibraryStrategy {
    model: Arc<dyn TextModel>,
}

impl ComponentLibraryStrategy {
    #[must_use]
    pub fn new(model: Arc<dyn TextModel>) -> Self {
        Self { model }
    }
}

impl std::fmt::Debug for ComponentLibraryStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("ComponentLibraryStrategy")
    }
}

#[async_trait]
impl GenerationStrategy for ComponentLibraryStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::ComponentLibrary
    }

    async fn generate(
        &self,
        seed: &str,
        hint: Option<&str>,
        options: &GenerationOptions,
    ) -> Result<GeneratedSite, EngineError> {
        let request = ChatRequest::new(&options.plan_model)
            .system(prompts::component_system_prompt())
            .user(prompts::component_user_prompt(seed, hint))
            .with_temperature(1.3)
            .with_max_tokens(3000)
            .json_object();

        let (reply, usage) = complete_json(self.model.as_ref(), request).await?;

        let raw_plan = reply.get("plan").map(RawSitePlan::from_value).unwrap_or_default();
        let mut plan = ensure_plan(raw_plan, seed);
        plan.include_header = Some(false);
        plan.layout_style = Some(LAYOUT.to_string());

        let fragments = fragments(&reply);
        if fragments.is_empty() {
            tracing::warn!(seed, "component-library reply had no sections");
        }
        let html = page(&plan, &wrap_sections(&plan, &fragments));

        Ok(GeneratedSite {
            html: post_process(&html, &options.post_process()),
            plan,
            usage,
            image_src: None,
            strategy: StrategyKind::ComponentLibrary,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kaleido_test_utils::ScriptedTextModel;
    use serde_json::json;

    #[tokio::test]
    async fn fragments_are_wrapped_with_plan_ids() {
        let reply = json!({
            "plan": {
                "slogan": "GridLock",
                "summary": "Parking for <drones>",
                "sections": [{"id": "hero", "title": "Hero"}, {"id": "pricing", "title": "Pricing"}]
            },
            "sections": [
                "<div class=\"section\"><div class=\"container\"><h1 class=\"heading-1\">Park</h1></div></div>",
                "<div class=\"section\"><div class=\"container\"><span class=\"badge\">$5</span></div></div>",
                "<div class=\"section\"><div class=\"container\">extra</div></div>"
            ]
        });
        let model = Arc::new(ScriptedTextModel::constant(reply.to_string()));
        let site = ComponentLibraryStrategy::new(model.clone())
            .generate("abc123", None, &GenerationOptions::new())
            .await
            .unwrap();

        assert!(site.html.contains("<section id=\"hero\">\n<div class=\"section\">"));
        assert!(site.html.contains("<section id=\"pricing\">"));
        assert!(site.html.contains("<section id=\"section-2\">"));
        assert!(site.html.contains("Parking for &lt;drones&gt;"));
        assert!(site.html.contains(".animate-on-scroll.visible"));
        assert!(site.html.contains("IntersectionObserver"));
        assert_eq!(site.plan.include_header, Some(false));
        assert_eq!(site.plan.layout_style.as_deref(), Some("component-library"));

        let call = &model.calls()[0];
        assert_eq!(call.temperature, Some(1.3));
        assert_eq!(call.max_tokens, Some(3000));
        assert!(call.system_prompt().unwrap().contains("COMPONENT LIBRARY"));
        assert!(call.user_prompt().unwrap().contains("professional"));
    }

    #[tokio::test]
    async fn non_string_sections_are_ignored() {
        let reply = json!({"sections": [42, "", "<p>ok</p>"]});
        let model = Arc::new(ScriptedTextModel::constant(reply.to_string()));
        let site = ComponentLibraryStrategy::new(model)
            .generate("s", Some("playful"), &GenerationOptions::new())
            .await
            .unwrap();
        assert_eq!(site.html.matches("<section id=").count(), 1);
        assert!(site.html.contains("<section id=\"section-2\">\n<p>ok</p>\n</section>"));
    }

    #[tokio::test]
    async fn skipped_fragment_keeps_later_ids_in_place() {
        let reply = json!({
            "plan": {"sections": [{"id": "hero"}, {"id": "menu"}, {"id": "contact"}]},
            "sections": ["<a>first</a>", "", "<p>third</p>"]
        });
        let model = Arc::new(ScriptedTextModel::constant(reply.to_string()));
        let site = ComponentLibraryStrategy::new(model)
            .generate("s", None, &GenerationOptions::new())
            .await
            .unwrap();
        assert!(site.html.contains("<section id=\"hero\">\n<a>first</a>\n</section>"));
        assert!(site.html.contains("<section id=\"contact\">\n<p>third</p>\n</section>"));
        assert!(!site.html.contains("<section id=\"menu\">"));
    }
}
