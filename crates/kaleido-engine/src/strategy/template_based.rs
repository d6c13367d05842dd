//! The model writes copy; hand-authored templates provide the markup
//!
//! Templates use `{{key}}` placeholders, replaced with HTML-escaped values,
//! and one `{{#list}}…{{/list}}` block repeated per item. Inside the block
//! `{{#even}}…{{/even}}` is kept only for every second item.

use super::{complete_json, palette_vars, GeneratedSite, GenerationStrategy, StrategyKind};
use crate::error::EngineError;
use crate::options::GenerationOptions;
use crate::prompts;
use async_trait::async_trait;
use kaleido_core::{
    ensure_plan, escape_html, post_process, RawSitePlan, SitePlan, SiteSectionPlan,
    DEFAULT_FEATURES, DEFAULT_INTERACTIVE, HERO_ID,
};
use kaleido_llm::{ChatRequest, TextModel};
use once_cell::sync::Lazy;
use rand::seq::SliceRandom;
use regex::{Captures, Regex};
use serde_json::{Map, Value};
use std::sync::Arc;

const LAYOUT: &str = "template-based";

/// Most feature items rendered
const MAX_FEATURES: usize = 6;

static LIST_BLOCK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)\{\{#list\}\}(.*?)\{\{/list\}\}").expect("valid list regex"));
static EVEN_BLOCK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)\{\{#even\}\}(.*?)\{\{/even\}\}").expect("valid even regex"));
static PLACEHOLDER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{\{\s*([A-Za-z0-9_]+)\s*\}\}").expect("valid placeholder regex"));

const HERO_TEMPLATES: [&str; 2] = [
    // full-bleed gradient
    r#"<div class="relative min-h-screen flex items-center justify-center overflow-hidden">
  <div class="absolute inset-0 bg-gradient-to-br from-[var(--color-primary)] via-[var(--color-secondary)] to-[var(--color-accent)] opacity-20"></div>
  <div class="relative z-10 text-center px-4 max-w-4xl mx-auto">
    <h1 class="text-5xl md:text-7xl font-bold mb-6 bg-clip-text text-transparent bg-gradient-to-r from-[var(--color-primary)] to-[var(--color-accent)]">{{title}}</h1>
    <p class="text-xl md:text-2xl mb-8 text-white/80">{{subtitle}}</p>
    <div class="flex gap-4 justify-center flex-wrap">
      <button class="px-8 py-3 bg-[var(--color-primary)] hover:bg-[var(--color-primary)]/80 rounded-lg font-semibold transition-all hover:scale-105">{{cta1}}</button>
      <button class="px-8 py-3 bg-white/10 hover:bg-white/20 backdrop-blur-sm rounded-lg font-semibold transition-all hover:scale-105">{{cta2}}</button>
    </div>
  </div>
</div>"#,
    // split
    r#"<div class="min-h-screen grid md:grid-cols-2 gap-0">
  <div class="flex items-center justify-center p-12 bg-gradient-to-br from-[var(--color-surface)] to-[var(--color-bg)]">
    <div class="max-w-lg">
      <h1 class="text-4xl md:text-6xl font-bold mb-6">{{title}}</h1>
      <p class="text-lg mb-8 text-white/70">{{subtitle}}</p>
      <button class="px-6 py-3 bg-[var(--color-primary)] rounded-lg font-semibold hover:scale-105 transition-transform">{{cta1}}</button>
    </div>
  </div>
  <div class="bg-gradient-to-br from-[var(--color-primary)]/20 to-[var(--color-accent)]/20 flex items-center justify-center p-12">
    <div class="w-full h-full min-h-[400px] rounded-2xl bg-white/5 backdrop-blur-lg"></div>
  </div>
</div>"#,
];

const FEATURE_TEMPLATES: [&str; 2] = [
    // grid
    r#"<div class="py-20 px-4">
  <div class="max-w-6xl mx-auto">
    <h2 class="text-4xl font-bold text-center mb-16">{{heading}}</h2>
    <div class="grid md:grid-cols-3 gap-8">
      {{#list}}
      <div class="p-8 rounded-2xl bg-white/5 backdrop-blur-sm border border-white/10 hover:bg-white/10 transition-all hover:-translate-y-2">
        <div class="text-4xl mb-4">{{icon}}</div>
        <h3 class="text-xl font-bold mb-3">{{title}}</h3>
        <p class="text-white/70">{{description}}</p>
      </div>
      {{/list}}
    </div>
  </div>
</div>"#,
    // alternating rows
    r#"<div class="py-20 px-4">
  <div class="max-w-5xl mx-auto space-y-24">
    <h2 class="text-4xl font-bold text-center">{{heading}}</h2>
    {{#list}}
    <div class="grid md:grid-cols-2 gap-12 items-center {{#even}}md:flex-row-reverse{{/even}}">
      <div>
        <h3 class="text-3xl font-bold mb-4">{{icon}} {{title}}</h3>
        <p class="text-lg text-white/70">{{description}}</p>
      </div>
      <div class="h-64 rounded-2xl bg-gradient-to-br from-[var(--color-primary)]/20 to-[var(--color-accent)]/20"></div>
    </div>
    {{/list}}
  </div>
</div>"#,
];

const CTA_TEMPLATE: &str = r#"<div class="py-32 px-4">
  <div class="max-w-4xl mx-auto text-center">
    <h2 class="text-5xl font-bold mb-6">{{heading}}</h2>
    <p class="text-xl text-white/70 mb-8">{{subheading}}</p>
    <button class="px-12 py-4 bg-[var(--color-primary)] rounded-full font-bold text-lg hover:scale-105 transition-transform shadow-lg shadow-[var(--color-primary)]/30">{{cta}}</button>
  </div>
</div>"#;

fn scalar_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        _ => String::new(),
    }
}

/// Replace `{{key}}` placeholders; unknown keys become empty
fn substitute(text: &str, data: &Map<String, Value>) -> String {
    PLACEHOLDER
        .replace_all(text, |caps: &Captures<'_>| {
            data.get(&caps[1])
                .map(|v| escape_html(&scalar_text(v)))
                .unwrap_or_default()
        })
        .into_owned()
}

/// Fill a template with `data`, repeating the list block once per item
#[must_use]
pub fn render_template(template: &str, data: &Map<String, Value>, items: &[Map<String, Value>]) -> String {
    let mut out = String::with_capacity(template.len() * 2);
    let mut last = 0;
    for caps in LIST_BLOCK.captures_iter(template) {
        let (Some(whole), Some(body)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        out.push_str(&substitute(&EVEN_BLOCK.replace_all(&template[last..whole.start()], ""), data));
        for (i, item) in items.iter().enumerate() {
            let even = (i + 1) % 2 == 0;
            let body = EVEN_BLOCK.replace_all(body.as_str(), |e: &Captures<'_>| {
                if even { e[1].to_string() } else { String::new() }
            });
            out.push_str(&substitute(&body, item));
        }
        last = whole.end();
    }
    out.push_str(&substitute(&EVEN_BLOCK.replace_all(&template[last..], ""), data));
    out
}

fn object(reply: &Value, key: &str) -> Map<String, Value> {
    reply
        .get(key)
        .and_then(Value::as_object)
        .cloned()
        .unwrap_or_default()
}

fn feature_items(features: &Map<String, Value>) -> Vec<Map<String, Value>> {
    features
        .get("items")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_object)
                .take(MAX_FEATURES)
                .cloned()
                .collect()
        })
        .unwrap_or_default()
}

fn fixed_section(id: &str, title: &str, purpose: &str) -> SiteSectionPlan {
    SiteSectionPlan {
        id: id.to_string(),
        title: title.to_string(),
        purpose: purpose.to_string(),
        features: DEFAULT_FEATURES.iter().map(ToString::to_string).collect(),
        interactive: DEFAULT_INTERACTIVE.iter().map(ToString::to_string).collect(),
    }
}

fn page(plan: &SitePlan, hero: &str, features: &str, cta: &str) -> String {
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
  </style>
</head>
<body>
  <section id=\"hero\">{hero}</section>
  <section id=\"features\">{features}</section>
  <section id=\"cta\">{cta}</section>
  <footer class=\"py-12 text-center text-white/50 text-sm\">
    <p>{summary}</p>
  </footer>
</body>
</html>",
        title = escape_html(&plan.slogan),
        vars = palette_vars(&plan.palette),
        summary = escape_html(&plan.summary),
    )
}

/// Template-based pipeline
#[derive(Clone)]
pub struct TemplateBasedStrategy {
    model: Arc<dyn TextModel>,
}

impl TemplateBasedStrategy {
    #[must_use]
    pub fn new(model: Arc<dyn TextModel>) -> Self {
        Self { model }
    }
}

impl std::fmt::Debug for TemplateBasedStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("TemplateBasedStrategy")
    }
}

#[async_trait]
impl GenerationStrategy for TemplateBasedStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::TemplateBased
    }

    async fn generate(
        &self,
        seed: &str,
        hint: Option<&str>,
        options: &GenerationOptions,
    ) -> Result<GeneratedSite, EngineError> {
        let request = ChatRequest::new(&options.plan_model)
            .system(prompts::TEMPLATE_PROMPT)
            .user(prompts::template_user_prompt(seed, hint))
            .with_temperature(1.4)
            .with_max_tokens(2000)
            .json_object();

        let (reply, usage) = complete_json(self.model.as_ref(), request).await?;

        let raw_plan = reply.get("plan").map(RawSitePlan::from_value).unwrap_or_default();
        let mut plan = ensure_plan(raw_plan, seed);
        plan.sections = vec![
            fixed_section(HERO_ID, "Home", "Landing"),
            fixed_section("features", "Features", "Showcase"),
            fixed_section("cta", "Get Started", "Convert"),
        ];
        plan.include_header = Some(false);
        plan.layout_style = Some(LAYOUT.to_string());

        let (hero_template, feature_template) = {
            let mut rng = rand::thread_rng();
            (
                HERO_TEMPLATES.choose(&mut rng).copied().unwrap_or(HERO_TEMPLATES[0]),
                FEATURE_TEMPLATES.choose(&mut rng).copied().unwrap_or(FEATURE_TEMPLATES[0]),
            )
        };

        let features = object(&reply, "features");
        let hero_html = render_template(hero_template, &object(&reply, "hero"), &[]);
        let feature_html = render_template(feature_template, &features, &feature_items(&features));
        let cta_html = render_template(CTA_TEMPLATE, &object(&reply, "cta"), &[]);

        let html = page(&plan, &hero_html, &feature_html, &cta_html);
        Ok(GeneratedSite {
            html: post_process(&html, &options.post_process()),
            plan,
            usage,
            image_src: None,
            strategy: StrategyKind::TemplateBased,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kaleido_test_utils::ScriptedTextModel;
    use serde_json::json;

    fn map(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn placeholders_are_escaped_and_unknown_ones_removed() {
        let out = render_template(
            "<h1>{{title}}</h1><p>{{missing}}</p><i>{{ count }}</i>",
            &map(json!({"title": "<Fish & Chips>", "count": 3})),
            &[],
        );
        assert_eq!(out, "<h1>&lt;Fish &amp; Chips&gt;</h1><p></p><i>3</i>");
    }

    #[test]
    fn list_block_repeats_with_even_flag() {
        let items = vec![
            map(json!({"title": "A"})),
            map(json!({"title": "B"})),
            map(json!({"title": "C"})),
        ];
        let out = render_template(
            "<h2>{{heading}}</h2>{{#list}}<li class=\"{{#even}}rev{{/even}}\">{{title}}</li>{{/list}}",
            &map(json!({"heading": "Why"})),
            &items,
        );
        assert_eq!(
            out,
            "<h2>Why</h2><li class=\"\">A</li><li class=\"rev\">B</li><li class=\"\">C</li>"
        );
    }

    #[test]
    fn item_values_are_not_reinterpreted() {
        let items = vec![map(json!({"title": "{{heading}}"}))];
        let out = render_template("{{#list}}{{title}}{{/list}}", &map(json!({"heading": "X"})), &items);
        assert_eq!(out, "{{heading}}");
    }

    #[test]
    fn every_template_renders_without_leftover_tags() {
        let data = map(json!({"title": "T", "subtitle": "S", "cta1": "Go", "cta2": "More", "heading": "H", "subheading": "SH", "cta": "Now"}));
        let items = vec![map(json!({"icon": "*", "title": "F", "description": "D"})); 2];
        for template in HERO_TEMPLATES.iter().chain(FEATURE_TEMPLATES.iter()).chain([CTA_TEMPLATE].iter()) {
            let out = render_template(template, &data, &items);
            assert!(!out.contains("{{"), "leftover tag in {out}");
        }
    }

    #[tokio::test]
    async fn builds_fixed_three_section_page() {
        let reply = json!({
            "plan": {"summary": "Tea for robots", "slogan": "BoltBrew", "palette": {"primary": "#123456"}},
            "hero": {"title": "Oil up", "subtitle": "Smooth joints", "cta1": "Pour", "cta2": "Sip"},
            "features": {"heading": "Blends", "items": [
                {"icon": "A", "title": "Copper", "description": "Zesty"},
                {"icon": "B", "title": "Chrome", "description": "Shiny"}
            ]},
            "cta": {"heading": "Ready?", "subheading": "Boot up", "cta": "Order"}
        });
        let model = Arc::new(ScriptedTextModel::constant(reply.to_string()).with_usage(50, 400));
        let site = TemplateBasedStrategy::new(model.clone())
            .generate("abc123", Some("steampunk"), &GenerationOptions::new())
            .await
            .unwrap();

        let ids: Vec<&str> = site.plan.sections.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["hero", "features", "cta"]);
        for section in &site.plan.sections {
            assert!(!section.features.is_empty(), "{} has no features", section.id);
            assert!(!section.interactive.is_empty(), "{} has no interactions", section.id);
        }
        assert_eq!(site.plan.include_header, Some(false));
        assert_eq!(site.plan.layout_style.as_deref(), Some("template-based"));
        assert_eq!(site.plan.palette.primary, "#123456");
        for text in ["Oil up", "Copper", "Chrome", "Order", "Tea for robots", "--color-primary: #123456"] {
            assert!(site.html.contains(text), "{text} missing");
        }
        assert_eq!(site.usage.input_tokens, 50);

        let call = &model.calls()[0];
        assert_eq!(call.temperature, Some(1.4));
        assert_eq!(call.max_tokens, Some(2000));
        assert!(call.user_prompt().unwrap().contains("steampunk"));
    }
}
