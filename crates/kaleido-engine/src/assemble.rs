//! Document assembly: stitches fragments into one themed page

use crate::options::GenerationOptions;
use crate::prompts;
use crate::section::RenderedSection;
use crate::strategy::palette_vars;
use kaleido_core::{ensure_image, escape_html, post_process, SitePalette, SitePlan};
use kaleido_llm::{ImageModel, ImageRequest};
use std::sync::Arc;

const BASE_LAYOUT_CSS: &str = r"* { box-sizing: border-box; }
html, body { height: 100%; }
a { color: inherit; }
.skip-link {
  position: absolute;
  left: -999px;
  top: auto;
  width: 1px;
  height: 1px;
  overflow: hidden;
}
.skip-link:focus {
  left: 16px;
  top: 16px;
  width: auto;
  height: auto;
  padding: 12px 18px;
  border-radius: 999px;
  background: var(--color-primary);
  color: #fff;
  z-index: 9999;
}
header.site-header {
  position: sticky;
  top: 0;
  z-index: 20;
  backdrop-filter: blur(18px);
  background: rgba(11,11,16,0.7);
  border-bottom: 1px solid rgba(255,255,255,0.08);
}
.header-inner {
  max-width: 1200px;
  margin: 0 auto;
  padding: 18px 24px;
  display: flex;
  align-items: center;
  justify-content: space-between;
  gap: 18px;
}
.brand {
  font-size: clamp(1rem, 2vw, 1.4rem);
  font-weight: 700;
  letter-spacing: 0.05em;
  text-transform: uppercase;
  white-space: nowrap;
  overflow: hidden;
  text-overflow: ellipsis;
  max-width: 280px;
  flex-shrink: 0;
}
nav.site-nav {
  display: flex;
  gap: 12px;
  flex-wrap: nowrap;
  overflow-x: auto;
  overflow-y: hidden;
  scrollbar-width: thin;
  scrollbar-color: rgba(255,255,255,0.3) transparent;
  -webkit-overflow-scrolling: touch;
  padding: 4px 0;
  max-width: 100%;
}
nav.site-nav::-webkit-scrollbar { height: 6px; }
nav.site-nav::-webkit-scrollbar-thumb {
  background: rgba(255,255,255,0.3);
  border-radius: 3px;
}
.nav-link {
  padding: 8px 14px;
  border-radius: 999px;
  border: 1px solid rgba(255,255,255,0.18);
  background: rgba(255,255,255,0.06);
  text-decoration: none;
  font-size: 0.85rem;
  transition: transform 0.2s ease, background 0.2s ease, color 0.2s ease;
  white-space: nowrap;
  flex-shrink: 0;
}
.nav-link:hover,
.nav-link:focus-visible {
  transform: translateY(-2px);
  background: var(--color-primary);
  color: #fff;
}
main#main {
  max-width: 1100px;
  margin: 0 auto;
  padding: 36px 24px 120px;
}
.section-block {
  margin: 72px 0;
  padding: 48px clamp(18px,4vw,42px);
  border-radius: 32px;
  background: rgba(12,12,24,0.55);
  border: 1px solid rgba(255,255,255,0.08);
  box-shadow: 0 25px 55px rgba(0,0,0,0.35);
}
.section-inner {
  max-width: 840px;
  margin: 0 auto;
  display: grid;
  gap: 24px;
}
footer.site-footer {
  padding: 48px 24px 64px;
  text-align: center;
  background: rgba(10,10,18,0.65);
  border-top: 1px solid rgba(255,255,255,0.08);
}
@media (max-width: 640px) {
  .header-inner { flex-direction: column; align-items: flex-start; }
  nav.site-nav { width: 100%; gap: 12px; }
  .nav-link { flex: 1 1 auto; text-align: center; }
  .section-block { margin: 48px 0; padding: 36px 18px; border-radius: 24px; }
}";

/// Page stylesheet for a palette: custom properties plus the base layout rules
#[must_use]
pub fn build_css(palette: &SitePalette) -> String {
    format!(
        "{vars}\n{layout}\nbody {{\n  margin: 0;\n  font-family: 'Inter', 'Segoe UI', system-ui, sans-serif;\n  background: radial-gradient(circle at 10% 20%, {surface} 0%, transparent 55%), radial-gradient(circle at 90% 10%, rgba(255,255,255,0.08) 0%, transparent 55%), var(--color-bg);\n  color: var(--color-text);\n  line-height: 1.65;\n}}\n",
        vars = palette_vars(palette),
        layout = BASE_LAYOUT_CSS,
        surface = palette.surface,
    )
}

fn header_html(plan: &SitePlan) -> String {
    let nav = plan
        .sections
        .iter()
        .map(|s| {
            format!(
                "<a class=\"nav-link\" href=\"#{}\">{}</a>",
                escape_html(&s.id),
                escape_html(&s.title)
            )
        })
        .collect::<Vec<_>>()
        .join("\n        ");
    format!(
        "\n  <header class=\"site-header\" role=\"banner\">\n    <div class=\"header-inner\">\n      <div class=\"brand\">{slogan}</div>\n      <nav class=\"site-nav\" aria-label=\"Primary\">\n        {nav}\n      </nav>\n    </div>\n  </header>",
        slogan = escape_html(&plan.slogan),
    )
}

/// Wrap a fragment in its section container
#[must_use]
pub fn section_block(id: &str, html: &str) -> String {
    let id = escape_html(id);
    format!(
        "<section id=\"{id}\" class=\"section-block\" aria-labelledby=\"heading-{id}\">\n  <div class=\"section-inner\">\n    {html}\n  </div>\n</section>"
    )
}

/// Document assembler
#[derive(Clone)]
pub struct DocumentAssembler {
    images: Arc<dyn ImageModel>,
}

impl DocumentAssembler {
    #[must_use]
    pub fn new(images: Arc<dyn ImageModel>) -> Self {
        Self { images }
    }

    /// Stitch fragments into a full document, splice the image and post-process
    #[must_use]
    pub fn assemble(
        plan: &SitePlan,
        sections: &[RenderedSection],
        image_src: Option<&str>,
        options: &GenerationOptions,
    ) -> String {
        let (header, top_padding) = if plan.shows_header() {
            (header_html(plan), "36px")
        } else {
            (String::new(), "72px")
        };

        let mut blocks = String::new();
        for section in sections.iter().filter(|s| !s.html.trim().is_empty()) {
            if !blocks.is_empty() {
                blocks.push('\n');
            }
            blocks.push_str(&section_block(&section.id, &section.html));
        }

        let document = format!(
            "<!doctype html>\n<html lang=\"en\">\n<head>\n  <meta charset=\"utf-8\" />\n  <meta name=\"viewport\" content=\"width=device-width, initial-scale=1\" />\n  <title>{title}</title>\n  <style>{css}</style>\n</head>\n<body>\n  <a class=\"skip-link\" href=\"#main\">Skip to content</a>{header}\n  <main id=\"main\" tabindex=\"-1\" style=\"padding-top: {top_padding};\">\n    {blocks}\n  </main>\n  <footer class=\"site-footer\">\n    <p>{summary}</p>\n    <small>Seed: {seed} | Layout: {layout}</small>\n  </footer>\n</body>\n</html>",
            title = escape_html(&plan.slogan),
            css = build_css(&plan.palette),
            summary = escape_html(&plan.summary),
            seed = escape_html(&plan.seed),
            layout = escape_html(plan.layout_label()),
        );

        let with_image = ensure_image(&document, image_src);
        post_process(&with_image, &options.post_process())
    }

    /// Generate the hero image and return it as a data URI
    ///
    /// Any failure, or a model that has nothing, yields `None`.
    pub async fn generate_image(&self, plan: &SitePlan, prompt_override: Option<&str>) -> Option<String> {
        let prompt = prompt_override
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map_or_else(|| prompts::image_prompt(plan), str::to_owned);

        match self.images.generate_image(ImageRequest::new(prompt)).await {
            Ok(Some(base64)) if !base64.is_empty() => {
                tracing::info!(bytes = base64.len(), "hero image generated");
                Some(format!("data:image/png;base64,{base64}"))
            }
            Ok(_) => {
                tracing::warn!("image model returned no data");
                None
            }
            Err(e) => {
                tracing::warn!("image generation failed: {e}");
                None
            }
        }
    }
}

impl std::fmt::Debug for DocumentAssembler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocumentAssembler").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kaleido_core::{GenUsage, IMAGE_MARKER_ID, IMAGE_SLOT};
    use kaleido_llm::NoImageModel;
    use kaleido_test_utils::{plan_with_sections, FakeImageModel};

    fn rendered(plan: &SitePlan, index: usize, html: &str) -> RenderedSection {
        RenderedSection {
            index,
            id: plan.sections[index].id.clone(),
            html: html.to_string(),
            usage: GenUsage::zero(),
        }
    }

    fn bare() -> GenerationOptions {
        GenerationOptions::new().with_site_id("abc123").with_controls(false)
    }

    #[test]
    fn css_declares_palette_variables() {
        let plan = plan_with_sections(1);
        let css = build_css(&plan.palette);
        assert!(css.contains(&format!("--color-bg: {};", plan.palette.background)));
        assert!(css.contains("main#main"));
        assert!(css.contains("@media (max-width: 640px)"));
    }

    #[test]
    fn sections_are_wrapped_in_plan_order() {
        let plan = plan_with_sections(3);
        let sections = vec![rendered(&plan, 0, "<h1>A</h1>"), rendered(&plan, 2, "<h2>C</h2>")];
        let html = DocumentAssembler::assemble(&plan, &sections, None, &bare());

        assert_eq!(html.matches("class=\"section-block\"").count(), 2);
        let a = html.find("<h1>A</h1>").unwrap();
        let c = html.find("<h2>C</h2>").unwrap();
        assert!(a < c);
        assert!(html.contains("<section id=\"hero\" class=\"section-block\" aria-labelledby=\"heading-hero\">"));
        assert!(html.contains("Seed: "));
        assert!(html.starts_with("<!doctype html>"));
        assert!(html.trim_end().ends_with("</html>"));
    }

    #[test]
    fn header_follows_include_header() {
        let mut plan = plan_with_sections(2);
        let with_header = DocumentAssembler::assemble(&plan, &[], None, &bare());
        assert!(with_header.contains("<header class=\"site-header\""));
        assert!(with_header.contains("padding-top: 36px;"));
        assert!(with_header.contains(&format!("href=\"#{}\"", plan.sections[1].id)));

        plan.include_header = Some(false);
        let without = DocumentAssembler::assemble(&plan, &[], None, &bare());
        assert!(!without.contains("<header class=\"site-header\""));
        assert!(without.contains("padding-top: 72px;"));
    }

    #[test]
    fn skeleton_escapes_plan_text() {
        let mut plan = plan_with_sections(1);
        plan.slogan = "Fish & <Chips>".to_string();
        plan.summary = "\"Quoted\" summary".to_string();
        let html = DocumentAssembler::assemble(&plan, &[], None, &bare());
        assert!(html.contains("<title>Fish &amp; &lt;Chips&gt;</title>"));
        assert!(html.contains("<p>&quot;Quoted&quot; summary</p>"));
        assert!(html.contains("<a class=\"skip-link\" href=\"#main\">Skip to content</a>"));
    }

    #[test]
    fn footer_defaults_layout_label() {
        let mut plan = plan_with_sections(1);
        plan.layout_style = None;
        let html = DocumentAssembler::assemble(&plan, &[], None, &bare());
        assert!(html.contains(&format!("Seed: {} | Layout: default", plan.seed)));
    }

    #[test]
    fn image_lands_in_the_slot() {
        let plan = plan_with_sections(2);
        let hero = format!("<h1>Hi</h1>{IMAGE_SLOT}");
        let sections = vec![rendered(&plan, 0, &hero)];
        let html = DocumentAssembler::assemble(&plan, &sections, Some("data:image/png;base64,AAA"), &bare());
        assert!(!html.contains(IMAGE_SLOT));
        assert_eq!(html.matches(IMAGE_MARKER_ID).count(), 1);
        assert!(html.find("<h1>Hi</h1>").unwrap() < html.find(IMAGE_MARKER_ID).unwrap());
    }

    #[tokio::test]
    async fn image_generation_returns_data_uri() {
        let assembler = DocumentAssembler::new(Arc::new(FakeImageModel::returning("QUJD")));
        let plan = plan_with_sections(1);
        let src = assembler.generate_image(&plan, None).await;
        assert_eq!(src.as_deref(), Some("data:image/png;base64,QUJD"));
    }

    #[tokio::test]
    async fn image_failures_are_swallowed() {
        let plan = plan_with_sections(1);
        let failing = DocumentAssembler::new(Arc::new(FakeImageModel::failing()));
        assert!(failing.generate_image(&plan, None).await.is_none());
        let absent = DocumentAssembler::new(Arc::new(NoImageModel));
        assert!(absent.generate_image(&plan, Some("custom")).await.is_none());
    }

    #[tokio::test]
    async fn image_prompt_override_is_used() {
        let model = Arc::new(FakeImageModel::returning("QUJD"));
        let assembler = DocumentAssembler::new(model.clone());
        let plan = plan_with_sections(1);
        assembler.generate_image(&plan, Some("a red fox")).await;
        assert_eq!(model.prompts(), vec!["a red fox".to_string()]);
    }
}
