//! Plan a design system first, then render every section concurrently

use super::{GeneratedSite, GenerationStrategy, StrategyKind};
use crate::assemble::DocumentAssembler;
use crate::error::EngineError;
use crate::options::GenerationOptions;
use crate::plan::PlanGenerator;
use crate::section::SectionRenderer;
use crate::settings::Settings;
use async_trait::async_trait;
use kaleido_llm::{ImageModel, TextModel};
use std::sync::Arc;

/// Design-system pipeline: plan, optional hero image, sections, assembly
#[derive(Clone)]
pub struct DesignSystemStrategy {
    planner: PlanGenerator,
    renderer: SectionRenderer,
    assembler: DocumentAssembler,
}

impl DesignSystemStrategy {
    #[must_use]
    pub fn new(text: Arc<dyn TextModel>, images: Arc<dyn ImageModel>, settings: Settings) -> Self {
        Self {
            planner: PlanGenerator::new(text.clone(), settings.clone()),
            renderer: SectionRenderer::new(text, settings),
            assembler: DocumentAssembler::new(images),
        }
    }
}

impl std::fmt::Debug for DesignSystemStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("DesignSystemStrategy")
    }
}

#[async_trait]
impl GenerationStrategy for DesignSystemStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::DesignSystem
    }

    async fn generate(
        &self,
        seed: &str,
        hint: Option<&str>,
        options: &GenerationOptions,
    ) -> Result<GeneratedSite, EngineError> {
        let outcome = self.planner.create_plan(seed, hint, &options.plan_model).await?;
        let plan = outcome.plan;

        let image_src = if options.include_image {
            self.assembler
                .generate_image(&plan, options.image_prompt.as_deref())
                .await
        } else {
            None
        };

        let batch = self
            .renderer
            .render_all(&plan, options.size_hint, &options.render_model)
            .await;
        if batch.dropped > 0 {
            tracing::warn!(
                dropped = batch.dropped,
                kept = batch.sections.len(),
                "some sections were skipped"
            );
        }

        let mut options = options.clone();
        if options.site_id.is_none() {
            options.site_id = Some(seed.to_string());
        }
        let html = DocumentAssembler::assemble(&plan, &batch.sections, image_src.as_deref(), &options);

        Ok(GeneratedSite {
            usage: outcome.usage.merge(&batch.usage),
            plan,
            html,
            image_src,
            strategy: StrategyKind::DesignSystem,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kaleido_core::IMAGE_MARKER_ID;
    use kaleido_llm::NoImageModel;
    use kaleido_store::MemoryKvStore;
    use kaleido_test_utils::{sample_plan_json, section_index, FakeImageModel, ScriptedTextModel};

    fn scripted() -> Arc<ScriptedTextModel> {
        Arc::new(
            ScriptedTextModel::new(|request| match section_index(request) {
                Some(0) => Ok(format!("<h1>Hero</h1>{}", kaleido_core::IMAGE_SLOT)),
                Some(i) => Ok(format!("<h2>Section {i}</h2>")),
                None => Ok(sample_plan_json().to_string()),
            })
            .with_usage(10, 20),
        )
    }

    fn settings() -> Settings {
        Settings::new(Arc::new(MemoryKvStore::new()))
    }

    #[tokio::test]
    async fn plans_then_renders_every_section() {
        let model = scripted();
        let strategy = DesignSystemStrategy::new(model.clone(), Arc::new(NoImageModel), settings());
        let options = GenerationOptions::new()
            .with_plan_model("planner")
            .with_render_model("renderer");
        let site = strategy.generate("abc123", None, &options).await.unwrap();

        let calls = model.calls();
        assert_eq!(calls.len(), 1 + site.plan.sections.len());
        assert_eq!(calls[0].model, "planner");
        assert!(calls[1..].iter().all(|c| c.model == "renderer"));

        assert!(site.html.contains("<h1>Hero</h1>"));
        let sections = u64::try_from(calls.len()).unwrap();
        assert_eq!(site.usage.input_tokens, 10 * sections);
        assert_eq!(site.usage.output_tokens, 20 * sections);
        assert!(site.image_src.is_none());
        assert!(site.html.contains("abc123"));
    }

    #[tokio::test]
    async fn image_is_generated_only_when_asked() {
        let images = Arc::new(FakeImageModel::returning("QUJD"));
        let strategy = DesignSystemStrategy::new(scripted(), images.clone(), settings());

        let without = strategy.generate("s", None, &GenerationOptions::new()).await.unwrap();
        assert!(images.prompts().is_empty());
        assert!(!without.html.contains(IMAGE_MARKER_ID));

        let with = strategy
            .generate("s", None, &GenerationOptions::new().with_image(true, None))
            .await
            .unwrap();
        assert_eq!(images.prompts().len(), 1);
        assert_eq!(with.image_src.as_deref(), Some("data:image/png;base64,QUJD"));
        assert!(with.html.contains("data:image/png;base64,QUJD"));
    }
}
