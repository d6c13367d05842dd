//! Generation strategies and the router that picks one per request
//!
//! Four pipelines produce a finished document:
//! - [`SinglePassStrategy`]: one call returns plan and full HTML
//! - [`TemplateBasedStrategy`]: the model fills hand-authored templates
//! - [`ComponentLibraryStrategy`]: the model composes sections from a fixed component set
//! - [`DesignSystemStrategy`]: plan, concurrent sections, assembly
//!
//! [`StrategyRouter`] reads the configured [`StrategyKind`] once per call and
//! dispatches; unknown or missing values select the design-system pipeline.

mod component_library;
mod design_system;
mod single_pass;
mod template_based;

pub use component_library::ComponentLibraryStrategy;
pub use design_system::DesignSystemStrategy;
pub use single_pass::SinglePassStrategy;
pub use template_based::{render_template, TemplateBasedStrategy};

use crate::error::EngineError;
use crate::options::GenerationOptions;
use crate::plan::parse_model_json;
use crate::settings::Settings;
use async_trait::async_trait;
use kaleido_core::{GenUsage, SitePalette, SitePlan};
use kaleido_llm::{ChatRequest, ImageModel, TextModel};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Available generation pipelines
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StrategyKind {
    SinglePass,
    TemplateBased,
    ComponentLibrary,
    #[default]
    DesignSystem,
}

impl StrategyKind {
    /// Every strategy in display order
    pub const ALL: [StrategyKind; 4] = [
        Self::SinglePass,
        Self::TemplateBased,
        Self::ComponentLibrary,
        Self::DesignSystem,
    ];

    /// Configuration value
    #[inline]
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::SinglePass => "single-pass",
            Self::TemplateBased => "template-based",
            Self::ComponentLibrary => "component-library",
            Self::DesignSystem => "design-system",
        }
    }

    /// Human-readable name
    #[must_use]
    pub fn title(self) -> &'static str {
        match self {
            Self::SinglePass => "Single-Pass Full Site",
            Self::TemplateBased => "Template-Based",
            Self::ComponentLibrary => "Component Library",
            Self::DesignSystem => "Design System First",
        }
    }

    #[must_use]
    pub fn description(self) -> &'static str {
        match self {
            Self::SinglePass => {
                "Generates the entire HTML in one call for maximum cohesion."
            }
            Self::TemplateBased => {
                "Fills predefined section templates with generated content. Most reliable and fast."
            }
            Self::ComponentLibrary => {
                "Composes sections from a fixed set of reusable components."
            }
            Self::DesignSystem => {
                "Plans a design system first, then renders every section concurrently."
            }
        }
    }

    /// Parse a configured value, falling back to the default on anything unknown
    #[must_use]
    pub fn parse_or_default(value: Option<&str>) -> Self {
        match value.map(str::parse::<Self>) {
            Some(Ok(kind)) => kind,
            Some(Err(e)) => {
                tracing::warn!("{e}, using {}", Self::default());
                Self::default()
            }
            None => Self::default(),
        }
    }
}

/// Configured value names no strategy
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown generation strategy: {0}")]
pub struct UnknownStrategy(pub String);

impl FromStr for StrategyKind {
    type Err = UnknownStrategy;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| UnknownStrategy(wanted.to_string()))
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Finished document plus everything needed to describe it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedSite {
    pub plan: SitePlan,
    pub html: String,
    pub usage: GenUsage,
    /// Data URI of the hero image, when one was generated
    pub image_src: Option<String>,
    pub strategy: StrategyKind,
}

/// A complete generation pipeline
#[async_trait]
pub trait GenerationStrategy: Send + Sync + fmt::Debug {
    fn kind(&self) -> StrategyKind;

    /// Produce a post-processed document for `seed`
    async fn generate(
        &self,
        seed: &str,
        hint: Option<&str>,
        options: &GenerationOptions,
    ) -> Result<GeneratedSite, EngineError>;
}

/// Registry of pipelines keyed by kind
pub struct StrategyRouter {
    strategies: BTreeMap<StrategyKind, Arc<dyn GenerationStrategy>>,
    settings: Settings,
}

impl StrategyRouter {
    /// Create an empty router
    #[must_use]
    pub fn new(settings: Settings) -> Self {
        Self {
            strategies: BTreeMap::new(),
            settings,
        }
    }

    /// Router with all four pipelines over the given models
    #[must_use]
    pub fn with_defaults(
        text: Arc<dyn TextModel>,
        images: Arc<dyn ImageModel>,
        settings: Settings,
    ) -> Self {
        let mut router = Self::new(settings.clone());
        router.register(Arc::new(SinglePassStrategy::new(text.clone())));
        router.register(Arc::new(TemplateBasedStrategy::new(text.clone())));
        router.register(Arc::new(ComponentLibraryStrategy::new(text.clone())));
        router.register(Arc::new(DesignSystemStrategy::new(text, images, settings)));
        router
    }

    /// Register a pipeline, replacing any previous one of the same kind
    pub fn register(&mut self, strategy: Arc<dyn GenerationStrategy>) {
        self.strategies.insert(strategy.kind(), strategy);
    }

    #[inline]
    #[must_use]
    pub fn contains(&self, kind: StrategyKind) -> bool {
        self.strategies.contains_key(&kind)
    }

    /// Registered kinds in display order
    #[must_use]
    pub fn kinds(&self) -> Vec<StrategyKind> {
        self.strategies.keys().copied().collect()
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.strategies.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.strategies.is_empty()
    }

    #[inline]
    #[must_use]
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Strategy the next call will use
    pub async fn resolve(&self) -> StrategyKind {
        match self.settings.strategy().await {
            Ok(kind) => kind,
            Err(e) => {
                tracing::warn!("could not read generation strategy: {e}");
                StrategyKind::default()
            }
        }
    }

    /// Generate with the configured strategy
    pub async fn generate(
        &self,
        seed: &str,
        hint: Option<&str>,
        options: &GenerationOptions,
    ) -> Result<GeneratedSite, EngineError> {
        let kind = self.resolve().await;
        self.generate_with(kind, seed, hint, options).await
    }

    /// Generate with an explicit strategy
    ///
    /// An unregistered kind falls back to the design-system pipeline.
    pub async fn generate_with(
        &self,
        kind: StrategyKind,
        seed: &str,
        hint: Option<&str>,
        options: &GenerationOptions,
    ) -> Result<GeneratedSite, EngineError> {
        let strategy = self
            .strategies
            .get(&kind)
            .or_else(|| self.strategies.get(&StrategyKind::DesignSystem))
            .ok_or_else(|| EngineError::StrategyUnavailable(kind.to_string()))?;
        tracing::info!(strategy = %strategy.kind(), seed, "generating site");
        strategy.generate(seed, hint, options).await
    }
}

impl fmt::Debug for StrategyRouter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StrategyRouter")
            .field("strategies", &self.kinds())
            .finish_non_exhaustive()
    }
}

/// Run one JSON-mode call and decode the reply
pub(crate) async fn complete_json(
    model: &dyn TextModel,
    request: ChatRequest,
) -> Result<(Value, GenUsage), EngineError> {
    let completion = model.complete(request).await?;
    let value = parse_model_json(&completion.content)?;
    Ok((value, completion.usage))
}

/// `:root` custom properties for a palette
pub(crate) fn palette_vars(palette: &SitePalette) -> String {
    format!(
        ":root {{\n  --color-bg: {};\n  --color-surface: {};\n  --color-primary: {};\n  --color-secondary: {};\n  --color-accent: {};\n  --color-text: {};\n}}",
        palette.background,
        palette.surface,
        palette.primary,
        palette.secondary,
        palette.accent,
        palette.text,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use kaleido_store::MemoryKvStore;
    use kaleido_test_utils::{sample_plan_json, ScriptedTextModel};
    use kaleido_llm::NoImageModel;

    #[test]
    fn parses_known_values() {
        for kind in StrategyKind::ALL {
            assert_eq!(kind.as_str().parse::<StrategyKind>().unwrap(), kind);
            assert_eq!(kind.to_string(), kind.as_str());
        }
        assert_eq!(
            "  Template-Based ".parse::<StrategyKind>().unwrap(),
            StrategyKind::TemplateBased
        );
    }

    #[test]
    fn unknown_values_fall_back_to_design_system() {
        assert_eq!(
            StrategyKind::parse_or_default(Some("nonexistent-strategy")),
            StrategyKind::DesignSystem
        );
        assert_eq!(StrategyKind::parse_or_default(None), StrategyKind::DesignSystem);
        assert!("nonexistent-strategy".parse::<StrategyKind>().is_err());
    }

    #[test]
    fn serde_uses_config_values() {
        let json = serde_json::to_value(StrategyKind::ComponentLibrary).unwrap();
        assert_eq!(json, "component-library");
    }

    #[test]
    fn router_registers_all_defaults() {
        let settings = Settings::new(Arc::new(MemoryKvStore::new()));
        let text = Arc::new(ScriptedTextModel::constant(sample_plan_json().to_string()));
        let router = StrategyRouter::with_defaults(text, Arc::new(NoImageModel), settings);
        assert_eq!(router.len(), 4);
        assert_eq!(router.kinds(), StrategyKind::ALL.to_vec());
    }

    #[tokio::test]
    async fn missing_strategy_is_an_error_only_when_nothing_can_serve() {
        let settings = Settings::new(Arc::new(MemoryKvStore::new()));
        let router = StrategyRouter::new(settings);
        let err = router
            .generate_with(StrategyKind::SinglePass, "s", None, &GenerationOptions::new())
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::StrategyUnavailable(_)));
    }

    #[test]
    fn palette_vars_lists_every_slot() {
        let plan = kaleido_core::ensure_plan(kaleido_core::RawSitePlan::default(), "s");
        let css = palette_vars(&plan.palette);
        for var in ["--color-bg", "--color-surface", "--color-primary", "--color-secondary", "--color-accent", "--color-text"] {
            assert!(css.contains(var), "{var} missing");
        }
    }
}
