//! Per-request generation options

use kaleido_core::SizeHint;

/// Model used for planning and single-call strategies unless overridden
pub const DEFAULT_PLAN_MODEL: &str = "gpt-4o-mini";

/// Knobs for one generation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationOptions {
    pub size_hint: SizeHint,
    /// Identifier of the document being built; shown in the footer note
    pub site_id: Option<String>,
    pub include_image: bool,
    /// Replaces the contextual image prompt when set
    pub image_prompt: Option<String>,
    pub embed_controls: bool,
    /// Model for plan calls and the single-call strategies
    pub plan_model: String,
    /// Model for section calls
    pub render_model: String,
}

impl Default for GenerationOptions {
    fn default() -> Self {
        Self {
            size_hint: SizeHint::Medium,
            site_id: None,
            include_image: false,
            image_prompt: None,
            embed_controls: true,
            plan_model: DEFAULT_PLAN_MODEL.to_string(),
            render_model: DEFAULT_PLAN_MODEL.to_string(),
        }
    }
}

impl GenerationOptions {
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    #[must_use]
    pub fn with_size_hint(mut self, size_hint: SizeHint) -> Self {
        self.size_hint = size_hint;
        self
    }

    #[inline]
    #[must_use]
    pub fn with_site_id(mut self, id: impl Into<String>) -> Self {
        self.site_id = Some(id.into());
        self
    }

    #[inline]
    #[must_use]
    pub fn with_image(mut self, include: bool, prompt: Option<String>) -> Self {
        self.include_image = include;
        self.image_prompt = prompt.filter(|p| !p.trim().is_empty());
        self
    }

    #[inline]
    #[must_use]
    pub fn with_controls(mut self, embed: bool) -> Self {
        self.embed_controls = embed;
        self
    }

    #[inline]
    #[must_use]
    pub fn with_plan_model(mut self, model: impl Into<String>) -> Self {
        self.plan_model = model.into();
        self
    }

    #[inline]
    #[must_use]
    pub fn with_render_model(mut self, model: impl Into<String>) -> Self {
        self.render_model = model.into();
        self
    }

    /// Post-processing options matching these knobs
    #[must_use]
    pub fn post_process(&self) -> kaleido_core::PostProcessOptions {
        kaleido_core::PostProcessOptions {
            id: self.site_id.clone(),
            embed_controls: self.embed_controls,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_image_prompt_is_dropped() {
        let opts = GenerationOptions::new().with_image(true, Some("   ".into()));
        assert!(opts.include_image);
        assert!(opts.image_prompt.is_none());
    }

    #[test]
    fn post_process_options_follow_site_id() {
        let opts = GenerationOptions::new().with_site_id("abc").with_controls(false);
        let pp = opts.post_process();
        assert_eq!(pp.id.as_deref(), Some("abc"));
        assert!(!pp.embed_controls);
    }
}
