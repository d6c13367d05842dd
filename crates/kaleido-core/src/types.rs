//! Core types for Kaleido
//!
//! Defines the fundamental types for a generation:
//! - The site plan (copy, palette, ordered sections)
//! - Token usage accounting
//! - Metadata persisted next to every generated document

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Reserved identifier of the first section of every plan
pub const HERO_ID: &str = "hero";

/// Six semantic colour slots plus a display name
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SitePalette {
    pub name: String,
    pub background: String,
    pub surface: String,
    pub primary: String,
    pub secondary: String,
    pub accent: String,
    pub text: String,
}

impl SitePalette {
    /// Iterate the six colour slots as `(slot, value)` pairs
    pub fn colors(&self) -> impl Iterator<Item = (&'static str, &str)> {
        [
            ("background", self.background.as_str()),
            ("surface", self.surface.as_str()),
            ("primary", self.primary.as_str()),
            ("secondary", self.secondary.as_str()),
            ("accent", self.accent.as_str()),
            ("text", self.text.as_str()),
        ]
        .into_iter()
    }
}

/// One planned section of the page
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteSectionPlan {
    /// Slug used as the element id and nav anchor
    pub id: String,
    pub title: String,
    pub purpose: String,
    pub features: Vec<String>,
    pub interactive: Vec<String>,
}

/// Structured description of a page, produced before any HTML
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SitePlan {
    /// Generation identifier
    pub seed: String,
    pub summary: String,
    pub slogan: String,
    pub vibe: String,
    pub motif: String,
    pub palette: SitePalette,
    pub sections: Vec<SiteSectionPlan>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub include_header: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub layout_style: Option<String>,
}

impl SitePlan {
    /// Whether the assembled page carries a navigation header
    ///
    /// Only an explicit `false` removes it.
    #[inline]
    #[must_use]
    pub fn shows_header(&self) -> bool {
        self.include_header != Some(false)
    }

    /// Layout tag or `"default"`
    #[inline]
    #[must_use]
    pub fn layout_label(&self) -> &str {
        self.layout_style.as_deref().unwrap_or("default")
    }
}

/// Token accounting for one or more model calls
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenUsage {
    #[serde(default)]
    pub input_tokens: u64,
    #[serde(default)]
    pub output_tokens: u64,
    /// Model name, or several de-duplicated names joined with `", "`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

impl GenUsage {
    /// Create usage for a single call
    #[inline]
    #[must_use]
    pub fn new(input_tokens: u64, output_tokens: u64, model: impl Into<String>) -> Self {
        Self {
            input_tokens,
            output_tokens,
            model: Some(model.into()),
        }
    }

    /// Zero-filled usage for calls that report nothing
    #[inline]
    #[must_use]
    pub fn zero() -> Self {
        Self::default()
    }

    /// Usage attributed to a model without token counts
    #[inline]
    #[must_use]
    pub fn model_only(model: impl Into<String>) -> Self {
        Self {
            model: Some(model.into()),
            ..Self::default()
        }
    }

    /// Individual model names carried by this entry
    pub fn models(&self) -> impl Iterator<Item = &str> {
        self.model
            .as_deref()
            .into_iter()
            .flat_map(|m| m.split(", "))
            .filter(|m| !m.is_empty())
    }

    /// Merge two entries; tokens add, model names union in first-seen order
    #[must_use]
    pub fn merge(&self, other: &GenUsage) -> GenUsage {
        GenUsage::combine([self, other])
    }

    /// Merge any number of entries
    #[must_use]
    pub fn combine<'a, I>(entries: I) -> GenUsage
    where
        I: IntoIterator<Item = &'a GenUsage>,
    {
        let mut input = 0u64;
        let mut output = 0u64;
        let mut models: Vec<&str> = Vec::new();
        for entry in entries {
            input = input.saturating_add(entry.input_tokens);
            output = output.saturating_add(entry.output_tokens);
            for model in entry.models() {
                if !models.contains(&model) {
                    models.push(model);
                }
            }
        }
        GenUsage {
            input_tokens: input,
            output_tokens: output,
            model: (!models.is_empty()).then(|| models.join(", ")),
        }
    }

    /// Total tokens in and out
    #[inline]
    #[must_use]
    pub fn total_tokens(&self) -> u64 {
        self.input_tokens.saturating_add(self.output_tokens)
    }
}

/// Requested document size; scales the token budget
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SizeHint {
    Small,
    #[default]
    Medium,
    Large,
}

impl SizeHint {
    /// Total token budget shared by all sections
    #[inline]
    #[must_use]
    pub fn token_budget(self) -> u32 {
        match self {
            Self::Small => 900,
            Self::Medium => 1200,
            Self::Large => 1600,
        }
    }
}

impl FromStr for SizeHint {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "small" => Ok(Self::Small),
            "medium" => Ok(Self::Medium),
            "large" => Ok(Self::Large),
            other => Err(format!("unknown size hint: {other}")),
        }
    }
}

impl fmt::Display for SizeHint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Small => "small",
            Self::Medium => "medium",
            Self::Large => "large",
        };
        f.write_str(s)
    }
}

/// Metadata stored next to every generated document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteMeta {
    pub id: String,
    /// Milliseconds since the Unix epoch
    pub timestamp: i64,
    pub summary: String,
    pub plan: SitePlan,
    pub usage: GenUsage,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default)]
    pub strategy: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn combine_sums_and_dedups_models() {
        let a = GenUsage::new(10, 20, "gpt-4o-mini");
        let b = GenUsage::new(1, 2, "gpt-4o-mini");
        let c = GenUsage::new(3, 4, "gpt-4o");

        let merged = GenUsage::combine([&a, &b, &c]);
        assert_eq!(merged.input_tokens, 14);
        assert_eq!(merged.output_tokens, 26);
        assert_eq!(merged.model.as_deref(), Some("gpt-4o-mini, gpt-4o"));
    }

    #[test]
    fn combine_of_nothing_is_zero() {
        let merged = GenUsage::combine(std::iter::empty());
        assert_eq!(merged, GenUsage::zero());
        assert!(merged.model.is_none());
    }

    #[test]
    fn merged_model_lists_flatten() {
        let a = GenUsage::new(1, 1, "a, b");
        let b = GenUsage::new(1, 1, "b, c");
        assert_eq!(a.merge(&b).model.as_deref(), Some("a, b, c"));
    }

    #[test]
    fn usage_serializes_camel_case() {
        let json = serde_json::to_value(GenUsage::new(5, 6, "m")).unwrap();
        assert_eq!(json["inputTokens"], 5);
        assert_eq!(json["outputTokens"], 6);
        assert_eq!(json["model"], "m");
    }

    #[test]
    fn size_hint_budgets() {
        assert_eq!(SizeHint::Small.token_budget(), 900);
        assert_eq!(SizeHint::Medium.token_budget(), 1200);
        assert_eq!(SizeHint::Large.token_budget(), 1600);
        assert_eq!("LARGE".parse::<SizeHint>().unwrap(), SizeHint::Large);
        assert!("huge".parse::<SizeHint>().is_err());
    }

    fn usage_strategy() -> impl Strategy<Value = GenUsage> {
        (0u64..1_000_000, 0u64..1_000_000, prop::option::of("[a-z]{1,6}")).prop_map(
            |(input, output, model)| GenUsage {
                input_tokens: input,
                output_tokens: output,
                model,
            },
        )
    }

    proptest! {
        #[test]
        fn prop_combine_is_commutative_on_tokens(a in usage_strategy(), b in usage_strategy()) {
            let ab = a.merge(&b);
            let ba = b.merge(&a);
            prop_assert_eq!(ab.input_tokens, ba.input_tokens);
            prop_assert_eq!(ab.output_tokens, ba.output_tokens);
        }

        #[test]
        fn prop_combine_is_associative(
            a in usage_strategy(),
            b in usage_strategy(),
            c in usage_strategy(),
        ) {
            let left = a.merge(&b).merge(&c);
            let right = a.merge(&b.merge(&c));
            prop_assert_eq!(left, right);
        }

        #[test]
        fn prop_combine_sums_tokens(entries in prop::collection::vec(usage_strategy(), 0..12)) {
            let merged = GenUsage::combine(&entries);
            let input: u64 = entries.iter().map(|e| e.input_tokens).sum();
            let output: u64 = entries.iter().map(|e| e.output_tokens).sum();
            prop_assert_eq!(merged.input_tokens, input);
            prop_assert_eq!(merged.output_tokens, output);
        }
    }
}
