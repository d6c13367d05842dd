//! Plan normalisation
//!
//! Model output is untrusted. [`RawSitePlan`] mirrors what the model is asked
//! to produce with every field optional; [`ensure_plan`] turns it into a
//! [`SitePlan`] that satisfies all invariants:
//! - palette slots are valid 3- or 6-digit hex colours
//! - 1..=7 sections, the first one always `hero`
//! - section ids are unique slugs
//! - feature and interaction lists are non-empty

use crate::types::{SitePalette, SitePlan, SiteSectionPlan, HERO_ID};
use once_cell::sync::Lazy;
use regex::Regex;
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashSet;

/// Maximum number of sections kept from a model proposal
pub const MAX_SECTIONS: usize = 7;

/// Features of a section whose plan names none
pub const DEFAULT_FEATURES: &[&str] = &["Headline", "Body copy", "CTA"];

/// Interactive behaviours of a section whose plan names none
pub const DEFAULT_INTERACTIVE: &[&str] = &["Subtle hover animations on key elements"];

const DEFAULT_SUMMARY: &str =
    "A wildly imaginative single-page experience packed with stories, interactions, and surprises.";
const DEFAULT_SLOGAN: &str = "KaleidoVibe";
const DEFAULT_VIBE: &str = "Playful, confident, and a bit surreal";
const DEFAULT_MOTIF: &str =
    "Layered gradients, floating particles, and delightful micro-interactions";
const DEFAULT_PALETTE_NAME: &str = "Chromatic Echo";
const DEFAULT_PURPOSE: &str = "Tell a short story that advances the experience.";

/// Per-slot fallback colours
pub mod fallback {
    pub const BACKGROUND: &str = "#0b0b10";
    pub const SURFACE: &str = "#141422";
    pub const PRIMARY: &str = "#8b5cf6";
    pub const SECONDARY: &str = "#22d3ee";
    pub const ACCENT: &str = "#f97316";
    pub const TEXT: &str = "#f1f5f9";
}

static HEX_COLOR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^#(?:[0-9a-fA-F]{3}|[0-9a-fA-F]{6})$").expect("valid hex regex"));

static NON_ALNUM_RUN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^a-z0-9]+").expect("valid slug regex"));

/// Palette as proposed by the model
#[derive(Debug, Clone, Default, Deserialize, JsonSchema)]
#[serde(default)]
pub struct RawPalette {
    pub name: Option<String>,
    pub background: Option<String>,
    pub surface: Option<String>,
    pub primary: Option<String>,
    pub secondary: Option<String>,
    pub accent: Option<String>,
    pub text: Option<String>,
}

/// Section as proposed by the model
#[derive(Debug, Clone, Default, Deserialize, JsonSchema)]
#[serde(default)]
pub struct RawSection {
    pub id: Option<String>,
    pub title: Option<String>,
    pub purpose: Option<String>,
    pub features: Option<Vec<String>>,
    pub interactive: Option<Vec<String>>,
}

/// Site plan as proposed by the model
///
/// Its JSON schema is what the planning prompt hands to the model.
#[derive(Debug, Clone, Default, Deserialize, JsonSchema)]
#[serde(default, rename_all = "camelCase")]
pub struct RawSitePlan {
    pub seed: Option<String>,
    pub summary: Option<String>,
    pub slogan: Option<String>,
    pub vibe: Option<String>,
    pub motif: Option<String>,
    pub include_header: Option<bool>,
    pub layout_style: Option<String>,
    pub palette: Option<RawPalette>,
    pub sections: Option<Vec<RawSection>>,
}

impl RawSitePlan {
    /// Decode a JSON value, tolerating wrong field types
    ///
    /// A strict decode is tried first; when any field has the wrong shape the
    /// value is picked apart field by field instead, so the only thing that
    /// can go wrong earlier is the text not being JSON at all.
    #[must_use]
    pub fn from_value(value: &Value) -> Self {
        match serde_json::from_value::<RawSitePlan>(value.clone()) {
            Ok(raw) => raw,
            Err(e) => {
                tracing::debug!("strict plan decode failed, using lenient extraction: {e}");
                Self::lenient(value)
            }
        }
    }

    /// Field-by-field extraction that ignores anything malformed
    #[must_use]
    pub fn lenient(value: &Value) -> Self {
        let palette = value.get("palette").filter(|p| p.is_object()).map(|p| RawPalette {
            name: str_field(p, "name"),
            background: str_field(p, "background"),
            surface: str_field(p, "surface"),
            primary: str_field(p, "primary"),
            secondary: str_field(p, "secondary"),
            accent: str_field(p, "accent"),
            text: str_field(p, "text"),
        });

        let sections = value.get("sections").and_then(Value::as_array).map(|items| {
            items
                .iter()
                .filter(|s| s.is_object())
                .map(|s| RawSection {
                    id: str_field(s, "id"),
                    title: str_field(s, "title"),
                    purpose: str_field(s, "purpose"),
                    features: list_field(s, "features"),
                    interactive: list_field(s, "interactive"),
                })
                .collect()
        });

        Self {
            seed: str_field(value, "seed"),
            summary: str_field(value, "summary"),
            slogan: str_field(value, "slogan"),
            vibe: str_field(value, "vibe"),
            motif: str_field(value, "motif"),
            include_header: value.get("includeHeader").and_then(Value::as_bool),
            layout_style: str_field(value, "layoutStyle"),
            palette,
            sections,
        }
    }

    /// JSON schema of the plan as a compact string
    #[must_use]
    pub fn schema_json() -> String {
        let schema = schemars::schema_for!(RawSitePlan);
        serde_json::to_string(&schema).unwrap_or_default()
    }
}

fn str_field(value: &Value, key: &str) -> Option<String> {
    value.get(key).and_then(Value::as_str).map(str::to_owned)
}

fn list_field(value: &Value, key: &str) -> Option<Vec<String>> {
    value.get(key).and_then(Value::as_array).map(|items| {
        items
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_owned)
            .collect()
    })
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// Accept `#rgb` / `#rrggbb` (any case), anything else becomes `fallback`
#[must_use]
pub fn sanitize_hex(value: &str, fallback: &str) -> String {
    let hex = value.trim();
    if HEX_COLOR.is_match(hex) {
        hex.to_string()
    } else {
        fallback.to_string()
    }
}

/// Lowercase slug with single hyphens; `fallback` when nothing survives
#[must_use]
pub fn slugify(value: &str, fallback: &str) -> String {
    let lowered = value.to_lowercase();
    let collapsed = NON_ALNUM_RUN.replace_all(&lowered, "-");
    let trimmed = collapsed.trim_matches('-');
    if trimmed.is_empty() {
        fallback.to_string()
    } else {
        trimmed.to_string()
    }
}

fn color(value: Option<String>, fallback: &str) -> String {
    match non_empty(value) {
        Some(v) => sanitize_hex(&v, fallback),
        None => fallback.to_string(),
    }
}

fn clean_list(items: Option<Vec<String>>, default: &[&str]) -> Vec<String> {
    let cleaned: Vec<String> = items
        .unwrap_or_default()
        .into_iter()
        .map(|item| item.trim().to_string())
        .filter(|item| !item.is_empty())
        .collect();
    if cleaned.is_empty() {
        default.iter().map(|s| (*s).to_string()).collect()
    } else {
        cleaned
    }
}

fn default_hero() -> RawSection {
    RawSection {
        id: Some(HERO_ID.to_string()),
        title: Some("Hero".to_string()),
        purpose: Some(
            "Introduce the concept with a bold headline, supporting copy, and a primary call-to-action."
                .to_string(),
        ),
        features: Some(vec![
            "Commanding headline".to_string(),
            "Supporting blurb".to_string(),
            "Primary CTA button".to_string(),
        ]),
        interactive: Some(vec![
            "Animated headline reveal".to_string(),
            "Button hover micro-interaction".to_string(),
        ]),
    }
}

/// Pick an id not yet in `seen`: the slug itself, then `{slug}-{index}`,
/// then increasing numeric suffixes.
fn unique_id(base: String, index: usize, seen: &HashSet<String>) -> String {
    if !seen.contains(&base) {
        return base;
    }
    let mut n = index;
    let mut candidate = format!("{base}-{n}");
    while seen.contains(&candidate) {
        n += 1;
        candidate = format!("{base}-{n}");
    }
    candidate
}

/// Fill every missing or malformed field of a proposed plan with a default
///
/// Never fails. `seed` wins over any seed echoed by the model; an empty seed
/// falls back to the model's, then to `seed-{epoch_ms}`.
#[must_use]
pub fn ensure_plan(raw: RawSitePlan, seed: &str) -> SitePlan {
    let seed = non_empty(Some(seed.to_string()))
        .or_else(|| non_empty(raw.seed.clone()))
        .unwrap_or_else(|| format!("seed-{}", chrono::Utc::now().timestamp_millis()));

    let palette = raw.palette.unwrap_or_default();
    let palette = SitePalette {
        name: non_empty(palette.name).unwrap_or_else(|| DEFAULT_PALETTE_NAME.to_string()),
        background: color(palette.background, fallback::BACKGROUND),
        surface: color(palette.surface, fallback::SURFACE),
        primary: color(palette.primary, fallback::PRIMARY),
        secondary: color(palette.secondary, fallback::SECONDARY),
        accent: color(palette.accent, fallback::ACCENT),
        text: color(palette.text, fallback::TEXT),
    };

    let mut proposed: Vec<RawSection> = raw
        .sections
        .unwrap_or_default()
        .into_iter()
        .take(MAX_SECTIONS)
        .collect();
    if proposed.is_empty() {
        proposed.push(default_hero());
    }

    let mut seen = HashSet::with_capacity(proposed.len());
    let sections = proposed
        .into_iter()
        .enumerate()
        .map(|(index, section)| {
            let fallback = format!("section-{}", index + 1);
            let base = if index == 0 {
                HERO_ID.to_string()
            } else {
                let source = non_empty(section.id.clone())
                    .or_else(|| non_empty(section.title.clone()))
                    .unwrap_or_else(|| fallback.clone());
                slugify(&source, &fallback)
            };
            let id = unique_id(base, index, &seen);
            seen.insert(id.clone());

            SiteSectionPlan {
                id,
                title: non_empty(section.title).unwrap_or_else(|| format!("Section {}", index + 1)),
                purpose: non_empty(section.purpose).unwrap_or_else(|| DEFAULT_PURPOSE.to_string()),
                features: clean_list(section.features, DEFAULT_FEATURES),
                interactive: clean_list(section.interactive, DEFAULT_INTERACTIVE),
            }
        })
        .collect();

    SitePlan {
        seed,
        summary: non_empty(raw.summary).unwrap_or_else(|| DEFAULT_SUMMARY.to_string()),
        slogan: non_empty(raw.slogan).unwrap_or_else(|| DEFAULT_SLOGAN.to_string()),
        vibe: non_empty(raw.vibe).unwrap_or_else(|| DEFAULT_VIBE.to_string()),
        motif: non_empty(raw.motif).unwrap_or_else(|| DEFAULT_MOTIF.to_string()),
        palette,
        sections,
        include_header: raw.include_header,
        layout_style: non_empty(raw.layout_style),
    }
}
