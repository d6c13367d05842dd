//! Kaleido Core - site plan model and HTML shaping
//!
//! Pure, I/O free building blocks shared by every other crate:
//! - [`SitePlan`] and friends, the structured description of a page
//! - [`ensure_plan`], which turns whatever the model produced into a valid plan
//! - [`GenUsage`] token accounting
//! - HTML utilities: fence stripping, image splicing, minification
//! - [`post_process`], the idempotent skeleton/style/control injection
//!
//! # Example
//!
//! ```rust
//! use kaleido_core::{ensure_plan, RawSitePlan};
//!
//! let plan = ensure_plan(RawSitePlan::default(), "abc123");
//! assert_eq!(plan.sections[0].id, "hero");
//! assert_eq!(plan.seed, "abc123");
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod html;
pub mod plan;
pub mod postprocess;
pub mod types;

pub use html::{
    ensure_image, escape_html, minify_html, minimal_html, normalize_fenced_html, IMAGE_MARKER_ID,
    IMAGE_SLOT,
};
pub use plan::{
    ensure_plan, sanitize_hex, slugify, RawPalette, RawSection, RawSitePlan, DEFAULT_FEATURES,
    DEFAULT_INTERACTIVE,
};
pub use postprocess::{post_process, PostProcessOptions};
pub use types::{GenUsage, SiteMeta, SitePalette, SitePlan, SiteSectionPlan, SizeHint, HERO_ID};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
