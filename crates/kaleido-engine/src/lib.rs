//! Kaleido Engine - the site generation pipeline
//!
//! Turns a seed into a finished single-page document:
//! - [`PlanGenerator`]: one structured-output call producing a [`SitePlan`](kaleido_core::SitePlan)
//! - [`SectionRenderer`]: one call per planned section, all in flight at once
//! - [`DocumentAssembler`]: stitches fragments, theme, navigation and hero image
//! - [`StrategyRouter`]: picks one of four pipelines from runtime [`Settings`]
//! - [`Publisher`]: lease-guarded, rate-limited generation with persistence and history
//!
//! # Example
//!
//! ```rust,no_run
//! use kaleido_engine::{GenerationOptions, Settings, StrategyRouter};
//! use kaleido_llm::{NoImageModel, UnconfiguredTextModel};
//! use kaleido_store::MemoryKvStore;
//! use std::sync::Arc;
//!
//! # async fn run() -> Result<(), kaleido_engine::EngineError> {
//! let settings = Settings::new(Arc::new(MemoryKvStore::new()));
//! let router = StrategyRouter::with_defaults(
//!     Arc::new(UnconfiguredTextModel),
//!     Arc::new(NoImageModel),
//!     settings,
//! );
//! let site = router.generate("abc123", Some("retro arcade"), &GenerationOptions::new()).await?;
//! println!("{}", site.html);
//! # Ok(())
//! # }
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod assemble;
pub mod error;
pub mod history;
pub mod options;
pub mod plan;
pub mod prompts;
pub mod publish;
pub mod section;
pub mod settings;
pub mod strategy;

pub use assemble::{build_css, section_block, DocumentAssembler};
pub use error::{EngineError, SettingsError};
pub use history::{HistoryEntry, HISTORY_LIMIT};
pub use options::{GenerationOptions, DEFAULT_PLAN_MODEL};
pub use plan::{PlanGenerator, PlanOutcome};
pub use publish::{
    is_valid_site_id, LatestPointer, LatestSite, PublishedSite, Publisher, SiteListing,
    BLOB_PREFIX, RATE_PREFIX,
};
pub use section::{section_budget, RenderedBatch, RenderedSection, SectionRenderer, MIN_SECTION_BUDGET};
pub use settings::{Settings, SettingsSnapshot};
pub use strategy::{
    render_template, ComponentLibraryStrategy, DesignSystemStrategy, GeneratedSite,
    GenerationStrategy, SinglePassStrategy, StrategyKind, StrategyRouter, TemplateBasedStrategy,
    UnknownStrategy,
};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
