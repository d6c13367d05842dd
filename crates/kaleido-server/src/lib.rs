//! Kaleido Server - HTTP surface for the site generator
//!
//! - [`AppConfig`]: TOML file plus environment overrides
//! - [`AppState`]: model, store and lease capabilities wired from the config
//! - [`routes`]: warp filters for the public pages, pregeneration and the admin API

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod app;
pub mod config;
pub mod routes;

pub use app::{AppError, AppState};
pub use config::{AppConfig, ConfigError};
pub use routes::{routes, ConfigField, BODY_LIMIT, SITE_CSP};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
