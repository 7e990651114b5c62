//! Keyward Core Library
//!
//! Core types, configuration, and the error taxonomy shared by the Keyward
//! authentication service.

pub mod config;
pub mod error;
pub mod types;

pub use config::KeywardConfig;
pub use error::{Error, Result};

/// Keyward version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Placeholder substituted with the login name in filters and DN patterns
pub const USERNAME_PLACEHOLDER: &str = "{username}";

/// Placeholder substituted with a member DN in group search filters
pub const DN_PLACEHOLDER: &str = "{dn}";

/// Default upper bound on nested group expansion
pub const DEFAULT_MAX_SEARCH_DEPTH: i32 = 10;
