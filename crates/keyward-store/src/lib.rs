//! Internal credential and scope store for Keyward
//!
//! Holds internally managed users (with password hashes) and shadow records
//! for directory identities. Backed by SQLite.

pub mod repository;
pub mod traits;

pub use repository::SqliteUserStore;
pub use traits::*;
