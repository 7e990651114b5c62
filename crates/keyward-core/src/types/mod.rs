//! Core types for Keyward

mod principal;
mod user;

pub use principal::*;
pub use user::*;
