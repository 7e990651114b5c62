//! LDAP directory authentication
//!
//! - `client`: the `DirectoryClient` seam and its `ldap3` implementation
//! - `strategy`: simple bind, search-and-bind, search-and-compare
//! - `groups`: nested group traversal and scope mapping
//! - `provider`: ties a strategy and a resolver into an `AuthenticationProvider`

mod client;
mod groups;
mod provider;
mod strategy;
mod types;

pub use client::{DirectoryClient, LdapClient};
pub use groups::GroupResolver;
pub use provider::DirectoryAuthenticationProvider;
pub use strategy::{
    AuthenticationStrategy, SearchAndBind, SearchAndCompare, SimpleBind, VerifiedIdentity,
    VerifyError, VerifyResult,
};
pub use types::*;
