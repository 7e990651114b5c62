//! Directory entries, errors, and filter helpers
//!
//! Everything here is transient: entries live for the duration of a single
//! query and nothing is cached across authentication calls.

use keyward_core::{DN_PLACEHOLDER, USERNAME_PLACEHOLDER};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use thiserror::Error;

// ============================================================================
// Directory Errors
// ============================================================================

pub type DirectoryResult<T> = Result<T, DirectoryError>;

/// Failures at the directory protocol boundary
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DirectoryError {
    /// Network or connection failure
    #[error("Directory unavailable: {0}")]
    Unavailable(String),

    /// Operation exceeded the configured timeout
    #[error("Directory operation timed out: {0}")]
    Timeout(String),

    /// Bind rejected the DN/secret pair
    #[error("Invalid credentials")]
    InvalidCredentials,

    /// Target DN or search base does not exist
    #[error("No such object: {0}")]
    NoSuchObject(String),

    /// Any other non-success result code
    #[error("Directory returned rc={rc}: {message}")]
    Protocol { rc: u32, message: String },
}

impl DirectoryError {
    /// Whether the directory could not be reached at all
    pub fn is_unavailable(&self) -> bool {
        matches!(self, DirectoryError::Unavailable(_) | DirectoryError::Timeout(_))
    }
}

// ============================================================================
// Directory Entry
// ============================================================================

/// A single search result: DN plus attribute values
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryEntry {
    pub dn: String,
    pub attributes: HashMap<String, Vec<String>>,
}

impl DirectoryEntry {
    pub fn new(dn: impl Into<String>) -> Self {
        Self {
            dn: dn.into(),
            attributes: HashMap::new(),
        }
    }

    pub fn with_attribute<I, S>(mut self, name: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.attributes
            .entry(name.into())
            .or_default()
            .extend(values.into_iter().map(Into::into));
        self
    }

    /// All values of an attribute; names compare case-insensitively
    pub fn values(&self, name: &str) -> &[String] {
        self.attributes
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, values)| values.as_slice())
            .unwrap_or(&[])
    }

    /// Get first value of an attribute
    pub fn first(&self, name: &str) -> Option<&str> {
        self.values(name).first().map(|s| s.as_str())
    }
}

// ============================================================================
// Group Node
// ============================================================================

/// A group reached while walking membership
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupNode {
    pub dn: String,

    /// Nesting level; 0 for groups that list the user directly
    pub level: u32,

    /// Value of the scope attribute, if the entry carries one
    pub name: Option<String>,

    pub member_dns: BTreeSet<String>,
}

impl GroupNode {
    pub fn from_entry(
        entry: &DirectoryEntry,
        level: u32,
        name_attribute: &str,
        member_attribute: &str,
    ) -> Self {
        Self {
            dn: entry.dn.clone(),
            level,
            name: entry.first(name_attribute).map(str::to_string),
            member_dns: entry.values(member_attribute).iter().cloned().collect(),
        }
    }
}

// ============================================================================
// Helper Functions
// ============================================================================

/// DNs compare case-insensitively and ignore spaces around separators
pub fn normalize_dn(dn: &str) -> String {
    dn.split(',')
        .map(|rdn| {
            rdn.split('=')
                .map(str::trim)
                .collect::<Vec<_>>()
                .join("=")
        })
        .collect::<Vec<_>>()
        .join(",")
        .to_ascii_lowercase()
}

/// Build a search filter with the username filter-escaped
pub fn build_user_filter(template: &str, username: &str) -> String {
    template.replace(USERNAME_PLACEHOLDER, &ldap3::ldap_escape(username))
}

/// Build a bind DN with the username DN-escaped
pub fn build_user_dn(pattern: &str, username: &str) -> String {
    pattern.replace(USERNAME_PLACEHOLDER, &ldap3::dn_escape(username))
}

/// Build a group search filter for a member DN
pub fn build_member_filter(template: &str, member_dn: &str) -> String {
    template.replace(DN_PLACEHOLDER, &ldap3::ldap_escape(member_dn))
}
