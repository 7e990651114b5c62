//! Authentication inputs and results

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// Deduplicated, order-insensitive set of scope strings
pub type ScopeSet = BTreeSet<String>;

/// Username and secret presented for a single authentication call.
///
/// The secret is never printed by `Debug`.
#[derive(Clone)]
pub struct Credential {
    pub username: String,
    secret: String,
}

impl Credential {
    pub fn new(username: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            secret: secret.into(),
        }
    }

    pub fn secret(&self) -> &str {
        &self.secret
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("username", &self.username)
            .field("secret", &"<redacted>")
            .finish()
    }
}

/// Where a principal's credential was verified
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthenticationOrigin {
    /// Internal credential store
    Internal,
    /// External directory (LDAP)
    Directory,
}

impl AuthenticationOrigin {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuthenticationOrigin::Internal => "internal",
            AuthenticationOrigin::Directory => "directory",
        }
    }
}

impl fmt::Display for AuthenticationOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AuthenticationOrigin {
    type Err = crate::Error;

    fn from_str(s: &str) -> crate::Result<Self> {
        match s {
            "internal" => Ok(AuthenticationOrigin::Internal),
            "directory" => Ok(AuthenticationOrigin::Directory),
            other => Err(crate::Error::DatabaseError(format!(
                "Unknown authentication origin: {}",
                other
            ))),
        }
    }
}

/// Successful authentication result
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrincipalResult {
    pub username: String,
    pub origin: AuthenticationOrigin,
    pub scopes: ScopeSet,
}

impl PrincipalResult {
    pub fn new(username: impl Into<String>, origin: AuthenticationOrigin) -> Self {
        Self {
            username: username.into(),
            origin,
            scopes: ScopeSet::new(),
        }
    }

    pub fn with_scopes<I, S>(mut self, scopes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.merge_scopes(scopes);
        self
    }

    /// Union additional scopes into this result
    pub fn merge_scopes<I, S>(&mut self, scopes: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.scopes.extend(scopes.into_iter().map(Into::into));
    }

    pub fn has_scope(&self, scope: &str) -> bool {
        self.scopes.contains(scope)
    }
}
