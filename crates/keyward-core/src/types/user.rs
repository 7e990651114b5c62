//! Internally recorded identities

use super::{AuthenticationOrigin, ScopeSet};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A username known to the internal store.
///
/// Directory identities are recorded as shadow users with no password hash,
/// so their origin and any locally granted scopes survive across logins.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserRecord {
    pub username: String,
    pub origin: AuthenticationOrigin,
    #[serde(skip_serializing)]
    pub password_hash: Option<String>,
    pub scopes: ScopeSet,
    pub created_at: DateTime<Utc>,
}

impl UserRecord {
    pub fn internal(username: impl Into<String>, password_hash: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            origin: AuthenticationOrigin::Internal,
            password_hash: Some(password_hash.into()),
            scopes: ScopeSet::new(),
            created_at: Utc::now(),
        }
    }

    pub fn shadow(username: impl Into<String>, origin: AuthenticationOrigin) -> Self {
        Self {
            username: username.into(),
            origin,
            password_hash: None,
            scopes: ScopeSet::new(),
            created_at: Utc::now(),
        }
    }

    pub fn with_scopes<I, S>(mut self, scopes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.scopes.extend(scopes.into_iter().map(Into::into));
        self
    }

    /// Only internal users with a stored hash can log in against the store
    pub fn can_verify_password(&self) -> bool {
        self.origin == AuthenticationOrigin::Internal && self.password_hash.is_some()
    }
}
