//! Password verification strategies
//!
//! Three interchangeable ways of proving a secret against the directory:
//!
//! - **Simple bind**: bind as a DN built from a pattern
//! - **Search and bind**: resolve the DN with a service-account search, then bind as it
//! - **Search and compare**: resolve the DN, then compare the password attribute
//!
//! The strategy is chosen once from configuration and dispatched through
//! [`AuthenticationStrategy::verify`].

use crate::ldap::client::DirectoryClient;
use crate::ldap::types::*;
use keyward_core::config::{BindStrategy, DirectoryConfigSection, PasswordEncoding};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

/// Attribute list that asks the server for no attributes at all
const NO_ATTRIBUTES: &str = "1.1";

/// DN whose password has been proven
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedIdentity {
    pub dn: String,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VerifyError {
    #[error("Invalid credentials")]
    InvalidCredentials,

    /// Search matched zero or several entries
    #[error("User not found")]
    UserNotFound,

    #[error("Directory unavailable: {0}")]
    DirectoryUnavailable(String),
}

impl From<DirectoryError> for VerifyError {
    fn from(err: DirectoryError) -> Self {
        match err {
            DirectoryError::Unavailable(msg) | DirectoryError::Timeout(msg) => {
                VerifyError::DirectoryUnavailable(msg)
            }
            DirectoryError::InvalidCredentials => VerifyError::InvalidCredentials,
            other => {
                warn!("Directory error during verification: {}", other);
                VerifyError::InvalidCredentials
            }
        }
    }
}

pub type VerifyResult = Result<VerifiedIdentity, VerifyError>;

/// Configured verification strategy
pub enum AuthenticationStrategy {
    SimpleBind(SimpleBind),
    SearchAndBind(SearchAndBind),
    SearchAndCompare(SearchAndCompare),
}

impl AuthenticationStrategy {
    pub fn from_config(client: Arc<dyn DirectoryClient>, config: &DirectoryConfigSection) -> Self {
        match config.strategy {
            BindStrategy::SimpleBind => AuthenticationStrategy::SimpleBind(SimpleBind {
                client,
                dn_patterns: config.user_dn_patterns.clone(),
            }),
            BindStrategy::SearchAndBind => AuthenticationStrategy::SearchAndBind(SearchAndBind {
                search: UserSearch::from_config(client, config),
            }),
            BindStrategy::SearchAndCompare => {
                AuthenticationStrategy::SearchAndCompare(SearchAndCompare {
                    search: UserSearch::from_config(client, config),
                    password_attribute: config.password_attribute.clone(),
                    encoding: config.password_encoding,
                })
            }
        }
    }

    pub fn kind(&self) -> BindStrategy {
        match self {
            AuthenticationStrategy::SimpleBind(_) => BindStrategy::SimpleBind,
            AuthenticationStrategy::SearchAndBind(_) => BindStrategy::SearchAndBind,
            AuthenticationStrategy::SearchAndCompare(_) => BindStrategy::SearchAndCompare,
        }
    }

    /// Prove `secret` for `username`
    pub async fn verify(&self, username: &str, secret: &str) -> VerifyResult {
        // an empty password would turn the bind into an anonymous bind
        if secret.is_empty() {
            debug!(username, "Rejecting empty password");
            return Err(VerifyError::InvalidCredentials);
        }

        match self {
            AuthenticationStrategy::SimpleBind(s) => s.verify(username, secret).await,
            AuthenticationStrategy::SearchAndBind(s) => s.verify(username, secret).await,
            AuthenticationStrategy::SearchAndCompare(s) => s.verify(username, secret).await,
        }
    }
}

/// Bind as each DN pattern in turn
pub struct SimpleBind {
    client: Arc<dyn DirectoryClient>,
    dn_patterns: Vec<String>,
}

impl SimpleBind {
    pub fn new(client: Arc<dyn DirectoryClient>, dn_patterns: Vec<String>) -> Self {
        Self { client, dn_patterns }
    }

    async fn verify(&self, username: &str, secret: &str) -> VerifyResult {
        for pattern in &self.dn_patterns {
            let dn = build_user_dn(pattern, username);
            match self.client.bind(&dn, secret).await {
                Ok(()) => {
                    debug!("Simple bind succeeded as {}", dn);
                    return Ok(VerifiedIdentity { dn });
                }
                Err(DirectoryError::InvalidCredentials) => continue,
                Err(e) => return Err(e.into()),
            }
        }

        Err(VerifyError::InvalidCredentials)
    }
}

/// Service-account search that must resolve to exactly one DN
struct UserSearch {
    client: Arc<dyn DirectoryClient>,
    base: String,
    filter: String,
}

impl UserSearch {
    fn from_config(client: Arc<dyn DirectoryClient>, config: &DirectoryConfigSection) -> Self {
        Self {
            client,
            base: config.user_search_base.clone(),
            filter: config.user_search_filter.clone(),
        }
    }

    async fn resolve_dn(&self, username: &str) -> Result<String, VerifyError> {
        let filter = build_user_filter(&self.filter, username);
        debug!("Searching for user with filter: {}", filter);

        let mut entries = self.client.search(&self.base, &filter, &[NO_ATTRIBUTES]).await?;

        if entries.len() != 1 {
            debug!(username, matches = entries.len(), "User search did not resolve to one entry");
            return Err(VerifyError::UserNotFound);
        }

        let dn = entries.remove(0).dn;
        debug!("Found user DN: {}", dn);
        Ok(dn)
    }
}

/// Resolve the DN, then bind as it
pub struct SearchAndBind {
    search: UserSearch,
}

impl SearchAndBind {
    pub fn new(client: Arc<dyn DirectoryClient>, base: impl Into<String>, filter: impl Into<String>) -> Self {
        Self {
            search: UserSearch {
                client,
                base: base.into(),
                filter: filter.into(),
            },
        }
    }

    async fn verify(&self, username: &str, secret: &str) -> VerifyResult {
        let dn = self.search.resolve_dn(username).await?;
        self.search.client.bind(&dn, secret).await?;
        Ok(VerifiedIdentity { dn })
    }
}

/// Resolve the DN, then compare the stored password attribute
pub struct SearchAndCompare {
    search: UserSearch,
    password_attribute: String,
    encoding: PasswordEncoding,
}

impl SearchAndCompare {
    pub fn new(
        client: Arc<dyn DirectoryClient>,
        base: impl Into<String>,
        filter: impl Into<String>,
        password_attribute: impl Into<String>,
        encoding: PasswordEncoding,
    ) -> Self {
        Self {
            search: UserSearch {
                client,
                base: base.into(),
                filter: filter.into(),
            },
            password_attribute: password_attribute.into(),
            encoding,
        }
    }

    async fn verify(&self, username: &str, secret: &str) -> VerifyResult {
        let dn = self.search.resolve_dn(username).await?;

        let presented = match self.encoding {
            PasswordEncoding::Plain => secret.to_string(),
            PasswordEncoding::Sha => keyward_crypto::ldap_sha_password(secret),
        };

        if self
            .search
            .client
            .compare(&dn, &self.password_attribute, &presented)
            .await?
        {
            Ok(VerifiedIdentity { dn })
        } else {
            Err(VerifyError::InvalidCredentials)
        }
    }
}
