//! Directory authentication provider
//!
//! Verifies the credential with the configured strategy, then resolves
//! scopes from the verified DN. Every failure reaches the caller as either
//! `InvalidCredentials` or `DirectoryUnavailable`; which step failed is only
//! visible in the logs.

use crate::ldap::client::DirectoryClient;
use crate::ldap::groups::GroupResolver;
use crate::ldap::strategy::{AuthenticationStrategy, VerifyError};
use crate::ldap::types::DirectoryError;
use crate::provider::AuthenticationProvider;
use async_trait::async_trait;
use keyward_core::config::DirectoryConfigSection;
use keyward_core::types::{AuthenticationOrigin, Credential, PrincipalResult};
use keyward_core::{Error, Result};
use std::sync::Arc;
use tracing::{debug, info, warn};

pub struct DirectoryAuthenticationProvider {
    strategy: AuthenticationStrategy,
    resolver: GroupResolver,
}

impl DirectoryAuthenticationProvider {
    pub fn new(strategy: AuthenticationStrategy, resolver: GroupResolver) -> Self {
        Self { strategy, resolver }
    }

    /// Build strategy and resolver over one shared client
    pub fn from_config(client: Arc<dyn DirectoryClient>, config: &DirectoryConfigSection) -> Self {
        Self {
            strategy: AuthenticationStrategy::from_config(client.clone(), config),
            resolver: GroupResolver::new(client, &config.groups),
        }
    }
}

#[async_trait]
impl AuthenticationProvider for DirectoryAuthenticationProvider {
    fn name(&self) -> &'static str {
        "directory"
    }

    fn origin(&self) -> AuthenticationOrigin {
        AuthenticationOrigin::Directory
    }

    async fn authenticate(&self, credential: &Credential) -> Result<PrincipalResult> {
        let username = credential.username.as_str();

        let identity = match self.strategy.verify(username, credential.secret()).await {
            Ok(identity) => identity,
            Err(VerifyError::DirectoryUnavailable(msg)) => {
                warn!(username, "Directory unavailable during verification: {}", msg);
                return Err(Error::DirectoryUnavailable(msg));
            }
            Err(e) => {
                debug!(username, strategy = ?self.strategy.kind(), "Directory verification failed: {}", e);
                return Err(Error::InvalidCredentials);
            }
        };

        let scopes = self
            .resolver
            .resolve_scopes(&identity.dn)
            .await
            .map_err(|e| resolution_failure(username, e))?;

        info!(username, dn = %identity.dn, scopes = scopes.len(), "Directory authentication succeeded");

        Ok(PrincipalResult::new(username, AuthenticationOrigin::Directory).with_scopes(scopes))
    }
}

/// The credential was valid, but scopes could not be computed
fn resolution_failure(username: &str, err: DirectoryError) -> Error {
    warn!(username, "Group resolution failed: {}", err);
    if err.is_unavailable() {
        Error::DirectoryUnavailable(err.to_string())
    } else {
        Error::InvalidCredentials
    }
}
