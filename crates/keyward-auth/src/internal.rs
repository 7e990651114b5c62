//! Internal credential store provider

use crate::provider::AuthenticationProvider;
use async_trait::async_trait;
use keyward_core::types::{AuthenticationOrigin, Credential, PrincipalResult};
use keyward_core::{Error, Result};
use keyward_store::UserStore;
use std::sync::Arc;
use tracing::{debug, info};

/// Verifies against stored password hashes; scopes come from the store
pub struct InternalAuthenticationProvider {
    store: Arc<dyn UserStore>,
}

impl InternalAuthenticationProvider {
    pub fn new(store: Arc<dyn UserStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl AuthenticationProvider for InternalAuthenticationProvider {
    fn name(&self) -> &'static str {
        "internal"
    }

    fn origin(&self) -> AuthenticationOrigin {
        AuthenticationOrigin::Internal
    }

    async fn authenticate(&self, credential: &Credential) -> Result<PrincipalResult> {
        let username = credential.username.as_str();

        if credential.secret().is_empty()
            || !self.store.verify_password(username, credential.secret()).await?
        {
            debug!(username, "Internal verification failed");
            return Err(Error::InvalidCredentials);
        }

        let scopes = self.store.scopes_for(username).await?;
        info!(username, scopes = scopes.len(), "Internal authentication succeeded");

        Ok(PrincipalResult::new(username, AuthenticationOrigin::Internal).with_scopes(scopes))
    }
}
