//! User store trait
//!
//! Defines the interface the authentication providers and the provider
//! chain use to reach internally recorded users and scopes.

use async_trait::async_trait;
use keyward_core::types::{AuthenticationOrigin, ScopeSet, UserRecord};
use keyward_core::Result;

/// Internal user store
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn create_user(&self, user: &UserRecord) -> Result<()>;
    async fn get_user(&self, username: &str) -> Result<Option<UserRecord>>;
    async fn list_users(&self) -> Result<Vec<UserRecord>>;

    /// Scopes recorded for a username, empty when the username is unknown
    async fn scopes_for(&self, username: &str) -> Result<ScopeSet>;
    async fn grant_scopes(&self, username: &str, scopes: &[String]) -> Result<()>;

    async fn origin_of(&self, username: &str) -> Result<Option<AuthenticationOrigin>>;

    /// Record a username first seen through an external origin.
    ///
    /// Seeds it with `default_scopes`. Returns false, changing nothing, when
    /// the username is already recorded.
    async fn provision_shadow_user(
        &self,
        username: &str,
        origin: AuthenticationOrigin,
        default_scopes: &[String],
    ) -> Result<bool>;

    /// Check a secret against the stored hash of an internal user
    async fn verify_password(&self, username: &str, secret: &str) -> Result<bool> {
        let user = match self.get_user(username).await? {
            Some(user) if user.can_verify_password() => user,
            _ => return Ok(false),
        };

        Ok(user
            .password_hash
            .as_deref()
            .map(|hash| keyward_crypto::verify_password(secret, hash))
            .unwrap_or(false))
    }
}
