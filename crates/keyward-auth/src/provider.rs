//! Provider abstraction shared by the internal and directory providers

use async_trait::async_trait;
use keyward_core::types::{AuthenticationOrigin, Credential, PrincipalResult};
use keyward_core::Result;

/// Anything that can verify a credential and produce a principal.
///
/// A provider fails with `InvalidCredentials` when it rejects the credential
/// and `DirectoryUnavailable` when its backend cannot be reached. Results are
/// always tagged with [`AuthenticationProvider::origin`].
#[async_trait]
pub trait AuthenticationProvider: Send + Sync {
    /// Short name for logs
    fn name(&self) -> &'static str;

    fn origin(&self) -> AuthenticationOrigin;

    async fn authenticate(&self, credential: &Credential) -> Result<PrincipalResult>;
}
