//! Ordered provider chain
//!
//! Providers are tried in configured order and the first success wins. The
//! winner's origin is fixed by the provider that succeeded. A directory
//! success is post-processed against the internal store: the identity is
//! provisioned as a shadow user on first sight and any scopes recorded for
//! the same username are merged in. Internal successes are returned as is.

use crate::internal::InternalAuthenticationProvider;
use crate::ldap::{DirectoryAuthenticationProvider, DirectoryClient, LdapClient};
use crate::provider::AuthenticationProvider;
use keyward_core::config::ProviderKind;
use keyward_core::types::{AuthenticationOrigin, Credential, PrincipalResult, ScopeSet};
use keyward_core::{Error, KeywardConfig, Result};
use keyward_store::UserStore;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

pub struct AuthenticationManagerChain {
    providers: Vec<Arc<dyn AuthenticationProvider>>,
    store: Option<Arc<dyn UserStore>>,
    default_directory_scopes: Vec<String>,
    fail_fast_on_directory_unavailable: bool,
}

impl AuthenticationManagerChain {
    /// Chain without an internal store; directory results are not merged
    pub fn new(providers: Vec<Arc<dyn AuthenticationProvider>>) -> Self {
        Self {
            providers,
            store: None,
            default_directory_scopes: Vec::new(),
            fail_fast_on_directory_unavailable: false,
        }
    }

    /// Merge internally recorded scopes into directory successes
    pub fn with_user_store(mut self, store: Arc<dyn UserStore>, default_scopes: Vec<String>) -> Self {
        self.store = Some(store);
        self.default_directory_scopes = default_scopes;
        self
    }

    pub fn fail_fast_on_directory_unavailable(mut self, fail_fast: bool) -> Self {
        self.fail_fast_on_directory_unavailable = fail_fast;
        self
    }

    /// Assemble the chain described by a validated configuration.
    ///
    /// `directory` overrides the `ldap3` client built from `config.directory`.
    pub fn from_config(
        config: &KeywardConfig,
        store: Arc<dyn UserStore>,
        directory: Option<Arc<dyn DirectoryClient>>,
    ) -> Result<Self> {
        config.validate()?;

        let mut providers: Vec<Arc<dyn AuthenticationProvider>> = Vec::new();
        let mut directory = directory;

        for kind in &config.chain.providers {
            match kind {
                ProviderKind::Internal => {
                    providers.push(Arc::new(InternalAuthenticationProvider::new(store.clone())));
                }
                ProviderKind::Directory => {
                    let client: Arc<dyn DirectoryClient> = match directory.take() {
                        Some(client) => client,
                        None => Arc::new(LdapClient::new(&config.directory)),
                    };
                    providers.push(Arc::new(DirectoryAuthenticationProvider::from_config(
                        client,
                        &config.directory,
                    )));
                }
            }
        }

        info!(
            providers = ?config.chain.providers,
            strategy = ?config.directory.strategy,
            policy = ?config.directory.groups.policy,
            "Authentication chain configured"
        );

        Ok(Self::new(providers)
            .with_user_store(store, config.chain.default_directory_scopes.clone())
            .fail_fast_on_directory_unavailable(config.chain.fail_fast_on_directory_unavailable))
    }

    pub async fn authenticate(&self, username: &str, password: &str) -> Result<PrincipalResult> {
        self.authenticate_credential(&Credential::new(username, password))
            .await
    }

    pub async fn authenticate_credential(&self, credential: &Credential) -> Result<PrincipalResult> {
        let username = credential.username.as_str();

        for provider in &self.providers {
            match provider.authenticate(credential).await {
                Ok(mut principal) => {
                    principal.origin = provider.origin();
                    if principal.origin == AuthenticationOrigin::Directory {
                        self.merge_internal_scopes(&mut principal).await?;
                    }

                    info!(
                        username,
                        provider = provider.name(),
                        origin = %principal.origin,
                        "Authenticated"
                    );
                    return Ok(principal);
                }
                Err(Error::DirectoryUnavailable(msg)) if self.fail_fast_on_directory_unavailable => {
                    warn!(username, provider = provider.name(), "Directory unavailable, not falling through");
                    return Err(Error::DirectoryUnavailable(msg));
                }
                Err(e) if e.is_credential_rejection() => {
                    debug!(username, provider = provider.name(), "Provider rejected credential");
                }
                Err(e) => {
                    warn!(username, provider = provider.name(), "Provider failed: {}", e);
                }
            }
        }

        debug!(username, "No provider accepted the credential");
        Err(Error::NoProviderSucceeded)
    }

    /// Origin recorded for a username, `None` when it was never seen
    pub async fn origin_of(&self, username: &str) -> Result<Option<AuthenticationOrigin>> {
        match &self.store {
            Some(store) => store.origin_of(username).await,
            None => Ok(None),
        }
    }

    /// A store failure here fails the whole call rather than returning
    /// directory scopes alone
    async fn merge_internal_scopes(&self, principal: &mut PrincipalResult) -> Result<()> {
        let Some(store) = &self.store else {
            return Ok(());
        };

        match self.recorded_scopes(store.as_ref(), &principal.username).await {
            Ok(scopes) => {
                debug!(username = %principal.username, internal = scopes.len(), "Merging recorded scopes");
                principal.merge_scopes(scopes);
                Ok(())
            }
            Err(e) => {
                error!(username = %principal.username, "Failed to merge recorded scopes: {}", e);
                Err(Error::NoProviderSucceeded)
            }
        }
    }

    async fn recorded_scopes(&self, store: &dyn UserStore, username: &str) -> Result<ScopeSet> {
        store
            .provision_shadow_user(
                username,
                AuthenticationOrigin::Directory,
                &self.default_directory_scopes,
            )
            .await?;
        store.scopes_for(username).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing;
    use async_trait::async_trait;
    use keyward_core::config::StoreConfig;
    use keyward_core::types::UserRecord;
    use keyward_store::SqliteUserStore;
    use std::sync::atomic::{AtomicUsize, Ordering};

    async fn store() -> Arc<dyn UserStore> {
        let store = SqliteUserStore::new(&StoreConfig {
            database_url: "sqlite::memory:".to_string(),
            max_connections: 1,
        })
        .await
        .unwrap();

        store
            .create_user(
                &UserRecord::internal("marissa", keyward_crypto::hash_password("koala"))
                    .with_scopes(["openid", "uaa.user"]),
            )
            .await
            .unwrap();

        Arc::new(store)
    }

    fn config() -> KeywardConfig {
        KeywardConfig {
            directory: testing::directory_config(),
            ..Default::default()
        }
    }

    async fn chained(directory: &Arc<testing::InMemoryDirectory>) -> AuthenticationManagerChain {
        AuthenticationManagerChain::from_config(&config(), store().await, Some(directory.clone()))
            .unwrap()
    }

    fn directory_only(directory: &Arc<testing::InMemoryDirectory>) -> AuthenticationManagerChain {
        let providers: Vec<Arc<dyn AuthenticationProvider>> = vec![Arc::new(
            DirectoryAuthenticationProvider::from_config(
                directory.clone(),
                &testing::directory_config(),
            ),
        )];
        AuthenticationManagerChain::new(providers)
    }

    fn scopes(values: &[&str]) -> ScopeSet {
        values.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_directory_only_manager_returns_group_scopes() {
        let directory = testing::directory();
        let manager = directory_only(&directory);

        let principal = manager.authenticate("marissa3", "ldap3").await.unwrap();
        assert_eq!(principal.origin, AuthenticationOrigin::Directory);
        assert_eq!(principal.scopes, scopes(&["uaa.admin", "cloud_controller.read"]));
    }

    #[tokio::test]
    async fn test_chained_manager_returns_superset() {
        let directory = testing::directory();
        let manager = chained(&directory).await;

        let principal = manager.authenticate("marissa3", "ldap3").await.unwrap();
        assert_eq!(principal.origin, AuthenticationOrigin::Directory);
        assert_eq!(
            principal.scopes,
            scopes(&[
                "uaa.admin",
                "cloud_controller.read",
                "password.write",
                "scim.userids",
                "approvals.me",
                "cloud_controller.write",
                "scim.me",
                "cloud_controller_service_permissions.read",
                "openid",
                "oauth.approvals",
                "uaa.user",
            ])
        );
    }

    #[tokio::test]
    async fn test_nested_groups_through_chain() {
        let directory = testing::directory();
        let manager = directory_only(&directory);

        let principal = manager.authenticate("marissa4", "ldap4").await.unwrap();
        assert_eq!(principal.scopes, scopes(&["test.read", "test.write", "test.everything"]));
    }

    #[tokio::test]
    async fn test_internal_user_has_internal_origin() {
        let directory = testing::directory();
        let manager = chained(&directory).await;

        let principal = manager.authenticate("marissa", "koala").await.unwrap();
        assert_eq!(principal.origin, AuthenticationOrigin::Internal);
        assert_eq!(principal.scopes, scopes(&["openid", "uaa.user"]));

        // internal successes never reach the directory
        assert_eq!(directory.operation_count(), 0);
    }

    #[tokio::test]
    async fn test_every_provider_failing_is_generic() {
        let directory = testing::directory();
        let manager = chained(&directory).await;

        for (username, password) in [("marissa", "wrong"), ("marissa3", "wrong"), ("nobody", "x")] {
            let err = manager.authenticate(username, password).await.unwrap_err();
            assert!(matches!(err, Error::NoProviderSucceeded), "{}", username);
            assert_eq!(err.to_string(), "Authentication failed");
        }
    }

    #[tokio::test]
    async fn test_recorded_scopes_merged_without_duplicates() {
        let directory = testing::directory();
        let store = store().await;
        store
            .provision_shadow_user("marissa4", AuthenticationOrigin::Directory, &[])
            .await
            .unwrap();
        store
            .grant_scopes("marissa4", &["test.read".to_string(), "scim.me".to_string()])
            .await
            .unwrap();

        let manager =
            AuthenticationManagerChain::from_config(&config(), store, Some(directory.clone()))
                .unwrap();

        let principal = manager.authenticate("marissa4", "ldap4").await.unwrap();
        assert_eq!(
            principal.scopes,
            scopes(&["test.read", "test.write", "test.everything", "scim.me"])
        );
    }

    #[tokio::test]
    async fn test_origin_is_recorded_after_directory_login() {
        let directory = testing::directory();
        let manager = chained(&directory).await;

        assert_eq!(manager.origin_of("marissa3").await.unwrap(), None);
        manager.authenticate("marissa3", "ldap3").await.unwrap();
        assert_eq!(
            manager.origin_of("marissa3").await.unwrap(),
            Some(AuthenticationOrigin::Directory)
        );
        assert_eq!(
            manager.origin_of("marissa").await.unwrap(),
            Some(AuthenticationOrigin::Internal)
        );
    }

    #[tokio::test]
    async fn test_offline_directory_falls_through() {
        let directory = testing::directory();
        directory.set_offline(true);

        let mut config = config();
        config.chain.providers = vec![ProviderKind::Directory, ProviderKind::Internal];
        let manager =
            AuthenticationManagerChain::from_config(&config, store().await, Some(directory.clone()))
                .unwrap();

        let principal = manager.authenticate("marissa", "koala").await.unwrap();
        assert_eq!(principal.origin, AuthenticationOrigin::Internal);

        let err = manager.authenticate("marissa3", "ldap3").await.unwrap_err();
        assert!(matches!(err, Error::NoProviderSucceeded));
    }

    #[tokio::test]
    async fn test_offline_directory_fails_fast_when_configured() {
        let directory = testing::directory();
        directory.set_offline(true);

        let mut config = config();
        config.chain.providers = vec![ProviderKind::Directory, ProviderKind::Internal];
        config.chain.fail_fast_on_directory_unavailable = true;
        let manager =
            AuthenticationManagerChain::from_config(&config, store().await, Some(directory.clone()))
                .unwrap();

        let err = manager.authenticate("marissa", "koala").await.unwrap_err();
        assert!(matches!(err, Error::DirectoryUnavailable(_)));
    }

    #[tokio::test]
    async fn test_invalid_configuration_rejected_at_construction() {
        let mut config = config();
        config.directory.groups.max_search_depth = -1;

        let result = AuthenticationManagerChain::from_config(&config, store().await, None);
        assert!(matches!(result, Err(Error::Configuration(_))));
    }

    /// Always succeeds and claims the wrong origin
    struct Impostor {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl AuthenticationProvider for Impostor {
        fn name(&self) -> &'static str {
            "impostor"
        }

        fn origin(&self) -> AuthenticationOrigin {
            AuthenticationOrigin::Internal
        }

        async fn authenticate(&self, credential: &Credential) -> Result<PrincipalResult> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(PrincipalResult::new(
                credential.username.clone(),
                AuthenticationOrigin::Directory,
            ))
        }
    }

    #[tokio::test]
    async fn test_first_success_wins_and_fixes_origin() {
        let first = Arc::new(Impostor {
            calls: AtomicUsize::new(0),
        });
        let second = Arc::new(Impostor {
            calls: AtomicUsize::new(0),
        });
        let providers: Vec<Arc<dyn AuthenticationProvider>> = vec![first.clone(), second.clone()];
        let manager = AuthenticationManagerChain::new(providers);

        let principal = manager.authenticate("anyone", "anything").await.unwrap();
        assert_eq!(principal.origin, AuthenticationOrigin::Internal);
        assert_eq!(first.calls.load(Ordering::SeqCst), 1);
        assert_eq!(second.calls.load(Ordering::SeqCst), 0);
    }
}
