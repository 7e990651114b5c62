//! LDAP Client implementation
//!
//! `DirectoryClient` is the seam the strategies and the group resolver talk
//! to. `LdapClient` implements it over `ldap3`, opening a fresh connection per
//! operation so concurrent authentications never share a handle.

use crate::ldap::types::*;
use async_trait::async_trait;
use keyward_core::config::DirectoryConfigSection;
use ldap3::{Ldap, LdapConnAsync, LdapConnSettings, Scope, SearchEntry, SearchResult};
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

// LDAP result codes
const RC_SUCCESS: u32 = 0;
const RC_COMPARE_FALSE: u32 = 5;
const RC_COMPARE_TRUE: u32 = 6;
const RC_NO_SUCH_OBJECT: u32 = 32;
const RC_INVALID_CREDENTIALS: u32 = 49;
const RC_UNWILLING_TO_PERFORM: u32 = 53;

/// Bind, search, and compare against an external directory
#[async_trait]
pub trait DirectoryClient: Send + Sync {
    /// Authenticate as `dn`. `Err(InvalidCredentials)` when the server rejects it.
    async fn bind(&self, dn: &str, secret: &str) -> DirectoryResult<()>;

    /// Subtree search below `base`
    async fn search(
        &self,
        base: &str,
        filter: &str,
        attributes: &[&str],
    ) -> DirectoryResult<Vec<DirectoryEntry>>;

    /// Compare an attribute value; `Ok(false)` on mismatch
    async fn compare(&self, dn: &str, attribute: &str, value: &str) -> DirectoryResult<bool>;
}

/// `ldap3` backed directory client
pub struct LdapClient {
    server_url: String,
    start_tls: bool,
    bind_dn: String,
    bind_password: String,
    timeout: Duration,
}

impl LdapClient {
    /// Create a new LDAP client
    pub fn new(config: &DirectoryConfigSection) -> Self {
        Self {
            server_url: config.server_url.clone(),
            start_tls: config.start_tls,
            bind_dn: config.bind_dn.clone(),
            bind_password: config.bind_password.clone(),
            timeout: config.timeout(),
        }
    }

    /// Create LDAP connection with proper TLS settings
    async fn connect(&self) -> DirectoryResult<Ldap> {
        let settings = LdapConnSettings::new()
            .set_conn_timeout(self.timeout)
            .set_starttls(self.start_tls);

        debug!("Connecting to LDAP server: {}", self.server_url);

        let (conn, ldap) = self
            .timed("connect", LdapConnAsync::with_settings(settings, &self.server_url))
            .await?;

        ldap3::drive!(conn);
        Ok(ldap)
    }

    /// Connect and bind with the service account, if one is configured
    async fn connect_as_service(&self) -> DirectoryResult<Ldap> {
        let mut ldap = self.connect().await?;

        if self.bind_dn.is_empty() {
            return Ok(ldap);
        }

        let result = self
            .timed("service bind", ldap.simple_bind(&self.bind_dn, &self.bind_password))
            .await?;

        if result.rc != RC_SUCCESS {
            let _ = ldap.unbind().await;
            warn!(rc = result.rc, "Service account bind rejected");
            return Err(DirectoryError::Protocol {
                rc: result.rc,
                message: format!("Service account bind failed: {}", result.text),
            });
        }

        Ok(ldap)
    }

    /// Bound every directory round trip by the configured timeout
    async fn timed<T, F>(&self, operation: &str, fut: F) -> DirectoryResult<T>
    where
        F: Future<Output = ldap3::result::Result<T>>,
    {
        match tokio::time::timeout(self.timeout, fut).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => Err(DirectoryError::Unavailable(format!("{} failed: {}", operation, e))),
            Err(_) => Err(DirectoryError::Timeout(format!(
                "{} exceeded {:?}",
                operation, self.timeout
            ))),
        }
    }
}

#[async_trait]
impl DirectoryClient for LdapClient {
    async fn bind(&self, dn: &str, secret: &str) -> DirectoryResult<()> {
        let mut ldap = self.connect().await?;
        let result = self.timed("bind", ldap.simple_bind(dn, secret)).await;
        let _ = ldap.unbind().await;
        let result = result?;

        match result.rc {
            RC_SUCCESS => Ok(()),
            RC_INVALID_CREDENTIALS | RC_NO_SUCH_OBJECT | RC_UNWILLING_TO_PERFORM => {
                debug!(rc = result.rc, "Bind rejected for {}", dn);
                Err(DirectoryError::InvalidCredentials)
            }
            rc => Err(DirectoryError::Protocol {
                rc,
                message: result.text,
            }),
        }
    }

    async fn search(
        &self,
        base: &str,
        filter: &str,
        attributes: &[&str],
    ) -> DirectoryResult<Vec<DirectoryEntry>> {
        let mut ldap = self.connect_as_service().await?;

        debug!("Searching {} with filter: {}", base, filter);

        let result = self
            .timed(
                "search",
                ldap.search(base, Scope::Subtree, filter, attributes.to_vec()),
            )
            .await;
        let _ = ldap.unbind().await;
        let SearchResult(entries, result) = result?;

        match result.rc {
            RC_SUCCESS => Ok(entries
                .into_iter()
                .map(|entry| {
                    let entry = SearchEntry::construct(entry);
                    DirectoryEntry {
                        dn: entry.dn,
                        attributes: entry.attrs.into_iter().collect(),
                    }
                })
                .collect()),
            RC_NO_SUCH_OBJECT => Err(DirectoryError::NoSuchObject(base.to_string())),
            rc => Err(DirectoryError::Protocol {
                rc,
                message: result.text,
            }),
        }
    }

    async fn compare(&self, dn: &str, attribute: &str, value: &str) -> DirectoryResult<bool> {
        let mut ldap = self.connect_as_service().await?;
        let result = self.timed("compare", ldap.compare(dn, attribute, value)).await;
        let _ = ldap.unbind().await;
        let result = result?.0;

        match result.rc {
            RC_COMPARE_TRUE => Ok(true),
            RC_COMPARE_FALSE => Ok(false),
            RC_NO_SUCH_OBJECT => Err(DirectoryError::NoSuchObject(dn.to_string())),
            rc => Err(DirectoryError::Protocol {
                rc,
                message: result.text,
            }),
        }
    }
}
