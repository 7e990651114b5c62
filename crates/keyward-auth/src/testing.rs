//! In-memory directory for tests
//!
//! Holds a small fixed tree under `dc=test,dc=com` and understands only
//! equality filters of the form `(attr=value)`.

use crate::ldap::{DirectoryClient, DirectoryEntry, DirectoryError, DirectoryResult};
use async_trait::async_trait;
use keyward_core::config::{
    BindStrategy, DirectoryConfigSection, GroupSearchConfig, ScopeMappingPolicy,
};
use parking_lot::{Mutex, RwLock};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

pub const SERVICE_DN: &str = "cn=admin,dc=test,dc=com";
pub const SERVICE_PASSWORD: &str = "adminsecret";

pub const MARISSA2_DN: &str = "uid=marissa2,ou=Users,dc=test,dc=com";
pub const MARISSA3_DN: &str = "uid=marissa3,ou=Users,dc=test,dc=com";
pub const MARISSA4_DN: &str = "uid=marissa4,ou=Users,dc=test,dc=com";

const GROUP_BASE: &str = "ou=scopes,dc=test,dc=com";

#[derive(Default)]
pub struct InMemoryDirectory {
    entries: RwLock<Vec<DirectoryEntry>>,
    offline: AtomicBool,
    search_failure: Mutex<Option<(usize, DirectoryError)>>,
    operations: AtomicUsize,
    searches: AtomicUsize,
}

impl InMemoryDirectory {
    pub fn add_entry(&self, entry: DirectoryEntry) {
        self.entries.write().push(entry);
    }

    pub fn add_user(&self, dn: &str, uid: &str, password: &str) {
        self.add_entry(
            DirectoryEntry::new(dn)
                .with_attribute("objectClass", ["inetOrgPerson"])
                .with_attribute("uid", [uid])
                .with_attribute("userPassword", [password]),
        );
    }

    fn add_group(&self, name: &str, members: &[&str]) {
        self.add_entry(
            DirectoryEntry::new(group_dn(name))
                .with_attribute("objectClass", ["groupOfNames"])
                .with_attribute("cn", [name])
                .with_attribute("member", members.iter().copied()),
        );
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Let `n` searches through, then report every later one as unavailable
    pub fn fail_searches_after(&self, n: usize) {
        *self.search_failure.lock() =
            Some((n, DirectoryError::Unavailable("connection reset".to_string())));
    }

    /// Let `n` searches through, then report every later one as timed out
    pub fn time_out_searches_after(&self, n: usize) {
        *self.search_failure.lock() =
            Some((n, DirectoryError::Timeout("search exceeded 1s".to_string())));
    }

    pub fn operation_count(&self) -> usize {
        self.operations.load(Ordering::SeqCst)
    }

    pub fn search_count(&self) -> usize {
        self.searches.load(Ordering::SeqCst)
    }

    fn begin(&self) -> DirectoryResult<()> {
        self.operations.fetch_add(1, Ordering::SeqCst);
        if self.offline.load(Ordering::SeqCst) {
            return Err(DirectoryError::Unavailable("connection refused".to_string()));
        }
        Ok(())
    }

    fn find(&self, dn: &str) -> Option<DirectoryEntry> {
        let dn = dn.to_ascii_lowercase();
        self.entries
            .read()
            .iter()
            .find(|entry| entry.dn.to_ascii_lowercase() == dn)
            .cloned()
    }
}

#[async_trait]
impl DirectoryClient for InMemoryDirectory {
    async fn bind(&self, dn: &str, secret: &str) -> DirectoryResult<()> {
        self.begin()?;

        match self.find(dn) {
            Some(entry) if entry.values("userPassword").iter().any(|p| p == secret) => Ok(()),
            _ => Err(DirectoryError::InvalidCredentials),
        }
    }

    async fn search(
        &self,
        base: &str,
        filter: &str,
        attributes: &[&str],
    ) -> DirectoryResult<Vec<DirectoryEntry>> {
        self.begin()?;

        let seen = self.searches.fetch_add(1, Ordering::SeqCst);
        if let Some((limit, err)) = self.search_failure.lock().as_ref() {
            if seen >= *limit {
                return Err(err.clone());
            }
        }

        let (attribute, value) = parse_equality_filter(filter)?;
        let base = base.to_ascii_lowercase();

        Ok(self
            .entries
            .read()
            .iter()
            .filter(|entry| {
                let dn = entry.dn.to_ascii_lowercase();
                dn == base || dn.ends_with(&format!(",{}", base))
            })
            .filter(|entry| {
                entry
                    .values(&attribute)
                    .iter()
                    .any(|v| v.eq_ignore_ascii_case(&value))
            })
            .map(|entry| project(entry, attributes))
            .collect())
    }

    async fn compare(&self, dn: &str, attribute: &str, value: &str) -> DirectoryResult<bool> {
        self.begin()?;

        let entry = self
            .find(dn)
            .ok_or_else(|| DirectoryError::NoSuchObject(dn.to_string()))?;
        Ok(entry.values(attribute).iter().any(|v| v == value))
    }
}

/// Keep only the requested attributes; "1.1" keeps none
fn project(entry: &DirectoryEntry, attributes: &[&str]) -> DirectoryEntry {
    let mut projected = DirectoryEntry::new(entry.dn.clone());
    for (name, values) in &entry.attributes {
        if attributes.iter().any(|a| a.eq_ignore_ascii_case(name)) {
            projected.attributes.insert(name.clone(), values.clone());
        }
    }
    projected
}

fn parse_equality_filter(filter: &str) -> DirectoryResult<(String, String)> {
    let unsupported = || DirectoryError::Protocol {
        rc: 53,
        message: format!("unsupported filter {}", filter),
    };

    let inner = filter
        .strip_prefix('(')
        .and_then(|f| f.strip_suffix(')'))
        .ok_or_else(unsupported)?;
    let (attribute, value) = inner.split_once('=').ok_or_else(unsupported)?;

    Ok((attribute.to_string(), unescape(value).ok_or_else(unsupported)?))
}

/// Undo `\XX` filter escapes
fn unescape(value: &str) -> Option<String> {
    let mut bytes = Vec::with_capacity(value.len());
    let mut rest = value.as_bytes();

    while let Some((&b, tail)) = rest.split_first() {
        if b == b'\\' {
            let hex = std::str::from_utf8(tail.get(..2)?).ok()?;
            bytes.push(u8::from_str_radix(hex, 16).ok()?);
            rest = &tail[2..];
        } else {
            bytes.push(b);
            rest = tail;
        }
    }

    String::from_utf8(bytes).ok()
}

pub fn group_dn(name: &str) -> String {
    format!("cn={},{}", name, GROUP_BASE)
}

/// Directory populated with the standard users and groups
pub fn directory() -> Arc<InMemoryDirectory> {
    let directory = InMemoryDirectory::default();

    directory.add_entry(
        DirectoryEntry::new(SERVICE_DN).with_attribute("userPassword", [SERVICE_PASSWORD]),
    );

    directory.add_user(MARISSA2_DN, "marissa2", "ldap");
    directory.add_user(MARISSA3_DN, "marissa3", "ldap3");
    directory.add_user(MARISSA4_DN, "marissa4", "ldap4");

    directory.add_entry(
        DirectoryEntry::new("uid=shared1,ou=Users,dc=test,dc=com")
            .with_attribute("uid", ["shared1"])
            .with_attribute("mail", ["shared@test.com"])
            .with_attribute("userPassword", ["ldap3"]),
    );
    directory.add_entry(
        DirectoryEntry::new("uid=shared2,ou=Users,dc=test,dc=com")
            .with_attribute("uid", ["shared2"])
            .with_attribute("mail", ["shared@test.com"])
            .with_attribute("userPassword", ["ldap3"]),
    );

    // flat
    directory.add_group("uaa.admin", &[MARISSA3_DN]);
    directory.add_group("cloud_controller.read", &[MARISSA3_DN]);

    // nested chain
    directory.add_group("test.read", &[MARISSA4_DN]);
    directory.add_group("test.write", &[&group_dn("test.read")]);
    directory.add_group("test.everything", &[&group_dn("test.write")]);

    // cycle
    directory.add_group("cycle.a", &[MARISSA2_DN, &group_dn("cycle.b")]);
    directory.add_group("cycle.b", &[&group_dn("cycle.a")]);

    Arc::new(directory)
}

/// Settings that point every strategy at [`directory`]
pub fn directory_config() -> DirectoryConfigSection {
    DirectoryConfigSection {
        bind_dn: SERVICE_DN.to_string(),
        bind_password: SERVICE_PASSWORD.to_string(),
        strategy: BindStrategy::SearchAndBind,
        user_dn_patterns: vec!["uid={username},ou=Users,dc=test,dc=com".to_string()],
        user_search_base: "dc=test,dc=com".to_string(),
        user_search_filter: "(uid={username})".to_string(),
        groups: GroupSearchConfig {
            policy: ScopeMappingPolicy::GroupNameAsScope,
            search_base: GROUP_BASE.to_string(),
            search_filter: "(member={dn})".to_string(),
            ..Default::default()
        },
        ..Default::default()
    }
}
