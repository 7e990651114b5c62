//! Configuration for Keyward
//!
//! Loaded once at startup (TOML file or `KEYWARD_*` environment), validated,
//! and then shared read-only for the lifetime of the process.

use crate::{Error, Result, DEFAULT_MAX_SEARCH_DEPTH, DN_PLACEHOLDER, USERNAME_PLACEHOLDER};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct KeywardConfig {
    #[serde(default)]
    pub directory: DirectoryConfigSection,

    #[serde(default)]
    pub store: StoreConfig,

    #[serde(default)]
    pub chain: ChainConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

impl KeywardConfig {
    pub fn from_file(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Configuration(format!("Failed to read config: {}", e)))?;

        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content)
            .map_err(|e| Error::Configuration(format!("Failed to parse config: {}", e)))
    }

    pub fn from_env() -> Result<Self> {
        Self::from_vars(|key| std::env::var(key).ok())
    }

    /// Defaults overridden by whichever `KEYWARD_*` variables `var` returns
    pub fn from_vars<F>(var: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(url) = var("KEYWARD_LDAP_URL") {
            config.directory.server_url = url;
        }
        if let Some(start_tls) = var("KEYWARD_LDAP_START_TLS") {
            config.directory.start_tls = parse_value("start TLS flag", &start_tls)?;
        }
        if let Some(dn) = var("KEYWARD_LDAP_BIND_DN") {
            config.directory.bind_dn = dn;
        }
        if let Some(password) = var("KEYWARD_LDAP_BIND_PASSWORD") {
            config.directory.bind_password = password;
        }
        if let Some(timeout) = var("KEYWARD_LDAP_TIMEOUT_SECONDS") {
            config.directory.timeout_seconds = parse_value("timeout", &timeout)?;
        }
        if let Some(strategy) = var("KEYWARD_LDAP_STRATEGY") {
            config.directory.strategy = strategy.parse()?;
        }
        if let Some(patterns) = var("KEYWARD_LDAP_USER_DN_PATTERNS") {
            config.directory.user_dn_patterns = split_list(&patterns, ';');
        }
        if let Some(base) = var("KEYWARD_LDAP_USER_SEARCH_BASE") {
            config.directory.user_search_base = base;
        }
        if let Some(filter) = var("KEYWARD_LDAP_USER_SEARCH_FILTER") {
            config.directory.user_search_filter = filter;
        }
        if let Some(attribute) = var("KEYWARD_LDAP_PASSWORD_ATTRIBUTE") {
            config.directory.password_attribute = attribute;
        }
        if let Some(encoding) = var("KEYWARD_LDAP_PASSWORD_ENCODING") {
            config.directory.password_encoding = encoding.parse()?;
        }
        if let Some(policy) = var("KEYWARD_LDAP_GROUP_POLICY") {
            config.directory.groups.policy = policy.parse()?;
        }
        if let Some(base) = var("KEYWARD_LDAP_GROUP_SEARCH_BASE") {
            config.directory.groups.search_base = base;
        }
        if let Some(filter) = var("KEYWARD_LDAP_GROUP_SEARCH_FILTER") {
            config.directory.groups.search_filter = filter;
        }
        if let Some(attribute) = var("KEYWARD_LDAP_GROUP_SCOPE_ATTRIBUTE") {
            config.directory.groups.scope_attribute = attribute;
        }
        if let Some(depth) = var("KEYWARD_LDAP_GROUP_MAX_SEARCH_DEPTH") {
            config.directory.groups.max_search_depth = parse_value("max search depth", &depth)?;
        }
        if let Some(url) = var("KEYWARD_DATABASE_URL") {
            config.store.database_url = url;
        }
        if let Some(providers) = var("KEYWARD_PROVIDERS") {
            config.chain.providers = split_list(&providers, ',')
                .iter()
                .map(|p| p.parse())
                .collect::<Result<Vec<_>>>()?;
        }
        if let Some(fail_fast) = var("KEYWARD_FAIL_FAST_ON_DIRECTORY_UNAVAILABLE") {
            config.chain.fail_fast_on_directory_unavailable =
                parse_value("fail fast flag", &fail_fast)?;
        }
        if let Some(scopes) = var("KEYWARD_DEFAULT_DIRECTORY_SCOPES") {
            config.chain.default_directory_scopes = split_list(&scopes, ',');
        }
        if let Some(level) = var("KEYWARD_LOG_LEVEL") {
            config.logging.level = level;
        }

        Ok(config)
    }

    /// Reject configurations that could only fail at request time
    pub fn validate(&self) -> Result<()> {
        self.chain.validate()?;

        if self.chain.providers.contains(&ProviderKind::Directory) {
            self.directory.validate()?;
        }

        self.store.validate()
    }
}

fn split_list(value: &str, separator: char) -> Vec<String> {
    value
        .split(separator)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn parse_value<T>(field: &str, value: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e| Error::Configuration(format!("Invalid {} '{}': {}", field, value, e)))
}

fn require_placeholder(field: &str, value: &str, placeholder: &str) -> Result<()> {
    if value.is_empty() {
        return Err(Error::Configuration(format!("{} is required", field)));
    }
    if !value.contains(placeholder) {
        return Err(Error::Configuration(format!(
            "{} must contain {} placeholder",
            field, placeholder
        )));
    }
    Ok(())
}

// ============================================================================
// Directory
// ============================================================================

/// How a password is proven against the directory
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum BindStrategy {
    /// Bind as a DN built from a pattern
    SimpleBind,
    /// Search for the user's DN, then bind as it
    #[default]
    SearchAndBind,
    /// Search for the user's DN, then compare the password attribute
    SearchAndCompare,
}

impl FromStr for BindStrategy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "simple_bind" | "simple-bind" => Ok(BindStrategy::SimpleBind),
            "search_and_bind" | "search-and-bind" => Ok(BindStrategy::SearchAndBind),
            "search_and_compare" | "search-and-compare" => Ok(BindStrategy::SearchAndCompare),
            other => Err(Error::Configuration(format!("Unknown bind strategy: {}", other))),
        }
    }
}

/// How group membership turns into scopes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ScopeMappingPolicy {
    /// Directory groups grant nothing
    #[default]
    NoMapping,
    /// Every visited group grants the value of its scope attribute
    GroupNameAsScope,
}

impl FromStr for ScopeMappingPolicy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "no_mapping" | "null" | "none" => Ok(ScopeMappingPolicy::NoMapping),
            "group_name_as_scope" | "groups-as-scopes" => {
                Ok(ScopeMappingPolicy::GroupNameAsScope)
            }
            other => Err(Error::Configuration(format!(
                "Unknown scope mapping policy: {}",
                other
            ))),
        }
    }
}

/// Encoding applied to the presented secret before an LDAP compare
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PasswordEncoding {
    /// Compare the secret as given
    #[default]
    Plain,
    /// `{SHA}` + base64(SHA-1(secret))
    Sha,
}

impl FromStr for PasswordEncoding {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "plain" | "none" => Ok(PasswordEncoding::Plain),
            "sha" => Ok(PasswordEncoding::Sha),
            other => Err(Error::Configuration(format!("Unknown password encoding: {}", other))),
        }
    }
}

/// LDAP directory configuration section
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirectoryConfigSection {
    /// LDAP server URL (ldap:// or ldaps://)
    #[serde(default = "default_ldap_url")]
    pub server_url: String,

    /// Use STARTTLS
    #[serde(default)]
    pub start_tls: bool,

    /// Service account used for searches and compares
    #[serde(default)]
    pub bind_dn: String,

    #[serde(default)]
    pub bind_password: String,

    /// Timeout applied to each directory operation, in seconds
    #[serde(default = "default_ldap_timeout")]
    pub timeout_seconds: u64,

    #[serde(default)]
    pub strategy: BindStrategy,

    /// DN patterns tried in order by simple bind
    /// Example: "uid={username},ou=Users,dc=test,dc=com"
    #[serde(default)]
    pub user_dn_patterns: Vec<String>,

    /// Base DN for user searches
    #[serde(default)]
    pub user_search_base: String,

    /// User search filter (use {username} placeholder)
    #[serde(default = "default_user_filter")]
    pub user_search_filter: String,

    /// Attribute compared by search-and-compare
    #[serde(default = "default_password_attr")]
    pub password_attribute: String,

    #[serde(default)]
    pub password_encoding: PasswordEncoding,

    #[serde(default)]
    pub groups: GroupSearchConfig,
}

fn default_ldap_url() -> String {
    "ldap://localhost:389".to_string()
}

fn default_ldap_timeout() -> u64 {
    10
}

fn default_user_filter() -> String {
    "(uid={username})".to_string()
}

fn default_password_attr() -> String {
    "userPassword".to_string()
}

impl Default for DirectoryConfigSection {
    fn default() -> Self {
        Self {
            server_url: default_ldap_url(),
            start_tls: false,
            bind_dn: String::new(),
            bind_password: String::new(),
            timeout_seconds: default_ldap_timeout(),
            strategy: BindStrategy::default(),
            user_dn_patterns: Vec::new(),
            user_search_base: String::new(),
            user_search_filter: default_user_filter(),
            password_attribute: default_password_attr(),
            password_encoding: PasswordEncoding::default(),
            groups: GroupSearchConfig::default(),
        }
    }
}

impl DirectoryConfigSection {
    pub fn timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.timeout_seconds)
    }

    pub fn validate(&self) -> Result<()> {
        let url = url::Url::parse(&self.server_url)
            .map_err(|e| Error::Configuration(format!("Invalid server URL: {}", e)))?;
        if url.scheme() != "ldap" && url.scheme() != "ldaps" {
            return Err(Error::Configuration(
                "Server URL must start with ldap:// or ldaps://".to_string(),
            ));
        }

        if self.timeout_seconds == 0 {
            return Err(Error::Configuration("Timeout must be at least one second".to_string()));
        }

        match self.strategy {
            BindStrategy::SimpleBind => {
                if self.user_dn_patterns.is_empty() {
                    return Err(Error::Configuration(
                        "Simple bind requires at least one user DN pattern".to_string(),
                    ));
                }
                for pattern in &self.user_dn_patterns {
                    require_placeholder("User DN pattern", pattern, USERNAME_PLACEHOLDER)?;
                }
            }
            BindStrategy::SearchAndBind | BindStrategy::SearchAndCompare => {
                require_placeholder("User search filter", &self.user_search_filter, USERNAME_PLACEHOLDER)?;
                if self.bind_dn.is_empty() {
                    return Err(Error::Configuration(
                        "Bind DN is required for search based strategies".to_string(),
                    ));
                }
            }
        }

        if self.strategy == BindStrategy::SearchAndCompare && self.password_attribute.is_empty() {
            return Err(Error::Configuration(
                "Password attribute is required for search-and-compare".to_string(),
            ));
        }

        self.groups.validate()
    }
}

/// Group search and scope mapping
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupSearchConfig {
    #[serde(default)]
    pub policy: ScopeMappingPolicy,

    /// Base DN for group searches
    #[serde(default)]
    pub search_base: String,

    /// Group search filter (use {dn} placeholder for the member DN)
    #[serde(default = "default_group_filter")]
    pub search_filter: String,

    /// Group attribute whose value becomes the scope
    #[serde(default = "default_scope_attr")]
    pub scope_attribute: String,

    /// Group attribute listing member DNs
    #[serde(default = "default_member_attr")]
    pub member_attribute: String,

    /// Levels of nested groups expanded beyond direct membership.
    /// Signed so a negative value is rejected instead of failing to parse.
    #[serde(default = "default_max_search_depth")]
    pub max_search_depth: i32,

    /// Upper bound on group searches in flight within one level
    #[serde(default = "default_max_concurrent_searches")]
    pub max_concurrent_searches: usize,
}

fn default_group_filter() -> String {
    "(member={dn})".to_string()
}

fn default_scope_attr() -> String {
    "cn".to_string()
}

fn default_member_attr() -> String {
    "member".to_string()
}

fn default_max_search_depth() -> i32 {
    DEFAULT_MAX_SEARCH_DEPTH
}

fn default_max_concurrent_searches() -> usize {
    4
}

impl Default for GroupSearchConfig {
    fn default() -> Self {
        Self {
            policy: ScopeMappingPolicy::default(),
            search_base: String::new(),
            search_filter: default_group_filter(),
            scope_attribute: default_scope_attr(),
            member_attribute: default_member_attr(),
            max_search_depth: default_max_search_depth(),
            max_concurrent_searches: default_max_concurrent_searches(),
        }
    }
}

impl GroupSearchConfig {
    /// Depth as an unsigned bound; only meaningful after `validate`
    pub fn max_depth(&self) -> u32 {
        u32::try_from(self.max_search_depth).unwrap_or(0)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_search_depth < 0 {
            return Err(Error::Configuration(format!(
                "Max search depth must not be negative, got {}",
                self.max_search_depth
            )));
        }

        if self.max_concurrent_searches == 0 {
            return Err(Error::Configuration(
                "Max concurrent searches must be at least 1".to_string(),
            ));
        }

        if self.policy == ScopeMappingPolicy::NoMapping {
            return Ok(());
        }

        if self.search_base.is_empty() {
            return Err(Error::Configuration("Group search base is required".to_string()));
        }
        require_placeholder("Group search filter", &self.search_filter, DN_PLACEHOLDER)?;
        if self.scope_attribute.is_empty() {
            return Err(Error::Configuration("Group scope attribute is required".to_string()));
        }

        Ok(())
    }
}

// ============================================================================
// Internal store
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    pub database_url: String,
    pub max_connections: u32,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            database_url: "sqlite://keyward.db?mode=rwc".to_string(),
            max_connections: 16,
        }
    }
}

impl StoreConfig {
    pub fn validate(&self) -> Result<()> {
        if self.database_url.is_empty() {
            return Err(Error::Configuration("Database URL is required".to_string()));
        }
        if self.max_connections == 0 {
            return Err(Error::Configuration(
                "Store needs at least one connection".to_string(),
            ));
        }
        Ok(())
    }
}

// ============================================================================
// Provider chain
// ============================================================================

/// Authentication source that can appear in the chain
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    Internal,
    Directory,
}

impl FromStr for ProviderKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "internal" => Ok(ProviderKind::Internal),
            "directory" | "ldap" => Ok(ProviderKind::Directory),
            other => Err(Error::Configuration(format!("Unknown provider: {}", other))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainConfig {
    /// Providers in order of precedence
    #[serde(default = "default_providers")]
    pub providers: Vec<ProviderKind>,

    /// Stop at an unreachable directory instead of trying the next provider
    #[serde(default)]
    pub fail_fast_on_directory_unavailable: bool,

    /// Scopes recorded for a directory identity when it is first provisioned
    #[serde(default = "default_directory_scopes")]
    pub default_directory_scopes: Vec<String>,
}

fn default_providers() -> Vec<ProviderKind> {
    vec![ProviderKind::Internal, ProviderKind::Directory]
}

fn default_directory_scopes() -> Vec<String> {
    [
        "openid",
        "scim.me",
        "scim.userids",
        "password.write",
        "approvals.me",
        "oauth.approvals",
        "uaa.user",
        "cloud_controller.read",
        "cloud_controller.write",
        "cloud_controller_service_permissions.read",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            providers: default_providers(),
            fail_fast_on_directory_unavailable: false,
            default_directory_scopes: default_directory_scopes(),
        }
    }
}

impl ChainConfig {
    pub fn validate(&self) -> Result<()> {
        if self.providers.is_empty() {
            return Err(Error::Configuration(
                "At least one authentication provider is required".to_string(),
            ));
        }

        for (i, provider) in self.providers.iter().enumerate() {
            if self.providers[..i].contains(provider) {
                return Err(Error::Configuration(format!(
                    "Provider {:?} listed more than once",
                    provider
                )));
            }
        }

        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}
