//! Configuration for Haris
//!
//! All of it is set during the configuration phase and frozen before
//! `start`; request threads only ever read it.

use serde::{Deserialize, Serialize};

use crate::types::{AllRolesMode, AuthzSource};
use crate::{Error, Result};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RealmConfig {
    #[serde(default)]
    pub directory: DirectoryConfig,

    #[serde(default)]
    pub datastore: DatastoreConfig,

    #[serde(default)]
    pub schema: SchemaConfig,

    #[serde(default)]
    pub realm: RealmSection,
}

impl RealmConfig {
    pub fn from_file(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Configuration(format!("Failed to read config: {}", e)))?;

        toml::from_str(&content)
            .map_err(|e| Error::Configuration(format!("Failed to parse config: {}", e)))
    }

    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(url) = std::env::var("HARIS_LDAP_URL") {
            config.directory.server_url = url;
        }
        if let Ok(dn) = std::env::var("HARIS_LDAP_BIND_DN") {
            config.directory.bind_dn = dn;
        }
        if let Ok(pw) = std::env::var("HARIS_LDAP_BIND_PASSWORD") {
            config.directory.bind_password = pw;
        }
        if let Ok(base) = std::env::var("HARIS_LDAP_USER_BASE_DN") {
            config.directory.user_base_dn = base;
        }
        if let Ok(filter) = std::env::var("HARIS_LDAP_USER_FILTER") {
            config.directory.user_filter = filter;
        }
        if let Ok(url) = std::env::var("HARIS_DATABASE_URL") {
            config.datastore.url = url;
        }
        if let Ok(table) = std::env::var("HARIS_USER_TABLE") {
            config.schema.user_table = table;
        }
        if let Ok(table) = std::env::var("HARIS_USER_ROLE_TABLE") {
            config.schema.user_role_table = table;
        }

        config
    }

    pub fn validate(&self) -> Result<()> {
        self.directory.validate()?;
        self.datastore.validate()?;
        self.schema.validate()?;
        Ok(())
    }
}

/// LDAP directory connection and user-resolution parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirectoryConfig {
    /// LDAP server URL (ldap:// or ldaps://).
    #[serde(default = "default_ldap_url")]
    pub server_url: String,

    /// Upgrade the connection with STARTTLS.
    #[serde(default)]
    pub start_tls: bool,

    /// Service account DN for searches. Empty means anonymous search.
    #[serde(default)]
    pub bind_dn: String,

    #[serde(default)]
    pub bind_password: String,

    /// Direct-bind DN pattern with a `{username}` placeholder, e.g.
    /// `uid={username},ou=people,dc=example,dc=com`. When set, the realm
    /// binds as the formatted DN and never searches.
    #[serde(default)]
    pub user_pattern: Option<String>,

    /// Base DN for user searches (search mode).
    #[serde(default)]
    pub user_base_dn: String,

    /// User search filter with a `{username}` placeholder.
    #[serde(default = "default_user_filter")]
    pub user_filter: String,

    /// Search the whole subtree under `user_base_dn` rather than one level.
    #[serde(default = "default_true")]
    pub search_subtree: bool,

    /// Referral policy: follow, ignore, or throw.
    #[serde(default = "default_referrals")]
    pub referrals: String,

    /// Entry attribute whose values are carried as the identity's directory
    /// roles. Authorization does not consult them unless the realm's
    /// `authz_source` says so.
    #[serde(default)]
    pub role_attribute: Option<String>,

    /// Connection timeout in seconds.
    #[serde(default = "default_ldap_timeout")]
    pub timeout_seconds: u64,
}

fn default_ldap_url() -> String {
    "ldap://localhost:389".to_string()
}

fn default_user_filter() -> String {
    "(uid={username})".to_string()
}

fn default_true() -> bool {
    true
}

fn default_referrals() -> String {
    "follow".to_string()
}

fn default_ldap_timeout() -> u64 {
    10
}

impl Default for DirectoryConfig {
    fn default() -> Self {
        Self {
            server_url: default_ldap_url(),
            start_tls: false,
            bind_dn: String::new(),
            bind_password: String::new(),
            user_pattern: None,
            user_base_dn: String::new(),
            user_filter: default_user_filter(),
            search_subtree: true,
            referrals: default_referrals(),
            role_attribute: None,
            timeout_seconds: default_ldap_timeout(),
        }
    }
}

impl DirectoryConfig {
    pub fn validate(&self) -> Result<()> {
        if self.server_url.is_empty() {
            return Err(Error::Configuration("directory server_url is required".into()));
        }
        if !self.server_url.starts_with("ldap://") && !self.server_url.starts_with("ldaps://") {
            return Err(Error::Configuration(
                "directory server_url must start with ldap:// or ldaps://".into(),
            ));
        }

        match &self.user_pattern {
            Some(pattern) => {
                if !pattern.contains("{username}") {
                    return Err(Error::Configuration(
                        "user_pattern must contain the {username} placeholder".into(),
                    ));
                }
            }
            None => {
                if self.user_base_dn.is_empty() {
                    return Err(Error::Configuration(
                        "either user_pattern or user_base_dn must be configured".into(),
                    ));
                }
                if !self.user_filter.contains("{username}") {
                    return Err(Error::Configuration(
                        "user_filter must contain the {username} placeholder".into(),
                    ));
                }
            }
        }

        match self.referrals.as_str() {
            "follow" | "ignore" | "throw" => Ok(()),
            other => Err(Error::Configuration(format!(
                "unknown referral policy: {}",
                other
            ))),
        }
    }
}

/// Relational datastore connection parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatastoreConfig {
    /// sqlite: or postgres: connection URL.
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
}

impl Default for DatastoreConfig {
    fn default() -> Self {
        Self {
            url: "sqlite:haris.db?mode=rwc".to_string(),
            max_connections: 20,
            min_connections: 1,
        }
    }
}

impl DatastoreConfig {
    pub fn validate(&self) -> Result<()> {
        if self.url.is_empty() {
            return Err(Error::Configuration("datastore url is required".into()));
        }
        if !self.url.starts_with("sqlite:") && !self.url.starts_with("postgres:") {
            return Err(Error::Configuration(
                "datastore url must use the sqlite: or postgres: scheme".into(),
            ));
        }
        Ok(())
    }
}

/// Names of the user and role tables the datastore queries run against.
///
/// These are interpolated into SQL as identifiers, so they are restricted to
/// `[A-Za-z0-9_]` at validation time. The username itself is always bound as
/// a query parameter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchemaConfig {
    #[serde(default = "default_user_table")]
    pub user_table: String,

    #[serde(default = "default_user_name_column")]
    pub user_name_column: String,

    /// Column holding the stored secret. Optional; without it the
    /// relational-direct authentication path is disabled.
    #[serde(default)]
    pub user_cred_column: Option<String>,

    #[serde(default = "default_user_role_table")]
    pub user_role_table: String,

    #[serde(default = "default_role_name_column")]
    pub role_name_column: String,
}

fn default_user_table() -> String {
    "users".to_string()
}

fn default_user_name_column() -> String {
    "user_name".to_string()
}

fn default_user_role_table() -> String {
    "user_roles".to_string()
}

fn default_role_name_column() -> String {
    "role_name".to_string()
}

impl Default for SchemaConfig {
    fn default() -> Self {
        Self {
            user_table: default_user_table(),
            user_name_column: default_user_name_column(),
            user_cred_column: None,
            user_role_table: default_user_role_table(),
            role_name_column: default_role_name_column(),
        }
    }
}

impl SchemaConfig {
    pub fn validate(&self) -> Result<()> {
        for (field, value) in [
            ("user_table", &self.user_table),
            ("user_name_column", &self.user_name_column),
            ("user_role_table", &self.user_role_table),
            ("role_name_column", &self.role_name_column),
        ] {
            if !is_sql_identifier(value) {
                return Err(Error::Configuration(format!(
                    "schema {} is not a valid SQL identifier: {:?}",
                    field, value
                )));
            }
        }
        if let Some(cred) = &self.user_cred_column {
            if !is_sql_identifier(cred) {
                return Err(Error::Configuration(format!(
                    "schema user_cred_column is not a valid SQL identifier: {:?}",
                    cred
                )));
            }
        }
        Ok(())
    }
}

fn is_sql_identifier(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Realm-level policy settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RealmSection {
    #[serde(default)]
    pub all_roles_mode: AllRolesMode,

    #[serde(default)]
    pub authz_source: AuthzSource,
}
