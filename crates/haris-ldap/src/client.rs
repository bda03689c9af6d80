//! LDAP directory authenticator
//!
//! Two resolution modes, selected by configuration:
//! - pattern mode: format the user's DN from `user_pattern` and bind as it;
//! - search mode: bind the service account, search for the user under
//!   `user_base_dn`, then verify the secret by binding as the found DN.
//!
//! "No such user" and "bad credential" both come back as `Ok(None)` so
//! callers cannot enumerate usernames. Connect and protocol failures are
//! `Error::BackendUnavailable`.

use std::time::Duration;

use async_trait::async_trait;
use ldap3::{dn_escape, ldap_escape, Ldap, LdapConnAsync, LdapConnSettings, Scope, SearchEntry};
use tracing::{debug, warn};

use haris_core::config::DirectoryConfig;
use haris_core::traits::Authenticator;
use haris_core::types::{Identity, Origin};
use haris_core::{Error, Result};

use crate::types::{DirectoryServerInfo, TestConnectionResponse};

// Result codes the directory returns for a definitive "not you".
const RC_NO_SUCH_OBJECT: u32 = 32;
const RC_INVALID_CREDENTIALS: u32 = 49;
const RC_UNAVAILABLE: u32 = 53;

pub struct DirectoryAuthenticator {
    config: DirectoryConfig,
}

impl DirectoryAuthenticator {
    pub fn new(config: DirectoryConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &DirectoryConfig {
        &self.config
    }

    /// Validate a username/secret pair against the directory.
    pub async fn authenticate(&self, username: &str, secret: &str) -> Result<Option<Identity>> {
        // An empty password would turn the user bind into an anonymous bind,
        // which the server accepts. Refuse locally.
        if username.is_empty() || secret.is_empty() {
            debug!("rejecting empty username or secret without a directory call");
            return Ok(None);
        }

        match &self.config.user_pattern {
            Some(pattern) => self.authenticate_pattern(pattern, username, secret).await,
            None => self.authenticate_search(username, secret).await,
        }
    }

    /// Probe the directory by binding the service account and reading the
    /// root DSE.
    pub async fn test_connection(&self) -> TestConnectionResponse {
        match self.query_root_dse().await {
            Ok(info) => TestConnectionResponse {
                success: true,
                message: "Connection successful".to_string(),
                server_info: Some(info),
            },
            Err(e) => TestConnectionResponse {
                success: false,
                message: e.to_string(),
                server_info: None,
            },
        }
    }

    async fn connect(&self) -> Result<Ldap> {
        let settings = LdapConnSettings::new()
            .set_conn_timeout(Duration::from_secs(self.config.timeout_seconds))
            .set_starttls(self.config.start_tls);

        debug!("connecting to directory: {}", self.config.server_url);

        let (conn, ldap) = LdapConnAsync::with_settings(settings, &self.config.server_url)
            .await
            .map_err(|e| Error::directory_unavailable(format!("connect failed: {}", e)))?;

        ldap3::drive!(conn);
        Ok(ldap)
    }

    async fn authenticate_pattern(
        &self,
        pattern: &str,
        username: &str,
        secret: &str,
    ) -> Result<Option<Identity>> {
        let user_dn = format_user_dn(pattern, username);
        let mut ldap = self.connect().await?;

        let bind = ldap
            .simple_bind(&user_dn, secret)
            .await
            .map_err(|e| Error::directory_unavailable(format!("user bind failed: {}", e)))?;
        let _ = ldap.unbind().await;

        match bind.rc {
            0 => {
                debug!("directory bind succeeded for {}", user_dn);
                Ok(Some(Identity::new(username, Origin::Directory)))
            }
            RC_NO_SUCH_OBJECT | RC_INVALID_CREDENTIALS | RC_UNAVAILABLE => {
                debug!("directory rejected credentials (rc {})", bind.rc);
                Ok(None)
            }
            rc => Err(Error::directory_unavailable(format!(
                "user bind returned rc {}",
                rc
            ))),
        }
    }

    async fn authenticate_search(&self, username: &str, secret: &str) -> Result<Option<Identity>> {
        let mut ldap = self.connect().await?;
        self.service_bind(&mut ldap).await?;

        let filter = build_user_filter(&self.config.user_filter, username);
        let scope = if self.config.search_subtree {
            Scope::Subtree
        } else {
            Scope::OneLevel
        };
        // "1.1" asks the server for no attributes at all.
        let attrs: Vec<&str> = match &self.config.role_attribute {
            Some(attr) => vec![attr.as_str()],
            None => vec!["1.1"],
        };

        debug!("searching for user with filter: {}", filter);

        let (rs, _res) = ldap
            .search(&self.config.user_base_dn, scope, &filter, attrs)
            .await
            .map_err(|e| Error::directory_unavailable(format!("user search failed: {}", e)))?
            .success()
            .map_err(|e| Error::directory_unavailable(format!("user search error: {}", e)))?;

        if rs.is_empty() {
            let _ = ldap.unbind().await;
            debug!("no directory entry matched");
            return Ok(None);
        }

        let entry = SearchEntry::construct(rs.into_iter().next().unwrap());
        let user_dn = entry.dn.clone();
        let _ = ldap.unbind().await;

        debug!("found user DN: {}", user_dn);

        // Verify the secret on a fresh connection bound as the user.
        let mut user_ldap = self.connect().await?;
        let bind = user_ldap
            .simple_bind(&user_dn, secret)
            .await
            .map_err(|e| Error::directory_unavailable(format!("user bind failed: {}", e)))?;
        let _ = user_ldap.unbind().await;

        match bind.rc {
            0 => {}
            RC_NO_SUCH_OBJECT | RC_INVALID_CREDENTIALS | RC_UNAVAILABLE => {
                debug!("directory rejected credentials (rc {})", bind.rc);
                return Ok(None);
            }
            rc => {
                return Err(Error::directory_unavailable(format!(
                    "user bind returned rc {}",
                    rc
                )))
            }
        }

        let roles = match &self.config.role_attribute {
            Some(attr) => entry.attrs.get(attr).cloned().unwrap_or_default(),
            None => Vec::new(),
        };

        Ok(Some(Identity::with_roles(username, Origin::Directory, roles)))
    }

    async fn service_bind(&self, ldap: &mut Ldap) -> Result<()> {
        // An empty bind DN means anonymous search access.
        if self.config.bind_dn.is_empty() {
            return Ok(());
        }

        let result = ldap
            .simple_bind(&self.config.bind_dn, &self.config.bind_password)
            .await
            .map_err(|e| Error::directory_unavailable(format!("service bind failed: {}", e)))?;

        if result.rc != 0 {
            warn!("service account bind rejected with rc {}", result.rc);
            return Err(Error::directory_unavailable(format!(
                "service bind returned rc {}",
                result.rc
            )));
        }
        Ok(())
    }

    async fn query_root_dse(&self) -> Result<DirectoryServerInfo> {
        let mut ldap = self.connect().await?;
        self.service_bind(&mut ldap).await?;

        let (rs, _res) = ldap
            .search(
                "",
                Scope::Base,
                "(objectClass=*)",
                vec![
                    "vendorName",
                    "vendorVersion",
                    "namingContexts",
                    "supportedLDAPVersion",
                ],
            )
            .await
            .map_err(|e| Error::directory_unavailable(format!("root DSE query failed: {}", e)))?
            .success()
            .map_err(|e| Error::directory_unavailable(format!("root DSE error: {}", e)))?;

        let _ = ldap.unbind().await;

        let info = if let Some(result) = rs.into_iter().next() {
            let entry = SearchEntry::construct(result);
            DirectoryServerInfo {
                vendor: first_attr(&entry, "vendorName"),
                version: first_attr(&entry, "vendorVersion"),
                naming_contexts: entry
                    .attrs
                    .get("namingContexts")
                    .cloned()
                    .unwrap_or_default(),
                supported_ldap_version: entry
                    .attrs
                    .get("supportedLDAPVersion")
                    .cloned()
                    .unwrap_or_default(),
            }
        } else {
            DirectoryServerInfo {
                vendor: None,
                version: None,
                naming_contexts: vec![],
                supported_ldap_version: vec!["3".to_string()],
            }
        };

        Ok(info)
    }
}

#[async_trait]
impl Authenticator for DirectoryAuthenticator {
    async fn authenticate(&self, username: &str, secret: &str) -> Result<Option<Identity>> {
        DirectoryAuthenticator::authenticate(self, username, secret).await
    }
}

/// Format a bind DN from a `{username}` pattern, escaping DN metacharacters
/// in the username.
fn format_user_dn(pattern: &str, username: &str) -> String {
    pattern.replace("{username}", &dn_escape(username))
}

/// Substitute the username into a search filter, escaping filter
/// metacharacters.
fn build_user_filter(filter: &str, username: &str) -> String {
    filter.replace("{username}", &ldap_escape(username))
}

fn first_attr(entry: &SearchEntry, attr: &str) -> Option<String> {
    entry.attrs.get(attr).and_then(|v| v.first().cloned())
}
