//! Relational realm surface
//!
//! Owns the schema configuration, so every role and constraint decision
//! routes through here even for identities the directory authenticated.

use std::collections::BTreeSet;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use tracing::debug;

use haris_core::config::RealmConfig;
use haris_core::traits::{Authenticator, RoleAuthority};
use haris_core::types::{
    roles_satisfy, AccessDecision, AllRolesMode, ContainerContext, Identity, Origin,
    RequestContext, SecurityConstraint,
};
use haris_core::Result;

use crate::postgres::PostgresStore;
use crate::repository::SqliteStore;
use crate::traits::RoleRepository;

pub struct DbRealm {
    store: Arc<dyn RoleRepository>,
    cred_configured: bool,
    all_roles_mode: AllRolesMode,
    container: RwLock<Option<ContainerContext>>,
}

impl DbRealm {
    /// Open the datastore pool named by the configuration. The URL scheme
    /// selects the backend.
    pub async fn connect(config: &RealmConfig) -> Result<Self> {
        let store: Arc<dyn RoleRepository> = if config.datastore.url.starts_with("postgres") {
            Arc::new(PostgresStore::connect(&config.datastore, &config.schema).await?)
        } else {
            Arc::new(SqliteStore::connect(&config.datastore, &config.schema).await?)
        };

        Ok(Self::new(
            store,
            config.schema.user_cred_column.is_some(),
            config.realm.all_roles_mode,
        ))
    }

    pub fn new(
        store: Arc<dyn RoleRepository>,
        cred_configured: bool,
        all_roles_mode: AllRolesMode,
    ) -> Self {
        Self {
            store,
            cred_configured,
            all_roles_mode,
            container: RwLock::new(None),
        }
    }

    /// Connectivity check run when the composite starts.
    pub async fn start(&self) -> Result<()> {
        self.store.ping().await
    }

    /// Release the datastore pool.
    pub async fn stop(&self) {
        self.store.close().await;
    }

    /// Bind this resolver to the container instance it serves.
    pub fn set_container(&self, container: Option<ContainerContext>) {
        *self.container.write() = container;
    }

    pub fn container(&self) -> Option<ContainerContext> {
        self.container.read().clone()
    }

    /// Authenticate directly against the user table.
    ///
    /// Requires `user_cred_column`; without it this path is disabled and
    /// always answers `None`. Stored and presented secrets are compared
    /// byte-exact.
    pub async fn authenticate(&self, username: &str, secret: &str) -> Result<Option<Identity>> {
        if username.is_empty() || secret.is_empty() {
            return Ok(None);
        }
        if !self.cred_configured {
            debug!("relational authentication disabled: no user_cred_column configured");
            return Ok(None);
        }

        let Some(stored) = self.store.lookup_credential(username).await? else {
            debug!("no stored credential for {}", username);
            return Ok(None);
        };
        if stored != secret {
            debug!("credential mismatch for {}", username);
            return Ok(None);
        }

        let roles = self.store.roles_for(username).await?;
        Ok(Some(Identity::with_roles(
            username,
            Origin::Relational,
            roles,
        )))
    }

    /// The current role set for a username, recomputed on every call. The
    /// backing tables may change out-of-band, so nothing is cached.
    pub async fn get_roles(&self, username: &str) -> Result<BTreeSet<String>> {
        let roles = self.store.roles_for(username).await?;
        Ok(roles.into_iter().collect())
    }

    pub async fn has_role(&self, identity: &Identity, role: &str) -> Result<bool> {
        let roles = self.get_roles(&identity.username).await?;
        Ok(roles.contains(role))
    }

    /// Decide a request against the constraints the container matched.
    ///
    /// Unconstrained requests are granted. A constrained request needs an
    /// authenticated identity whose current datastore roles satisfy at
    /// least one applicable constraint; `*` is interpreted per
    /// `all_roles_mode`.
    pub async fn evaluate_constraints(
        &self,
        request: &RequestContext,
        constraints: &[SecurityConstraint],
        identity: Option<&Identity>,
    ) -> Result<AccessDecision> {
        let applicable: Vec<&SecurityConstraint> = constraints
            .iter()
            .filter(|c| c.applies_to(request))
            .collect();
        if applicable.is_empty() {
            return Ok(AccessDecision::Granted);
        }

        let Some(identity) = identity else {
            debug!("denying constrained request without an identity");
            return Ok(AccessDecision::Denied);
        };

        let roles = self.get_roles(&identity.username).await?;
        if roles_satisfy(&roles, &applicable, self.all_roles_mode) {
            return Ok(AccessDecision::Granted);
        }

        debug!("no applicable constraint satisfied for {}", identity.username);
        Ok(AccessDecision::Denied)
    }
}

#[async_trait]
impl Authenticator for DbRealm {
    async fn authenticate(&self, username: &str, secret: &str) -> Result<Option<Identity>> {
        DbRealm::authenticate(self, username, secret).await
    }
}

#[async_trait]
impl RoleAuthority for DbRealm {
    async fn roles(&self, username: &str) -> Result<BTreeSet<String>> {
        self.get_roles(username).await
    }

    async fn has_role(&self, identity: &Identity, role: &str) -> Result<bool> {
        DbRealm::has_role(self, identity, role).await
    }

    async fn evaluate_constraints(
        &self,
        request: &RequestContext,
        constraints: &[SecurityConstraint],
        identity: Option<&Identity>,
    ) -> Result<AccessDecision> {
        DbRealm::evaluate_constraints(self, request, constraints, identity).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use haris_core::config::SchemaConfig;
    use sqlx::sqlite::SqlitePoolOptions;

    use crate::repository::tests::{schema_with_credentials, seeded_store};

    async fn seeded_realm(all_roles_mode: AllRolesMode) -> DbRealm {
        let store = seeded_store(&schema_with_credentials()).await;
        DbRealm::new(Arc::new(store), true, all_roles_mode)
    }

    #[tokio::test]
    async fn authenticates_against_the_user_table() {
        let realm = seeded_realm(AllRolesMode::Strict).await;

        let identity = realm.authenticate("alice", "pw1").await.unwrap().unwrap();
        assert_eq!(identity.username, "alice");
        assert_eq!(identity.origin, Origin::Relational);
        assert!(identity.roles.contains("admin"));

        assert!(realm.authenticate("alice", "wrong").await.unwrap().is_none());
        assert!(realm.authenticate("nobody", "pw1").await.unwrap().is_none());
        assert!(realm.authenticate("alice", "").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn direct_authentication_requires_a_cred_column() {
        let store = seeded_store(&SchemaConfig::default()).await;
        let realm = DbRealm::new(Arc::new(store), false, AllRolesMode::Strict);

        assert!(realm.authenticate("alice", "pw1").await.unwrap().is_none());
        // Role resolution is unaffected.
        assert!(realm.get_roles("alice").await.unwrap().contains("admin"));
    }

    #[tokio::test]
    async fn roles_are_recomputed_on_every_query() {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        sqlx::query("CREATE TABLE users (user_name TEXT PRIMARY KEY, password TEXT)")
            .execute(&pool)
            .await
            .unwrap();
        sqlx::query("CREATE TABLE user_roles (user_name TEXT, role_name TEXT)")
            .execute(&pool)
            .await
            .unwrap();

        let store = crate::repository::SqliteStore::with_pool(
            pool.clone(),
            &schema_with_credentials(),
        );
        let realm = DbRealm::new(Arc::new(store), true, AllRolesMode::Strict);

        assert!(realm.get_roles("carol").await.unwrap().is_empty());

        // Out-of-band mutation must be visible on the next query.
        sqlx::query("INSERT INTO user_roles (user_name, role_name) VALUES ('carol', 'ops')")
            .execute(&pool)
            .await
            .unwrap();

        let first = realm.get_roles("carol").await.unwrap();
        let second = realm.get_roles("carol").await.unwrap();
        assert!(first.contains("ops"));
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn has_role_ignores_identity_roles() {
        let realm = seeded_realm(AllRolesMode::Strict).await;

        // bob carries no roles on the identity; the datastore says viewer.
        let bob = Identity::new("bob", Origin::Directory);
        assert!(realm.has_role(&bob, "viewer").await.unwrap());
        assert!(!realm.has_role(&bob, "admin").await.unwrap());
    }

    #[tokio::test]
    async fn unconstrained_requests_are_granted() {
        let realm = seeded_realm(AllRolesMode::Strict).await;
        let request = RequestContext::new("/public/index.html", "GET");

        let decision = realm
            .evaluate_constraints(&request, &[], None)
            .await
            .unwrap();
        assert!(decision.is_granted());
    }

    #[tokio::test]
    async fn constrained_requests_require_an_identity_with_the_role() {
        let realm = seeded_realm(AllRolesMode::Strict).await;
        let request = RequestContext::new("/admin/users", "GET");
        let constraints = vec![SecurityConstraint::new(
            vec!["/admin/*".to_string()],
            vec!["admin".to_string()],
        )];

        let anonymous = realm
            .evaluate_constraints(&request, &constraints, None)
            .await
            .unwrap();
        assert_eq!(anonymous, AccessDecision::Denied);

        let alice = Identity::new("alice", Origin::Directory);
        let granted = realm
            .evaluate_constraints(&request, &constraints, Some(&alice))
            .await
            .unwrap();
        assert!(granted.is_granted());

        let bob = Identity::new("bob", Origin::Directory);
        let denied = realm
            .evaluate_constraints(&request, &constraints, Some(&bob))
            .await
            .unwrap();
        assert_eq!(denied, AccessDecision::Denied);
    }

    #[tokio::test]
    async fn wildcard_role_follows_all_roles_mode() {
        let request = RequestContext::new("/reports/q3", "GET");
        let constraints = vec![SecurityConstraint::new(
            vec!["/reports/*".to_string()],
            vec!["*".to_string()],
        )];
        // dave is authenticated but holds no datastore roles.
        let dave = Identity::new("dave", Origin::Directory);

        let strict = seeded_realm(AllRolesMode::Strict).await;
        let decision = strict
            .evaluate_constraints(&request, &constraints, Some(&dave))
            .await
            .unwrap();
        assert_eq!(decision, AccessDecision::Denied);

        let auth_only = seeded_realm(AllRolesMode::AuthOnly).await;
        let decision = auth_only
            .evaluate_constraints(&request, &constraints, Some(&dave))
            .await
            .unwrap();
        assert!(decision.is_granted());
    }

    #[tokio::test]
    async fn strict_auth_only_ignores_named_roles() {
        let realm = seeded_realm(AllRolesMode::StrictAuthOnly).await;
        let request = RequestContext::new("/admin/users", "GET");
        let constraints = vec![SecurityConstraint::new(
            vec!["/admin/*".to_string()],
            vec!["admin".to_string()],
        )];

        // alice holds admin, but named-role constraints never match in this
        // mode.
        let alice = Identity::new("alice", Origin::Relational);
        let decision = realm
            .evaluate_constraints(&request, &constraints, Some(&alice))
            .await
            .unwrap();
        assert_eq!(decision, AccessDecision::Denied);
    }

    #[tokio::test]
    async fn container_binding_round_trips() {
        let realm = seeded_realm(AllRolesMode::Strict).await;
        assert!(realm.container().is_none());

        realm.set_container(Some(ContainerContext::new("portal")));
        assert_eq!(realm.container().unwrap().name, "portal");

        realm.set_container(None);
        assert!(realm.container().is_none());
    }
}
