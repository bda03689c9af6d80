//! Composite authentication/authorization provider
//!
//! Delegation rules:
//! - authentication tries the directory first and falls back to the
//!   datastore's user table, strictly in that order, never in parallel;
//! - authorization always consults the datastore, whichever backend
//!   authenticated the identity (governed by `AuthzSource`);
//! - a datastore that failed to initialize leaves the realm in degraded,
//!   directory-only mode: role queries answer empty, decisions deny, and
//!   nothing ever surfaces to the container as an error.

use std::collections::BTreeSet;
use std::sync::Arc;

use tracing::{debug, error, info, warn};

use haris_core::config::RealmConfig;
use haris_core::traits::Authenticator;
use haris_core::types::{
    roles_satisfy, AccessDecision, AuthzSource, ContainerContext, Identity, Origin,
    RequestContext, SecurityConstraint,
};
use haris_core::Result;
use haris_db::DbRealm;
use haris_ldap::DirectoryAuthenticator;

use crate::backend::RelationalBackend;
use crate::lifecycle::{LifecycleCoordinator, LifecycleState};

/// Build-time identity of a realm implementation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RealmDescriptor {
    pub name: &'static str,
    pub version: &'static str,
}

pub const DESCRIPTOR: RealmDescriptor = RealmDescriptor {
    name: env!("CARGO_PKG_NAME"),
    version: env!("CARGO_PKG_VERSION"),
};

pub struct CompositeRealm {
    config: RealmConfig,
    directory: Arc<dyn Authenticator>,
    relational: Option<Arc<dyn RelationalBackend>>,
    lifecycle: LifecycleCoordinator,
}

impl CompositeRealm {
    /// Build a realm whose backends come from the configuration. The
    /// datastore pool is opened by `init`.
    pub fn new(config: RealmConfig) -> Self {
        let directory = Arc::new(DirectoryAuthenticator::new(config.directory.clone()));
        Self {
            config,
            directory,
            relational: None,
            lifecycle: LifecycleCoordinator::new(),
        }
    }

    /// Build a realm around backends the host already constructed. `init`
    /// will not open anything itself; a `None` relational backend puts the
    /// realm straight into degraded, directory-only mode.
    pub fn with_backends(
        config: RealmConfig,
        directory: Arc<dyn Authenticator>,
        relational: Option<Arc<dyn RelationalBackend>>,
    ) -> Self {
        Self {
            config,
            directory,
            relational,
            lifecycle: LifecycleCoordinator::new(),
        }
    }

    pub fn descriptor(&self) -> RealmDescriptor {
        DESCRIPTOR
    }

    pub fn state(&self) -> LifecycleState {
        self.lifecycle.state()
    }

    pub fn config(&self) -> &RealmConfig {
        &self.config
    }

    /// True when the relational resolver is absent and authorization fails
    /// closed.
    pub fn is_degraded(&self) -> bool {
        self.relational.is_none()
    }

    /// Bind the realm to the container instance it serves. Propagated to
    /// the embedded resolver on every call, so the two bindings are equal
    /// at every observable instant.
    pub fn set_container(&self, container: Option<ContainerContext>) {
        self.lifecycle
            .bind_container(container, self.relational.as_ref());
    }

    pub fn container(&self) -> Option<ContainerContext> {
        self.lifecycle.container()
    }

    /// Initialize the embedded relational resolver.
    ///
    /// Failure to open the datastore is logged and non-fatal: the realm
    /// continues directory-only rather than refusing to initialize.
    pub async fn init(&mut self) -> Result<()> {
        self.lifecycle.advance(LifecycleState::Initialized)?;

        if self.relational.is_none() {
            match DbRealm::connect(&self.config).await {
                Ok(db) => self.relational = Some(Arc::new(db) as Arc<dyn RelationalBackend>),
                Err(e) => {
                    error!("cannot initialize relational resolver, continuing directory-only: {}", e);
                }
            }
        }

        if let Some(resolver) = &self.relational {
            self.lifecycle.sync_binding(resolver);
            info!("initialized relational resolver");
        }
        Ok(())
    }

    /// Validate the configuration and start serving. A configuration error
    /// is fatal here and blocks the `Started` transition; start is
    /// propagated to the embedded resolver only if its initialization
    /// succeeded.
    pub async fn start(&mut self) -> Result<()> {
        self.config.validate()?;
        self.lifecycle.advance(LifecycleState::Started)?;

        if let Some(resolver) = &self.relational {
            match resolver.start().await {
                // A failed probe is not fatal: per-call handling fails
                // closed until the datastore comes back.
                Err(e) => warn!("relational resolver failed its start probe: {}", e),
                Ok(()) => info!("relational resolver started"),
            }
        } else {
            warn!("realm started in degraded, directory-only mode");
        }
        Ok(())
    }

    pub async fn stop(&mut self) -> Result<()> {
        self.lifecycle.advance(LifecycleState::Stopped)?;
        if let Some(resolver) = &self.relational {
            resolver.stop().await;
        }
        Ok(())
    }

    /// Validate a credential against the directory, then the datastore.
    ///
    /// The directory attempt is fully resolved before the fallback is
    /// considered; the two are never raced. A directory success is returned
    /// unchanged, without merging in datastore roles. Every failure path,
    /// including backend outages, collapses to `None`.
    pub async fn authenticate(&self, username: &str, secret: &str) -> Option<Identity> {
        match self.directory.authenticate(username, secret).await {
            Ok(Some(identity)) => {
                debug!("directory authenticated {}", username);
                return Some(identity);
            }
            Ok(None) => debug!("directory did not authenticate {}", username),
            Err(e) => warn!("directory authentication unavailable, trying fallback: {}", e),
        }

        let Some(resolver) = &self.relational else {
            debug!("no relational fallback available");
            return None;
        };
        match resolver.authenticate(username, secret).await {
            Ok(identity) => {
                if identity.is_some() {
                    debug!("datastore authenticated {}", username);
                }
                identity
            }
            Err(e) => {
                warn!("relational authentication unavailable: {}", e);
                None
            }
        }
    }

    /// The identity's current role set.
    ///
    /// Answered from the datastore regardless of which backend
    /// authenticated, unless the realm is configured with
    /// `AuthzSource::SameAsAuthBackend`. Fails closed to an empty set.
    pub async fn get_roles(&self, identity: &Identity) -> BTreeSet<String> {
        if self.authz_from_identity(identity) {
            return identity.roles.clone();
        }

        let Some(resolver) = &self.relational else {
            warn!("role query in degraded mode, answering empty");
            return BTreeSet::new();
        };
        match resolver.roles(&identity.username).await {
            Ok(roles) => roles,
            Err(e) => {
                warn!("role query unavailable, failing closed: {}", e);
                BTreeSet::new()
            }
        }
    }

    /// Whether the identity currently holds a role. Fails closed to
    /// `false`.
    pub async fn has_role(&self, identity: &Identity, role: &str) -> bool {
        if self.authz_from_identity(identity) {
            return identity.roles.contains(role);
        }

        let Some(resolver) = &self.relational else {
            warn!("role check in degraded mode, denying");
            return false;
        };
        match resolver.has_role(identity, role).await {
            Ok(held) => held,
            Err(e) => {
                warn!("role check unavailable, failing closed: {}", e);
                false
            }
        }
    }

    /// Decide a request against the constraints the container matched for
    /// it. Unconstrained requests pass; everything else fails closed on any
    /// backend trouble.
    pub async fn evaluate_security_constraints(
        &self,
        request: &RequestContext,
        constraints: &[SecurityConstraint],
        identity: Option<&Identity>,
    ) -> AccessDecision {
        if let Some(identity) = identity {
            if self.authz_from_identity(identity) {
                let applicable: Vec<&SecurityConstraint> = constraints
                    .iter()
                    .filter(|c| c.applies_to(request))
                    .collect();
                if applicable.is_empty() {
                    return AccessDecision::Granted;
                }
                return if roles_satisfy(
                    &identity.roles,
                    &applicable,
                    self.config.realm.all_roles_mode,
                ) {
                    AccessDecision::Granted
                } else {
                    AccessDecision::Denied
                };
            }
        }

        let Some(resolver) = &self.relational else {
            let constrained = constraints.iter().any(|c| c.applies_to(request));
            if constrained {
                warn!("constrained request in degraded mode, denying");
                return AccessDecision::Denied;
            }
            return AccessDecision::Granted;
        };
        match resolver
            .evaluate_constraints(request, constraints, identity)
            .await
        {
            Ok(decision) => decision,
            Err(e) => {
                warn!("constraint evaluation unavailable, denying: {}", e);
                AccessDecision::Denied
            }
        }
    }

    fn authz_from_identity(&self, identity: &Identity) -> bool {
        self.config.realm.authz_source == AuthzSource::SameAsAuthBackend
            && identity.origin == Origin::Directory
    }
}
