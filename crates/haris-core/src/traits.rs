//! Capability traits implemented by the realm backends
//!
//! The composite realm holds its two backends behind these interfaces;
//! implementations exist for the LDAP directory and the SQL datastore, and
//! tests substitute in-process fakes.

use std::collections::BTreeSet;

use async_trait::async_trait;

use crate::types::{AccessDecision, Identity, RequestContext, SecurityConstraint};
use crate::Result;

/// Credential validation.
#[async_trait]
pub trait Authenticator: Send + Sync {
    /// Validate a username/secret pair.
    ///
    /// `Ok(None)` covers both "no such user" and "bad credential"; callers
    /// cannot tell the two apart. Connectivity and protocol failures are
    /// `Err(Error::BackendUnavailable)`, never silently `Ok(None)`.
    async fn authenticate(&self, username: &str, secret: &str) -> Result<Option<Identity>>;
}

/// Role resolution and container-level access decisions.
#[async_trait]
pub trait RoleAuthority: Send + Sync {
    /// The current role set for a username, recomputed on every call.
    /// Empty for a user with no roles; never an error for an unknown user.
    async fn roles(&self, username: &str) -> Result<BTreeSet<String>>;

    async fn has_role(&self, identity: &Identity, role: &str) -> Result<bool>;

    /// Decide a request against the constraints the container matched for it.
    async fn evaluate_constraints(
        &self,
        request: &RequestContext,
        constraints: &[SecurityConstraint],
        identity: Option<&Identity>,
    ) -> Result<AccessDecision>;
}
