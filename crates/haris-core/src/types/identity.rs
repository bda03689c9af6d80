//! Authenticated identity types

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// Which backend authenticated an identity.
///
/// The origin never influences where authorization decisions are made; that
/// is governed by the realm's `AuthzSource` policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Origin {
    Directory,
    Relational,
}

/// An authenticated subject and the roles resolved at authentication time.
///
/// Immutable once constructed. Owned by the caller for the lifetime of its
/// session or request. Roles carried here are whatever the authenticating
/// backend produced; role queries against the realm always reflect the
/// datastore's current state instead.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub username: String,
    pub roles: BTreeSet<String>,
    pub origin: Origin,
}

impl Identity {
    pub fn new(username: impl Into<String>, origin: Origin) -> Self {
        Self {
            username: username.into(),
            roles: BTreeSet::new(),
            origin,
        }
    }

    pub fn with_roles(
        username: impl Into<String>,
        origin: Origin,
        roles: impl IntoIterator<Item = String>,
    ) -> Self {
        Self {
            username: username.into(),
            roles: roles.into_iter().collect(),
            origin,
        }
    }
}
