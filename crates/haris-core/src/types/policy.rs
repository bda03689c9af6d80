//! Realm policy knobs

use serde::{Deserialize, Serialize};

/// Which backend answers authorization queries.
///
/// The realm's defining rule is that the datastore governs *what you may do*
/// even when the directory decided *who you are*, so the default routes
/// every role and constraint query to the datastore. `SameAsAuthBackend`
/// instead answers from the roles the authenticating backend resolved onto
/// the identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AuthzSource {
    #[default]
    AlwaysRelational,
    SameAsAuthBackend,
}

/// How the wildcard role `*` in a security constraint is satisfied.
///
/// Mirrors the modes containers conventionally expose:
/// - `Strict`: `*` means "any role the datastore knows for this user"; the
///   user must hold at least one role.
/// - `AuthOnly`: `*` is satisfied by any authenticated user, roles or not.
/// - `StrictAuthOnly`: only `*` constraints are honored, and they require an
///   authenticated user; named-role constraints never match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AllRolesMode {
    #[default]
    Strict,
    AuthOnly,
    StrictAuthOnly,
}
