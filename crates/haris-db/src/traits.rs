//! Role repository trait
//!
//! Defines the read-only interface for the user and role tables.
//! Implementations exist for SQLite and PostgreSQL.

use async_trait::async_trait;

use haris_core::Result;

/// Read-only access to the configured user and role tables.
///
/// The realm never writes through this interface; the backing tables are
/// owned by the application and may change out-of-band, which is why role
/// projections are recomputed on every query.
#[async_trait]
pub trait RoleRepository: Send + Sync {
    /// The stored credential for a username, or `None` when the user does
    /// not exist, has no stored credential, or credential lookups are not
    /// configured.
    async fn lookup_credential(&self, username: &str) -> Result<Option<String>>;

    /// Role names associated with a username. Empty for a user with no
    /// roles and for unknown users; never an error for either.
    async fn roles_for(&self, username: &str) -> Result<Vec<String>>;

    /// Cheap connectivity probe used when the realm starts.
    async fn ping(&self) -> Result<()>;

    /// Release the underlying pool when the realm stops.
    async fn close(&self);
}
