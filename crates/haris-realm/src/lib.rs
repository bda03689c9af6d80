//! Composite realm for Haris
//!
//! Couples LDAP authentication with SQL role resolution: the directory
//! decides who a caller is, the datastore always decides what they may do.
//! When the directory yields no identity, authentication falls back to the
//! datastore's user table.

mod backend;
mod lifecycle;
mod realm;

pub use backend::RelationalBackend;
pub use lifecycle::{LifecycleCoordinator, LifecycleState};
pub use realm::{CompositeRealm, RealmDescriptor, DESCRIPTOR};
