//! Core types shared across the realm crates

mod constraint;
mod identity;
mod policy;

pub use constraint::{roles_satisfy, AccessDecision, RequestContext, SecurityConstraint};
pub use identity::{Identity, Origin};
pub use policy::{AllRolesMode, AuthzSource};

/// The application/container instance a realm serves.
///
/// The composite propagates its binding to the embedded resolver on every
/// change so both observe the same container at all times.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerContext {
    pub name: String,
}

impl ContainerContext {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}
