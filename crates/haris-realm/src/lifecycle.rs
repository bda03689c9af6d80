//! Lifecycle coordination between the composite and its embedded resolver

use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::debug;

use haris_core::types::ContainerContext;
use haris_core::{Error, Result};

use crate::backend::RelationalBackend;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Unconfigured,
    Initialized,
    Started,
    Stopped,
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LifecycleState::Unconfigured => "unconfigured",
            LifecycleState::Initialized => "initialized",
            LifecycleState::Started => "started",
            LifecycleState::Stopped => "stopped",
        };
        write!(f, "{}", name)
    }
}

/// Keeps the composite's lifecycle state and container binding, and mirrors
/// the binding onto the embedded resolver so the two never diverge.
///
/// State only ever moves forward:
/// `Unconfigured -> Initialized -> Started -> Stopped`.
pub struct LifecycleCoordinator {
    state: LifecycleState,
    container: RwLock<Option<ContainerContext>>,
}

impl LifecycleCoordinator {
    pub fn new() -> Self {
        Self {
            state: LifecycleState::Unconfigured,
            container: RwLock::new(None),
        }
    }

    pub fn state(&self) -> LifecycleState {
        self.state
    }

    pub fn advance(&mut self, next: LifecycleState) -> Result<()> {
        let legal = matches!(
            (self.state, next),
            (LifecycleState::Unconfigured, LifecycleState::Initialized)
                | (LifecycleState::Initialized, LifecycleState::Started)
                | (LifecycleState::Started, LifecycleState::Stopped)
        );
        if !legal {
            return Err(Error::Lifecycle(format!(
                "cannot move from {} to {}",
                self.state, next
            )));
        }
        debug!("realm lifecycle: {} -> {}", self.state, next);
        self.state = next;
        Ok(())
    }

    /// Record a new container binding and mirror it onto the resolver, when
    /// one is attached. Called on every change, not only at construction.
    pub fn bind_container(
        &self,
        container: Option<ContainerContext>,
        resolver: Option<&Arc<dyn RelationalBackend>>,
    ) {
        *self.container.write() = container.clone();
        if let Some(resolver) = resolver {
            resolver.set_container(container);
        }
    }

    /// Mirror the current binding onto a freshly attached resolver.
    pub fn sync_binding(&self, resolver: &Arc<dyn RelationalBackend>) {
        resolver.set_container(self.container.read().clone());
    }

    pub fn container(&self) -> Option<ContainerContext> {
        self.container.read().clone()
    }
}

impl Default for LifecycleCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn states_advance_in_order() {
        let mut lc = LifecycleCoordinator::new();
        assert_eq!(lc.state(), LifecycleState::Unconfigured);

        lc.advance(LifecycleState::Initialized).unwrap();
        lc.advance(LifecycleState::Started).unwrap();
        lc.advance(LifecycleState::Stopped).unwrap();
    }

    #[test]
    fn skipping_or_reversing_states_is_rejected() {
        let mut lc = LifecycleCoordinator::new();
        assert!(lc.advance(LifecycleState::Started).is_err());

        lc.advance(LifecycleState::Initialized).unwrap();
        assert!(lc.advance(LifecycleState::Stopped).is_err());
        assert!(lc.advance(LifecycleState::Unconfigured).is_err());

        lc.advance(LifecycleState::Started).unwrap();
        assert!(lc.advance(LifecycleState::Started).is_err());
    }
}
