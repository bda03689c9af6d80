//! The embedded relational resolver as the composite sees it

use async_trait::async_trait;

use haris_core::traits::{Authenticator, RoleAuthority};
use haris_core::types::ContainerContext;
use haris_core::Result;
use haris_db::DbRealm;

/// Everything the composite needs from its embedded relational resolver:
/// the two capabilities plus lifecycle and container-binding propagation.
#[async_trait]
pub trait RelationalBackend: Authenticator + RoleAuthority {
    /// Connectivity probe run when the composite starts.
    async fn start(&self) -> Result<()>;

    /// Release backend resources when the composite stops.
    async fn stop(&self);

    fn set_container(&self, container: Option<ContainerContext>);

    fn container(&self) -> Option<ContainerContext>;
}

#[async_trait]
impl RelationalBackend for DbRealm {
    async fn start(&self) -> Result<()> {
        DbRealm::start(self).await
    }

    async fn stop(&self) {
        DbRealm::stop(self).await
    }

    fn set_container(&self, container: Option<ContainerContext>) {
        DbRealm::set_container(self, container)
    }

    fn container(&self) -> Option<ContainerContext> {
        DbRealm::container(self)
    }
}
