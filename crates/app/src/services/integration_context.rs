//! Concrete [`IntegrationContext`] backed by the [`StateService`].

use std::sync::Arc;

use hublink_domain::device::Device;
use hublink_domain::entity::Entity;
use hublink_domain::error::HubError;

use crate::ports::{EventPublisher, IntegrationContext};
use crate::services::state_service::StateService;

/// [`IntegrationContext`] that records discoveries in a shared
/// [`StateService`], which announces them on its publisher.
///
/// Cheap to clone; integrations only ever see the trait.
pub struct ServiceContext<EP> {
    state: Arc<StateService<EP>>,
}

impl<EP> ServiceContext<EP> {
    pub fn new(state: Arc<StateService<EP>>) -> Self {
        Self { state }
    }

    /// The state service this context writes to.
    #[must_use]
    pub fn state(&self) -> &Arc<StateService<EP>> {
        &self.state
    }
}

impl<EP> Clone for ServiceContext<EP> {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
        }
    }
}

impl<EP> IntegrationContext for ServiceContext<EP>
where
    EP: EventPublisher + Send + Sync + 'static,
{
    async fn upsert_device(&self, device: Device) -> Result<Device, HubError> {
        self.state.upsert_device(device).await
    }

    async fn upsert_entity(&self, entity: Entity) -> Result<Entity, HubError> {
        self.state.upsert_entity(entity).await
    }
}
