//! Integration port: lifecycle of a device integration.
//!
//! An integration bridges one external system (a lighting bridge, a cloud
//! relay, …) into the hub. It discovers devices and their entities, keeps
//! their state current and answers service calls for the entities it owns.

use std::future::Future;

use hublink_domain::device::Device;
use hublink_domain::entity::Entity;
use hublink_domain::error::HubError;
use hublink_domain::id::EntityId;

/// Handle given to integrations to record what they discover.
///
/// The binary wires a [`ServiceContext`](crate::services::integration_context::ServiceContext)
/// backed by the in-memory [`StateService`](crate::services::state_service::StateService).
pub trait IntegrationContext: Send + Sync {
    /// Record a device, matched on `integration` + `unique_id`.
    fn upsert_device(&self, device: Device) -> impl Future<Output = Result<Device, HubError>> + Send;

    /// Record an entity, matched on its `entity_id` string.
    ///
    /// Emits `EntityCreated` for new entities and `StateChanged` when the
    /// state differs from the stored one.
    fn upsert_entity(&self, entity: Entity) -> impl Future<Output = Result<Entity, HubError>> + Send;

    /// Record a device followed by each of its entities.
    fn persist_discovered(
        &self,
        discovered: DiscoveredDevice,
    ) -> impl Future<Output = Result<(), HubError>> + Send {
        async move {
            self.upsert_device(discovered.device).await?;
            for entity in discovered.entities {
                self.upsert_entity(entity).await?;
            }
            Ok(())
        }
    }
}

/// A pluggable device integration.
///
/// The binary drives the lifecycle in order:
///
/// 1. [`setup`](Self::setup): first contact, persist what is found at once
/// 2. [`start_background`](Self::start_background): spawn polling tasks
/// 3. [`handle_service_call`](Self::handle_service_call) while running
/// 4. [`teardown`](Self::teardown) on shutdown
pub trait Integration {
    /// Short name used in logs and as `Device::integration` (e.g. `"hue"`).
    fn name(&self) -> &'static str;

    /// Initialise and persist the devices discovered on first contact.
    ///
    /// Must not fail just because the remote end is unreachable: the
    /// integration should come up with unavailable entities instead.
    fn setup(&mut self, ctx: &impl IntegrationContext) -> impl Future<Output = Result<(), HubError>> + Send;

    /// Spawn long-running tasks that keep entities current through `ctx`.
    ///
    /// The default does nothing.
    fn start_background(
        &mut self,
        _ctx: impl IntegrationContext + Clone + 'static,
    ) -> impl Future<Output = Result<(), HubError>> + Send {
        async { Ok(()) }
    }

    /// Handle a service call addressed to an entity this integration owns.
    ///
    /// Returns the entity as it stands after the call.
    fn handle_service_call(
        &self,
        entity_id: EntityId,
        service: &str,
        data: serde_json::Value,
    ) -> impl Future<Output = Result<Entity, HubError>> + Send;

    /// Stop background tasks and release connections.
    fn teardown(&mut self) -> impl Future<Output = Result<(), HubError>> + Send;
}

/// A device together with the entities it exposes.
#[derive(Debug, Clone)]
pub struct DiscoveredDevice {
    pub device: Device,
    pub entities: Vec<Entity>,
}
