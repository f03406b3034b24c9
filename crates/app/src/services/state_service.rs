//! State service: the hub's in-memory view of devices and entities.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use hublink_domain::device::Device;
use hublink_domain::entity::Entity;
use hublink_domain::error::{HubError, NotFoundError};
use hublink_domain::event::{Event, EventType};
use hublink_domain::id::EntityId;

use crate::ports::EventPublisher;

#[derive(Default)]
struct Tables {
    devices: HashMap<(String, String), Device>,
    entities: HashMap<String, Entity>,
}

/// Application service holding the current device and entity state.
///
/// Nothing is persisted across restarts. Every change is announced through
/// the event publisher.
pub struct StateService<EP> {
    tables: RwLock<Tables>,
    publisher: EP,
}

impl<EP: EventPublisher + Send + Sync> StateService<EP> {
    pub fn new(publisher: EP) -> Self {
        Self {
            tables: RwLock::new(Tables::default()),
            publisher,
        }
    }

    /// Create or update a device by its `(integration, unique_id)` pair.
    ///
    /// An existing device keeps its id; name, manufacturer and model are
    /// replaced. `DeviceRegistered` is published for new devices only.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::Validation`] if the device is invalid.
    #[tracing::instrument(skip(self, device), fields(device_name = %device.name))]
    pub async fn upsert_device(&self, mut device: Device) -> Result<Device, HubError> {
        device.validate()?;
        let key = (device.integration.clone(), device.unique_id.clone());

        let created = {
            let mut tables = self.tables.write().unwrap_or_else(PoisonError::into_inner);
            let created = match tables.devices.get(&key) {
                Some(existing) => {
                    device.id = existing.id;
                    false
                }
                None => true,
            };
            tables.devices.insert(key, device.clone());
            created
        };

        if created {
            tracing::debug!(device_id = %device.id, "device registered");
            self.publisher
                .publish(Event::new(
                    EventType::DeviceRegistered,
                    None,
                    serde_json::json!({
                        "device_id": device.id.to_string(),
                        "integration": device.integration,
                        "unique_id": device.unique_id,
                    }),
                ))
                .await?;
        }
        Ok(device)
    }

    /// Create or update an entity by its `entity_id` string.
    ///
    /// An existing entity keeps its id and `last_changed` unless the state
    /// differs. Publishes `EntityCreated` for a new entity and
    /// `StateChanged` when the state moved.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::Validation`] if the entity is invalid.
    #[tracing::instrument(skip(self, entity), fields(entity_id = %entity.entity_id))]
    pub async fn upsert_entity(&self, mut entity: Entity) -> Result<Entity, HubError> {
        entity.validate()?;

        let event = {
            let mut tables = self.tables.write().unwrap_or_else(PoisonError::into_inner);
            let event = match tables.entities.get(&entity.entity_id) {
                Some(existing) => {
                    entity.id = existing.id;
                    let previous = existing.state;
                    if previous == entity.state {
                        entity.last_changed = existing.last_changed;
                        None
                    } else {
                        Some(Event::new(
                            EventType::StateChanged,
                            Some(entity.id),
                            serde_json::json!({
                                "entity_id": entity.entity_id,
                                "from": previous.to_string(),
                                "to": entity.state.to_string(),
                            }),
                        ))
                    }
                }
                None => Some(Event::new(
                    EventType::EntityCreated,
                    Some(entity.id),
                    serde_json::json!({
                        "entity_id": entity.entity_id,
                        "state": entity.state.to_string(),
                    }),
                )),
            };
            tables
                .entities
                .insert(entity.entity_id.clone(), entity.clone());
            event
        };

        if let Some(event) = event {
            self.publisher.publish(event).await?;
        }
        Ok(entity)
    }

    /// Look up an entity by id.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::NotFound`] when no entity with `id` exists.
    pub fn get_entity(&self, id: EntityId) -> Result<Entity, HubError> {
        let tables = self.tables.read().unwrap_or_else(PoisonError::into_inner);
        tables
            .entities
            .values()
            .find(|entity| entity.id == id)
            .cloned()
            .ok_or_else(|| {
                NotFoundError {
                    entity: "Entity",
                    id: id.to_string(),
                }
                .into()
            })
    }

    /// Look up an entity by its `domain.object_id` string.
    #[must_use]
    pub fn find_entity(&self, entity_id: &str) -> Option<Entity> {
        let tables = self.tables.read().unwrap_or_else(PoisonError::into_inner);
        tables.entities.get(entity_id).cloned()
    }

    /// All entities, sorted by `entity_id`.
    #[must_use]
    pub fn list_entities(&self) -> Vec<Entity> {
        let tables = self.tables.read().unwrap_or_else(PoisonError::into_inner);
        let mut entities: Vec<Entity> = tables.entities.values().cloned().collect();
        entities.sort_by(|a, b| a.entity_id.cmp(&b.entity_id));
        entities
    }

    /// All devices, sorted by name.
    #[must_use]
    pub fn list_devices(&self) -> Vec<Device> {
        let tables = self.tables.read().unwrap_or_else(PoisonError::into_inner);
        let mut devices: Vec<Device> = tables.devices.values().cloned().collect();
        devices.sort_by(|a, b| a.name.cmp(&b.name));
        devices
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event_bus::InProcessEventBus;
    use hublink_domain::entity::{AttributeValue, EntityState};
    use hublink_domain::error::ValidationError;
    use std::sync::Arc;

    fn make_service() -> (StateService<Arc<InProcessEventBus>>, Arc<InProcessEventBus>) {
        let bus = Arc::new(InProcessEventBus::new(16));
        (StateService::new(Arc::clone(&bus)), bus)
    }

    fn motion(state: EntityState) -> Entity {
        Entity::builder()
            .entity_id("binary_sensor.hue_hallway_motion")
            .friendly_name("Hallway motion")
            .state(state)
            .build()
            .unwrap()
    }

    fn bridge_device() -> Device {
        Device::builder()
            .name("Hallway sensor")
            .integration("hue")
            .unique_id("00:17:88:01:02:03:04:05-02-0406")
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn should_keep_device_id_on_second_upsert() {
        let (svc, _bus) = make_service();

        let first = svc.upsert_device(bridge_device()).await.unwrap();
        let mut renamed = bridge_device();
        renamed.name = "Hallway".to_string();
        let second = svc.upsert_device(renamed).await.unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(svc.list_devices().len(), 1);
        assert_eq!(svc.list_devices()[0].name, "Hallway");
    }

    #[tokio::test]
    async fn should_publish_device_registered_once() {
        let (svc, bus) = make_service();
        let mut rx = bus.subscribe();

        svc.upsert_device(bridge_device()).await.unwrap();
        svc.upsert_device(bridge_device()).await.unwrap();

        assert_eq!(rx.recv().await.unwrap().event_type, EventType::DeviceRegistered);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn should_publish_entity_created_for_new_entity() {
        let (svc, bus) = make_service();
        let mut rx = bus.subscribe();

        let entity = svc.upsert_entity(motion(EntityState::Off)).await.unwrap();

        let event = rx.recv().await.unwrap();
        assert_eq!(event.event_type, EventType::EntityCreated);
        assert_eq!(event.entity_id, Some(entity.id));
        assert_eq!(event.data["state"], "off");
    }

    #[tokio::test]
    async fn should_publish_state_changed_with_previous_state() {
        let (svc, bus) = make_service();
        let created = svc.upsert_entity(motion(EntityState::Off)).await.unwrap();
        let mut rx = bus.subscribe();

        let updated = svc.upsert_entity(motion(EntityState::On)).await.unwrap();

        assert_eq!(updated.id, created.id);
        let event = rx.recv().await.unwrap();
        assert_eq!(event.event_type, EventType::StateChanged);
        assert_eq!(event.data["from"], "off");
        assert_eq!(event.data["to"], "on");
    }

    #[tokio::test]
    async fn should_keep_last_changed_when_only_attributes_move() {
        let (svc, bus) = make_service();
        let created = svc.upsert_entity(motion(EntityState::On)).await.unwrap();
        let mut rx = bus.subscribe();

        let mut next = motion(EntityState::On);
        next.attributes
            .insert("battery_level".to_string(), AttributeValue::Int(80));
        let updated = svc.upsert_entity(next).await.unwrap();

        assert_eq!(updated.last_changed, created.last_changed);
        assert_eq!(
            svc.find_entity("binary_sensor.hue_hallway_motion")
                .unwrap()
                .get_attribute("battery_level"),
            Some(&AttributeValue::Int(80))
        );
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn should_reject_entity_without_entity_id() {
        let (svc, _bus) = make_service();
        let mut entity = motion(EntityState::Off);
        entity.entity_id = String::new();

        let result = svc.upsert_entity(entity).await;
        assert!(matches!(
            result,
            Err(HubError::Validation(ValidationError::EmptyEntityId))
        ));
    }

    #[tokio::test]
    async fn should_return_not_found_for_unknown_entity() {
        let (svc, _bus) = make_service();
        let result = svc.get_entity(EntityId::new());
        assert!(matches!(result, Err(HubError::NotFound(_))));
    }

    #[tokio::test]
    async fn should_list_entities_sorted_by_entity_id() {
        let (svc, _bus) = make_service();
        svc.upsert_entity(motion(EntityState::Off)).await.unwrap();
        svc.upsert_entity(
            Entity::builder()
                .entity_id("binary_sensor.hue_daylight")
                .friendly_name("Daylight")
                .build()
                .unwrap(),
        )
        .await
        .unwrap();

        let ids: Vec<String> = svc.list_entities().into_iter().map(|e| e.entity_id).collect();
        assert_eq!(
            ids,
            vec!["binary_sensor.hue_daylight", "binary_sensor.hue_hallway_motion"]
        );
    }
}
