//! Entity: the central state-holding concept in hublink.
//!
//! An entity represents a single observable aspect of a device (e.g. a
//! motion sensor's presence, a thermometer's reading).

mod attribute_value;
mod state;

pub use attribute_value::AttributeValue;
pub use state::EntityState;

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::{HubError, ValidationError};
use crate::id::{DeviceId, EntityId};
use crate::time::{Timestamp, now};

/// A single observable state holder exposed by a device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub id: EntityId,
    pub device_id: DeviceId,
    /// Human-readable identifier in `domain.object_id` form (e.g. `sensor.hue_kitchen`).
    pub entity_id: String,
    pub friendly_name: String,
    pub state: EntityState,
    pub attributes: HashMap<String, AttributeValue>,
    pub last_changed: Timestamp,
    pub last_updated: Timestamp,
}

impl Entity {
    /// Create a builder for constructing an [`Entity`].
    #[must_use]
    pub fn builder() -> EntityBuilder {
        EntityBuilder::default()
    }

    /// Check domain invariants.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::Validation`] when `entity_id` or `friendly_name`
    /// is empty.
    pub fn validate(&self) -> Result<(), HubError> {
        if self.entity_id.is_empty() {
            return Err(ValidationError::EmptyEntityId.into());
        }
        if self.friendly_name.is_empty() {
            return Err(ValidationError::EmptyName.into());
        }
        Ok(())
    }

    /// Look up an attribute by key.
    #[must_use]
    pub fn get_attribute(&self, key: &str) -> Option<&AttributeValue> {
        self.attributes.get(key)
    }

    /// Apply a new state observed at `ts`.
    ///
    /// `last_updated` always moves; `last_changed` only moves when the state
    /// actually differs.
    pub fn update_state(&mut self, state: EntityState, ts: Timestamp) {
        if self.state != state {
            self.state = state;
            self.last_changed = ts;
        }
        self.last_updated = ts;
    }
}

/// Step-by-step builder for [`Entity`].
#[derive(Debug, Default)]
pub struct EntityBuilder {
    id: Option<EntityId>,
    device_id: Option<DeviceId>,
    entity_id: Option<String>,
    friendly_name: Option<String>,
    state: EntityState,
    attributes: HashMap<String, AttributeValue>,
}

impl EntityBuilder {
    #[must_use]
    pub fn id(mut self, id: EntityId) -> Self {
        self.id = Some(id);
        self
    }

    #[must_use]
    pub fn device_id(mut self, device_id: DeviceId) -> Self {
        self.device_id = Some(device_id);
        self
    }

    #[must_use]
    pub fn entity_id(mut self, entity_id: impl Into<String>) -> Self {
        self.entity_id = Some(entity_id.into());
        self
    }

    #[must_use]
    pub fn friendly_name(mut self, name: impl Into<String>) -> Self {
        self.friendly_name = Some(name.into());
        self
    }

    #[must_use]
    pub fn state(mut self, state: EntityState) -> Self {
        self.state = state;
        self
    }

    #[must_use]
    pub fn attribute(mut self, key: impl Into<String>, value: AttributeValue) -> Self {
        self.attributes.insert(key.into(), value);
        self
    }

    /// Consume the builder, validate, and return an [`Entity`].
    ///
    /// # Errors
    ///
    /// Returns [`HubError::Validation`] if `entity_id` or `friendly_name`
    /// is missing or empty.
    pub fn build(self) -> Result<Entity, HubError> {
        let ts = now();
        let entity = Entity {
            id: self.id.unwrap_or_default(),
            device_id: self.device_id.unwrap_or_default(),
            entity_id: self.entity_id.unwrap_or_default(),
            friendly_name: self.friendly_name.unwrap_or_default(),
            state: self.state,
            attributes: self.attributes,
            last_changed: ts,
            last_updated: ts,
        };
        entity.validate()?;
        Ok(entity)
    }
}
