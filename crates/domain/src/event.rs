//! Event: an immutable record of something that happened.
//!
//! Events are produced when devices are registered, entities appear or
//! entity state changes.

use serde::{Deserialize, Serialize};

use crate::id::{EntityId, EventId};
use crate::time::{Timestamp, now};

/// Kind of an [`Event`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    StateChanged,
    EntityCreated,
    DeviceRegistered,
}

/// A timestamped record published on the hub event bus.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub id: EventId,
    pub event_type: EventType,
    pub entity_id: Option<EntityId>,
    pub data: serde_json::Value,
    pub timestamp: Timestamp,
}

impl Event {
    /// Create a new event stamped with the current time.
    #[must_use]
    pub fn new(event_type: EventType, entity_id: Option<EntityId>, data: serde_json::Value) -> Self {
        Self {
            id: EventId::new(),
            event_type,
            entity_id,
            data,
            timestamp: now(),
        }
    }
}
