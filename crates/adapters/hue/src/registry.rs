//! Sensor registry: the proxies known for one bridge.

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use tokio::sync::mpsc;

use hublink_app::availability::SourceAvailability;
use hublink_app::ports::{DiscoveredDevice, EntityRegistry};
use hublink_domain::entity::Entity;
use hublink_domain::error::HubError;
use hublink_domain::id::EntityId;

use crate::config::HueConfig;
use crate::model::SensorSnapshot;
use crate::proxy::SensorProxy;
use crate::sensor_type::SensorType;

/// Work queued for the integration's update pump.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryUpdate {
    /// A sensor was seen for the first time: persist device and entity.
    Added(String),
    /// A known sensor may have new data: persist its entity.
    Refresh(String),
}

/// Proxies of every supported sensor of one bridge, keyed by bridge id.
pub struct SensorRegistry {
    bridge_id: String,
    allow_clip_sensors: bool,
    availability: SourceAvailability,
    proxies: Mutex<BTreeMap<String, SensorProxy>>,
    updates: mpsc::UnboundedSender<RegistryUpdate>,
}

impl SensorRegistry {
    /// Create an empty registry and the receiving end of its update queue.
    #[must_use]
    pub fn new(
        config: &HueConfig,
        availability: SourceAvailability,
    ) -> (Self, mpsc::UnboundedReceiver<RegistryUpdate>) {
        let (updates, rx) = mpsc::unbounded_channel();
        let registry = Self {
            bridge_id: config.bridge_id().to_string(),
            allow_clip_sensors: config.allow_clip_sensors,
            availability,
            proxies: Mutex::new(BTreeMap::new()),
            updates,
        };
        (registry, rx)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Evaluate the entity of one sensor.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::Validation`] if the sensor cannot form an entity.
    pub fn render(&self, sensor_id: &str) -> Result<Option<Entity>, HubError> {
        self.lock()
            .get_mut(sensor_id)
            .map(SensorProxy::render)
            .transpose()
    }

    /// Device and entity of one sensor, for first-time persistence.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::Validation`] if the sensor cannot form a device.
    pub fn discovered(&self, sensor_id: &str) -> Result<Option<DiscoveredDevice>, HubError> {
        let mut proxies = self.lock();
        let Some(proxy) = proxies.get_mut(sensor_id) else {
            return Ok(None);
        };
        let device = proxy.device()?;
        let entity = proxy.render()?;
        Ok(Some(DiscoveredDevice {
            device,
            entities: vec![entity],
        }))
    }

    /// Entity last reported for the hub id `id`, rendering it if it never was.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::Validation`] if the sensor cannot form an entity.
    pub fn entity_by_id(&self, id: EntityId) -> Result<Option<Entity>, HubError> {
        let mut proxies = self.lock();
        let Some(proxy) = proxies.values_mut().find(|proxy| proxy.entity_uuid() == id) else {
            return Ok(None);
        };
        if let Some(entity) = proxy.last_entity() {
            return Ok(Some(entity.clone()));
        }
        proxy.render().map(Some)
    }

    fn queue(&self, update: RegistryUpdate) {
        if self.updates.send(update).is_err() {
            tracing::debug!("registry update dropped, receiver closed");
        }
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<String, SensorProxy>> {
        self.proxies.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl EntityRegistry<SensorSnapshot> for SensorRegistry {
    type Id = String;

    fn reconcile(&self, snapshot: &SensorSnapshot) -> Vec<String> {
        let mut created = Vec::new();
        {
            let mut proxies = self.lock();
            for (sensor_id, raw) in snapshot.iter() {
                if let Some(proxy) = proxies.get_mut(sensor_id) {
                    proxy.update(raw.clone());
                    continue;
                }
                let kind = match raw.kind.parse::<SensorType>() {
                    Ok(kind) => kind,
                    Err(err) => {
                        tracing::trace!(sensor_id = %sensor_id, error = %err, "skipping sensor");
                        continue;
                    }
                };
                if kind.is_clip() && !self.allow_clip_sensors {
                    continue;
                }

                tracing::info!(name = %raw.name, kind = %kind, "added new Hue sensor");
                proxies.insert(
                    sensor_id.clone(),
                    SensorProxy::new(
                        sensor_id.clone(),
                        kind,
                        raw.clone(),
                        self.bridge_id.clone(),
                        self.availability.clone(),
                    ),
                );
                created.push(sensor_id.clone());
            }
        }

        for sensor_id in &created {
            self.queue(RegistryUpdate::Added(sensor_id.clone()));
        }
        created
    }

    fn known_ids(&self) -> Vec<String> {
        self.lock().keys().cloned().collect()
    }

    fn notify_refresh(&self, id: &String) {
        self.queue(RegistryUpdate::Refresh(id.clone()));
    }
}
