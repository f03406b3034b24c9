//! Local stand-in for one bridge sensor.
//!
//! A proxy holds the latest raw data for its sensor and turns it into a hub
//! [`Entity`]. Switch proxies remember the last `lastupdated` they reported so
//! a button press is surfaced exactly once.

use hublink_app::availability::SourceAvailability;
use hublink_domain::device::Device;
use hublink_domain::entity::{AttributeValue, Entity, EntityState};
use hublink_domain::error::HubError;
use hublink_domain::id::{DeviceId, EntityId};

use crate::model::RawSensor;
use crate::sensor_type::SensorType;

pub const ICON_REMOTE: &str = "mdi:remote";
pub const ICON_DAY: &str = "mdi:weather-sunny";
pub const ICON_NIGHT: &str = "mdi:weather-night";

/// One sensor of the bridge as seen by the hub.
#[derive(Debug)]
pub struct SensorProxy {
    sensor_id: String,
    kind: SensorType,
    raw: RawSensor,
    bridge_id: String,
    bridge: SourceAvailability,
    device_id: DeviceId,
    entity_uuid: EntityId,
    seen_update: Option<String>,
    last_entity: Option<Entity>,
}

impl SensorProxy {
    #[must_use]
    pub fn new(
        sensor_id: impl Into<String>,
        kind: SensorType,
        raw: RawSensor,
        bridge_id: impl Into<String>,
        bridge: SourceAvailability,
    ) -> Self {
        let seen_update = raw.state.last_updated.clone();
        Self {
            sensor_id: sensor_id.into(),
            kind,
            raw,
            bridge_id: bridge_id.into(),
            bridge,
            device_id: DeviceId::new(),
            entity_uuid: EntityId::new(),
            seen_update,
            last_entity: None,
        }
    }

    /// Bridge-side sensor id (key of the `/sensors` resource).
    #[must_use]
    pub fn sensor_id(&self) -> &str {
        &self.sensor_id
    }

    #[must_use]
    pub fn kind(&self) -> SensorType {
        self.kind
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.raw.name
    }

    #[must_use]
    pub fn entity_uuid(&self) -> EntityId {
        self.entity_uuid
    }

    /// Replace the raw data with the one from a newer snapshot.
    pub fn update(&mut self, raw: RawSensor) {
        self.raw = raw;
    }

    /// Stable identifier across restarts.
    #[must_use]
    pub fn unique_id(&self) -> String {
        if self.kind == SensorType::Daylight {
            return format!("{}_daylight", self.bridge_id);
        }
        self.raw
            .unique_id
            .clone()
            .unwrap_or_else(|| format!("{}_{}", self.bridge_id, self.sensor_id))
    }

    /// `sensor.hue_<slug>` or `binary_sensor.hue_<slug>`.
    #[must_use]
    pub fn entity_id(&self) -> String {
        let mut slug = slugify(&self.raw.name);
        if slug.is_empty() {
            slug = slugify(&self.sensor_id);
        }
        format!("{}.hue_{slug}", self.kind.platform().domain())
    }

    #[must_use]
    pub fn available(&self) -> bool {
        if !self.bridge.is_available() {
            return false;
        }
        !self.kind.tracks_reachable() || self.raw.config.reachable.unwrap_or(true)
    }

    /// The entity produced by the last [`render`](Self::render), if any.
    #[must_use]
    pub fn last_entity(&self) -> Option<&Entity> {
        self.last_entity.as_ref()
    }

    /// Hub device this sensor belongs to.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::Validation`] if the sensor has no name.
    pub fn device(&self) -> Result<Device, HubError> {
        let mut builder = Device::builder()
            .id(self.device_id)
            .name(&self.raw.name)
            .integration(crate::INTEGRATION_NAME)
            .unique_id(self.unique_id());
        if let Some(manufacturer) = &self.raw.manufacturer_name {
            builder = builder.manufacturer(manufacturer);
        }
        if let Some(model) = &self.raw.model_id {
            builder = builder.model(model);
        }
        builder.build()
    }

    /// Evaluate the current entity.
    ///
    /// Takes `&mut self` because a switch consumes its pending button event.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::Validation`] if the sensor has no name.
    pub fn render(&mut self) -> Result<Entity, HubError> {
        let mut attributes: Vec<(&'static str, AttributeValue)> = Vec::new();
        let available = self.available();
        let state = if available {
            self.read(&mut attributes)
        } else {
            EntityState::Unavailable
        };
        self.describe(state == EntityState::On, &mut attributes);

        if self.kind != SensorType::Daylight {
            if let Some(battery) = self.raw.config.battery {
                attributes.push(("battery_level", AttributeValue::Int(i64::from(battery))));
            }
            if let Some(last_updated) = &self.raw.state.last_updated {
                attributes.push(("last_updated", AttributeValue::from(last_updated.as_str())));
            }
        }

        let mut builder = Entity::builder()
            .id(self.entity_uuid)
            .device_id(self.device_id)
            .entity_id(self.entity_id())
            .friendly_name(&self.raw.name)
            .state(state);
        for (key, value) in attributes {
            builder = builder.attribute(key, value);
        }
        let entity = builder.build()?;
        self.last_entity = Some(entity.clone());
        Ok(entity)
    }

    /// Push the reading into `attributes` and return the resulting state.
    fn read(&mut self, attributes: &mut Vec<(&'static str, AttributeValue)>) -> EntityState {
        let state = &self.raw.state;
        let reading = match self.kind {
            SensorType::ClipTemperature | SensorType::ZllTemperature => state
                .temperature
                .map(|t| ("temperature", AttributeValue::Float(round1(f64::from(t) / 100.0)))),
            SensorType::ClipHumidity => state
                .humidity
                .map(|h| ("humidity", AttributeValue::Int(i64::from(h)))),
            SensorType::ClipLightLevel => state
                .light_level
                .map(|l| ("illuminance", AttributeValue::Int(i64::from(l)))),
            SensorType::ZllLightLevel => {
                if let Some(dark) = state.dark {
                    attributes.push(("dark", AttributeValue::Bool(dark)));
                }
                if let Some(daylight) = state.daylight {
                    attributes.push(("daylight", AttributeValue::Bool(daylight)));
                }
                state
                    .light_level
                    .map(|l| ("illuminance", AttributeValue::Float(zll_lux(l))))
            }
            SensorType::ClipGenericStatus => state
                .status
                .map(|s| ("status", AttributeValue::Int(i64::from(s)))),
            SensorType::ClipSwitch | SensorType::ZgpSwitch | SensorType::ZllSwitch => self
                .take_button_event()
                .and_then(|code| button_event(self.kind, code))
                .map(|event| ("button_event", event)),
            SensorType::ClipGenericFlag => return flag_state(state.flag),
            SensorType::ClipOpenClose => return flag_state(state.open),
            SensorType::ClipPresence | SensorType::ZllPresence => return flag_state(state.presence),
            SensorType::Daylight => return flag_state(state.daylight),
        };

        match reading {
            Some(attribute) => {
                attributes.push(attribute);
                EntityState::On
            }
            None => EntityState::Unknown,
        }
    }

    /// Static presentation attributes: device class, unit and icon.
    fn describe(&self, is_on: bool, attributes: &mut Vec<(&'static str, AttributeValue)>) {
        let (device_class, unit) = match self.kind {
            SensorType::ClipTemperature | SensorType::ZllTemperature => {
                (Some("temperature"), Some("°C"))
            }
            SensorType::ClipHumidity => (Some("humidity"), Some("%")),
            SensorType::ClipLightLevel | SensorType::ZllLightLevel => {
                (Some("illuminance"), Some("lx"))
            }
            SensorType::ClipOpenClose => (Some("opening"), None),
            SensorType::ClipPresence => (Some("presence"), None),
            SensorType::ZllPresence => (Some("motion"), None),
            _ => (None, None),
        };
        if let Some(device_class) = device_class {
            attributes.push(("device_class", AttributeValue::from(device_class)));
        }
        if let Some(unit) = unit {
            attributes.push(("unit_of_measurement", AttributeValue::from(unit)));
        }

        let icon = match self.kind {
            kind if kind.is_switch() => Some(ICON_REMOTE),
            SensorType::Daylight if is_on => Some(ICON_DAY),
            SensorType::Daylight => Some(ICON_NIGHT),
            _ => None,
        };
        if let Some(icon) = icon {
            attributes.push(("icon", AttributeValue::from(icon)));
        }
    }

    /// Button code if `lastupdated` moved since the last call.
    fn take_button_event(&mut self) -> Option<i32> {
        let current = self.raw.state.last_updated.clone();
        if current == self.seen_update {
            return None;
        }
        self.seen_update = current;
        self.raw.state.button_event
    }
}

fn flag_state(flag: Option<bool>) -> EntityState {
    flag.map_or(EntityState::Unknown, EntityState::from)
}

fn button_event(kind: SensorType, code: i32) -> Option<AttributeValue> {
    match kind {
        SensorType::ZllSwitch => {
            let action = match code % 1000 {
                2 => "click",
                3 => "hold",
                _ => return None,
            };
            let button = code / 1000;
            (1..=4)
                .contains(&button)
                .then(|| AttributeValue::String(format!("{button}_{action}")))
        }
        SensorType::ZgpSwitch => match code {
            34 => Some(AttributeValue::Int(1)),
            16 => Some(AttributeValue::Int(2)),
            17 => Some(AttributeValue::Int(3)),
            18 => Some(AttributeValue::Int(4)),
            _ => None,
        },
        _ => Some(AttributeValue::Int(i64::from(code))),
    }
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Lux from the bridge's logarithmic light level.
fn zll_lux(light_level: i32) -> f64 {
    10f64.powf((f64::from(light_level) - 1.0) / 10_000.0)
}

fn slugify(name: &str) -> String {
    name.split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|part| !part.is_empty())
        .map(str::to_ascii_lowercase)
        .collect::<Vec<_>>()
        .join("_")
}
