//! Supported bridge sensor types.

use std::fmt;
use std::str::FromStr;

use crate::error::HueError;

/// Hub platform a sensor type is exposed under.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    Sensor,
    BinarySensor,
}

impl Platform {
    /// Entity id domain (`sensor`, `binary_sensor`).
    #[must_use]
    pub fn domain(self) -> &'static str {
        match self {
            Self::Sensor => "sensor",
            Self::BinarySensor => "binary_sensor",
        }
    }
}

/// Closed set of bridge type tags this adapter understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SensorType {
    ClipGenericStatus,
    ClipHumidity,
    ClipLightLevel,
    ClipSwitch,
    ClipTemperature,
    ZgpSwitch,
    ZllLightLevel,
    ZllSwitch,
    ZllTemperature,
    ClipGenericFlag,
    ClipOpenClose,
    ClipPresence,
    Daylight,
    ZllPresence,
}

impl SensorType {
    pub const ALL: [Self; 14] = [
        Self::ClipGenericStatus,
        Self::ClipHumidity,
        Self::ClipLightLevel,
        Self::ClipSwitch,
        Self::ClipTemperature,
        Self::ZgpSwitch,
        Self::ZllLightLevel,
        Self::ZllSwitch,
        Self::ZllTemperature,
        Self::ClipGenericFlag,
        Self::ClipOpenClose,
        Self::ClipPresence,
        Self::Daylight,
        Self::ZllPresence,
    ];

    /// Tag as written by the bridge.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ClipGenericStatus => "CLIPGenericStatus",
            Self::ClipHumidity => "CLIPHumidity",
            Self::ClipLightLevel => "CLIPLightLevel",
            Self::ClipSwitch => "CLIPSwitch",
            Self::ClipTemperature => "CLIPTemperature",
            Self::ZgpSwitch => "ZGPSwitch",
            Self::ZllLightLevel => "ZLLLightLevel",
            Self::ZllSwitch => "ZLLSwitch",
            Self::ZllTemperature => "ZLLTemperature",
            Self::ClipGenericFlag => "CLIPGenericFlag",
            Self::ClipOpenClose => "CLIPOpenClose",
            Self::ClipPresence => "CLIPPresence",
            Self::Daylight => "Daylight",
            Self::ZllPresence => "ZLLPresence",
        }
    }

    #[must_use]
    pub fn platform(self) -> Platform {
        match self {
            Self::ClipGenericFlag
            | Self::ClipOpenClose
            | Self::ClipPresence
            | Self::Daylight
            | Self::ZllPresence => Platform::BinarySensor,
            _ => Platform::Sensor,
        }
    }

    /// Software sensors created through the CLIP API rather than paired devices.
    #[must_use]
    pub fn is_clip(self) -> bool {
        matches!(
            self,
            Self::ClipGenericStatus
                | Self::ClipHumidity
                | Self::ClipLightLevel
                | Self::ClipSwitch
                | Self::ClipTemperature
                | Self::ClipGenericFlag
                | Self::ClipOpenClose
                | Self::ClipPresence
        )
    }

    /// Whether availability follows the sensor's `reachable` flag.
    #[must_use]
    pub fn tracks_reachable(self) -> bool {
        !matches!(self, Self::ZgpSwitch | Self::Daylight)
    }

    #[must_use]
    pub fn is_switch(self) -> bool {
        matches!(self, Self::ClipSwitch | Self::ZgpSwitch | Self::ZllSwitch)
    }
}

impl FromStr for SensorType {
    type Err = HueError;

    fn from_str(tag: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == tag)
            .ok_or_else(|| HueError::UnknownSensorType(tag.to_string()))
    }
}

impl fmt::Display for SensorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
