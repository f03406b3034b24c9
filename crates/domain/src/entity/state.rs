//! Entity state.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Discrete state of an entity.
///
/// Measured values (temperatures, light levels, …) live in the entity's
/// attributes; the state only says whether a reading is present.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityState {
    On,
    Off,
    /// No reading yet, or an event-only sensor between events.
    #[default]
    Unknown,
    /// The device or the bridge serving it cannot be reached.
    Unavailable,
}

impl EntityState {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::On => "on",
            Self::Off => "off",
            Self::Unknown => "unknown",
            Self::Unavailable => "unavailable",
        }
    }
}

impl From<bool> for EntityState {
    fn from(on: bool) -> Self {
        if on { Self::On } else { Self::Off }
    }
}

impl fmt::Display for EntityState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
