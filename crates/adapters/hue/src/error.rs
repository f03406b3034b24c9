//! Hue adapter error types.

use hublink_domain::error::HubError;

/// Errors specific to the Hue adapter.
#[derive(Debug, thiserror::Error)]
pub enum HueError {
    /// The HTTP request to the bridge failed.
    #[error("bridge request failed")]
    Http(#[from] reqwest::Error),

    /// The bridge answered with its own error list.
    #[error("bridge error {code}: {description}")]
    Bridge {
        /// Bridge error type (1 = unauthorized user, …).
        code: u16,
        description: String,
    },

    /// The bridge answered with a payload we could not decode.
    #[error("invalid bridge payload")]
    Payload(#[source] serde_json::Error),

    /// The sensor type tag is not one we know.
    #[error("unknown sensor type {0:?}")]
    UnknownSensorType(String),

    /// A domain-level error (validation, not-found, etc.).
    #[error("domain error")]
    Domain(#[source] HubError),
}

impl HueError {
    /// Convert into a [`HubError`] for propagation across port boundaries.
    #[must_use]
    pub fn into_domain(self) -> HubError {
        match self {
            Self::Domain(err) => err,
            other => HubError::Integration(Box::new(other)),
        }
    }
}

impl From<HueError> for HubError {
    fn from(err: HueError) -> Self {
        err.into_domain()
    }
}
