//! HTTP client for the bridge REST API.

use std::collections::BTreeMap;
use std::sync::Arc;

use hublink_app::ports::{FetchError, UpstreamFetcher};

use crate::config::HueConfig;
use crate::error::HueError;
use crate::model::{BridgeErrorEntry, RawSensor, SensorSnapshot};

/// Reads the sensor resource of one bridge.
///
/// No request timeout is set here: the coalescer bounds every refresh.
#[derive(Debug, Clone)]
pub struct BridgeClient {
    http: reqwest::Client,
    sensors_url: String,
}

impl BridgeClient {
    #[must_use]
    pub fn new(config: &HueConfig) -> Self {
        Self::with_client(reqwest::Client::new(), config)
    }

    #[must_use]
    pub fn with_client(http: reqwest::Client, config: &HueConfig) -> Self {
        Self {
            http,
            sensors_url: format!("http://{}/api/{}/sensors", config.host, config.username),
        }
    }

    /// Fetch every sensor known to the bridge.
    ///
    /// # Errors
    ///
    /// Returns [`HueError::Http`] on transport or status failures,
    /// [`HueError::Bridge`] when the bridge answers with an error list and
    /// [`HueError::Payload`] when the body cannot be decoded.
    #[tracing::instrument(skip(self))]
    pub async fn fetch_sensors(&self) -> Result<BTreeMap<String, RawSensor>, HueError> {
        let body: serde_json::Value = self
            .http
            .get(&self.sensors_url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        if body.is_array() {
            let errors: Vec<BridgeErrorEntry> =
                serde_json::from_value(body).map_err(HueError::Payload)?;
            return Err(errors.into_iter().next().map_or(
                HueError::Bridge {
                    code: 0,
                    description: "empty error list".to_string(),
                },
                |entry| HueError::Bridge {
                    code: entry.error.code,
                    description: entry.error.description,
                },
            ));
        }

        let sensors: BTreeMap<String, RawSensor> =
            serde_json::from_value(body).map_err(HueError::Payload)?;
        tracing::trace!(count = sensors.len(), "bridge sensors fetched");
        Ok(sensors)
    }
}

impl UpstreamFetcher for BridgeClient {
    type Snapshot = SensorSnapshot;

    async fn refresh(&self) -> Result<SensorSnapshot, FetchError> {
        self.fetch_sensors()
            .await
            .map(Arc::new)
            .map_err(FetchError::transport)
    }
}
