//! Cloud relay configuration.

use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

/// Mode whose endpoints come entirely from this configuration.
pub const MODE_DEV: &str = "development";

/// Configuration for the cloud relay and the account API.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CloudConfig {
    /// Deployment name; prefixes the credential file names.
    pub mode: String,
    pub cognito_client_id: String,
    pub user_pool_id: String,
    /// AWS region of the user pool (e.g. `us-east-1`).
    pub region: String,
    /// Base URL of the account API (certificate retrieval).
    pub api_base: String,
    /// MQTT broker hostname.
    pub iot_endpoint: String,
    pub iot_port: u16,
    /// Directory holding certificates and user info.
    pub config_dir: PathBuf,
    /// Root CA of the broker. Defaults to `<config_dir>/aws_iot_root_cert.pem`.
    pub root_ca_path: Option<PathBuf>,
    pub keep_alive_secs: u16,
    /// How long to wait for the broker to accept the connection, in seconds.
    pub connect_timeout_secs: u16,
}

impl Default for CloudConfig {
    fn default() -> Self {
        Self {
            mode: MODE_DEV.to_string(),
            cognito_client_id: String::new(),
            user_pool_id: String::new(),
            region: String::new(),
            api_base: String::new(),
            iot_endpoint: String::new(),
            iot_port: 8883,
            config_dir: PathBuf::from(".cloud"),
            root_ca_path: None,
            keep_alive_secs: 300,
            connect_timeout_secs: 10,
        }
    }
}

impl CloudConfig {
    #[must_use]
    pub fn root_ca_path(&self) -> PathBuf {
        self.root_ca_path
            .clone()
            .unwrap_or_else(|| self.config_dir.join("aws_iot_root_cert.pem"))
    }

    #[must_use]
    pub fn keep_alive(&self) -> Duration {
        Duration::from_secs(u64::from(self.keep_alive_secs))
    }

    #[must_use]
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(u64::from(self.connect_timeout_secs))
    }

    /// Check that every required setting is present.
    ///
    /// # Errors
    ///
    /// Returns a message naming the first missing or invalid setting.
    pub fn validate(&self) -> Result<(), String> {
        let required = [
            ("mode", self.mode.as_str()),
            ("cognito_client_id", self.cognito_client_id.as_str()),
            ("user_pool_id", self.user_pool_id.as_str()),
            ("region", self.region.as_str()),
            ("api_base", self.api_base.as_str()),
            ("iot_endpoint", self.iot_endpoint.as_str()),
        ];
        if let Some((name, _)) = required.iter().find(|(_, value)| value.is_empty()) {
            return Err(format!("cloud.{name} must not be empty"));
        }
        if self.keep_alive_secs == 0 {
            return Err("cloud.keep_alive_secs must be greater than 0".to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn complete() -> CloudConfig {
        toml::from_str(
            r#"
            cognito_client_id = "client"
            user_pool_id = "us-east-1_pool"
            region = "us-east-1"
            api_base = "https://api.example.com"
            iot_endpoint = "iot.example.com"
            "#,
        )
        .unwrap()
    }

    #[test]
    fn should_have_sensible_defaults() {
        let config = complete();
        assert_eq!(config.mode, "development");
        assert_eq!(config.iot_port, 8883);
        assert_eq!(config.keep_alive(), Duration::from_secs(300));
        assert_eq!(config.connect_timeout(), Duration::from_secs(10));
        assert_eq!(config.root_ca_path(), PathBuf::from(".cloud/aws_iot_root_cert.pem"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn should_name_missing_setting() {
        let config = CloudConfig {
            region: String::new(),
            ..complete()
        };
        assert_eq!(config.validate().unwrap_err(), "cloud.region must not be empty");
    }

    #[test]
    fn should_prefer_explicit_root_ca() {
        let config = CloudConfig {
            root_ca_path: Some(PathBuf::from("/etc/ssl/amazon-root.pem")),
            ..complete()
        };
        assert_eq!(config.root_ca_path(), PathBuf::from("/etc/ssl/amazon-root.pem"));
    }
}
