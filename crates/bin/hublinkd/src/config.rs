//! Configuration loading: TOML file with environment variable overrides.
//!
//! Looks for `hublink.toml` in the working directory unless another path is
//! given. Integrations without a section stay disabled, so the file is
//! optional. Environment variables take precedence over file values.

use std::path::Path;

use hublink_adapter_cloud::CloudConfig;
use hublink_adapter_hue::HueConfig;
use serde::Deserialize;

const DEFAULT_PATH: &str = "hublink.toml";

/// Top-level configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub logging: LoggingConfig,
    /// Hue bridge to poll; disabled when absent.
    pub hue: Option<HueConfig>,
    /// Cloud relay; disabled when absent.
    pub cloud: Option<CloudConfig>,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive (`RUST_LOG` syntax).
    pub filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "hublinkd=info,hublink=info".to_string(),
        }
    }
}

impl Config {
    /// Load the configuration file (if present) then apply environment
    /// overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but is malformed, or if the
    /// result does not validate.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::from_file(path, true)?,
            None => Self::from_file(Path::new(DEFAULT_PATH), false)?,
        };
        config.apply_overrides(|name| std::env::var(name).ok());
        config.validate()?;
        Ok(config)
    }

    fn from_file(path: &Path, required: bool) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(content) => toml::from_str(&content).map_err(ConfigError::Parse),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound && !required => {
                Ok(Self::default())
            }
            Err(err) => Err(ConfigError::Io(err)),
        }
    }

    fn apply_overrides(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(val) = var("HUBLINK_LOG") {
            self.logging.filter = val;
        }
        if let Some(val) = var("RUST_LOG") {
            self.logging.filter = val;
        }
        if let Some(val) = var("HUBLINK_HUE_HOST") {
            self.hue.get_or_insert_with(HueConfig::default).host = val;
        }
        if let Some(val) = var("HUBLINK_HUE_USERNAME") {
            self.hue.get_or_insert_with(HueConfig::default).username = val;
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if let Some(hue) = &self.hue {
            hue.validate().map_err(ConfigError::Validation)?;
        }
        if let Some(cloud) = &self.cloud {
            cloud.validate().map_err(ConfigError::Validation)?;
        }
        Ok(())
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to parse config file")]
    Parse(#[from] toml::de::Error),
    #[error("failed to read config file")]
    Io(#[from] std::io::Error),
    #[error("invalid configuration: {0}")]
    Validation(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn should_disable_integrations_by_default() {
        let config = Config::default();
        assert!(config.hue.is_none());
        assert!(config.cloud.is_none());
        assert_eq!(config.logging.filter, "hublinkd=info,hublink=info");
    }

    #[test]
    fn should_parse_full_toml() {
        let toml = "
            [logging]
            filter = 'debug'

            [hue]
            host = '192.168.1.20'
            username = 'abcdef'
            scan_interval_secs = 5

            [cloud]
            mode = 'production'
            cognito_client_id = 'client'
            user_pool_id = 'pool'
            region = 'us-east-1'
            api_base = 'https://api.example.com'
            iot_endpoint = 'iot.example.com'
        ";
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.logging.filter, "debug");
        let hue = config.hue.as_ref().unwrap();
        assert_eq!(hue.host, "192.168.1.20");
        assert_eq!(hue.scan_interval_secs, 5);
        assert_eq!(hue.request_timeout_secs, 4);
        let cloud = config.cloud.as_ref().unwrap();
        assert_eq!(cloud.mode, "production");
        assert_eq!(cloud.iot_port, 8883);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn should_return_default_when_file_not_found() {
        let config = Config::from_file(Path::new("nonexistent.toml"), false).unwrap();
        assert!(config.hue.is_none());
    }

    #[test]
    fn should_fail_when_explicit_file_not_found() {
        let result = Config::from_file(Path::new("nonexistent.toml"), true);
        assert!(matches!(result, Err(ConfigError::Io(_))));
    }

    #[test]
    fn should_enable_hue_from_environment() {
        let mut config = Config::default();
        config.apply_overrides(|name| match name {
            "HUBLINK_HUE_HOST" => Some("10.0.0.2".to_string()),
            "HUBLINK_HUE_USERNAME" => Some("key".to_string()),
            _ => None,
        });
        let hue = config.hue.as_ref().unwrap();
        assert_eq!(hue.host, "10.0.0.2");
        assert_eq!(hue.username, "key");
    }

    #[test]
    fn should_prefer_rust_log_over_hublink_log() {
        let mut config = Config::default();
        config.apply_overrides(|name| match name {
            "HUBLINK_LOG" => Some("warn".to_string()),
            "RUST_LOG" => Some("trace".to_string()),
            _ => None,
        });
        assert_eq!(config.logging.filter, "trace");
    }

    #[test]
    fn should_keep_file_values_without_environment() {
        let mut config: Config = toml::from_str("[logging]\nfilter = 'debug'").unwrap();
        config.apply_overrides(no_env);
        assert_eq!(config.logging.filter, "debug");
    }

    #[test]
    fn should_reject_hue_section_without_username() {
        let config: Config = toml::from_str("[hue]\nhost = '10.0.0.2'").unwrap();
        assert!(matches!(config.validate(), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn should_reject_incomplete_cloud_section() {
        let config: Config = toml::from_str("[cloud]\nregion = 'us-east-1'").unwrap();
        assert!(matches!(config.validate(), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn should_report_parse_error_for_invalid_toml() {
        let result: Result<Config, _> = toml::from_str("invalid {{{");
        assert!(result.is_err());
    }
}
