//! Hue integration configuration.

use std::time::Duration;

use serde::Deserialize;

/// Connection and polling settings for one Hue bridge.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HueConfig {
    /// Bridge address, `host` or `host:port`.
    pub host: String,
    /// API username (the key created by pressing the link button).
    pub username: String,
    /// Bridge identifier used to build stable unique ids.
    ///
    /// Falls back to `host` when unset.
    pub bridge_id: Option<String>,
    /// Expose the software (CLIP) sensors as well as the physical ones.
    pub allow_clip_sensors: bool,
    /// Upper bound for one bridge request, in seconds.
    pub request_timeout_secs: u16,
    /// Interval between two poll cycles, in seconds.
    pub scan_interval_secs: u16,
}

impl Default for HueConfig {
    fn default() -> Self {
        Self {
            host: String::new(),
            username: String::new(),
            bridge_id: None,
            allow_clip_sensors: false,
            request_timeout_secs: 4,
            scan_interval_secs: 1,
        }
    }
}

impl HueConfig {
    #[must_use]
    pub fn bridge_id(&self) -> &str {
        self.bridge_id.as_deref().unwrap_or(&self.host)
    }

    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(u64::from(self.request_timeout_secs))
    }

    #[must_use]
    pub fn scan_interval(&self) -> Duration {
        Duration::from_secs(u64::from(self.scan_interval_secs))
    }

    /// Check that the bridge can be addressed.
    ///
    /// # Errors
    ///
    /// Returns a message naming the first missing or invalid setting.
    pub fn validate(&self) -> Result<(), String> {
        if self.host.is_empty() {
            return Err("hue.host must not be empty".to_string());
        }
        if self.username.is_empty() {
            return Err("hue.username must not be empty".to_string());
        }
        if self.request_timeout_secs == 0 {
            return Err("hue.request_timeout_secs must be greater than 0".to_string());
        }
        if self.scan_interval_secs == 0 {
            return Err("hue.scan_interval_secs must be greater than 0".to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_apply_defaults_for_missing_fields() {
        let config: HueConfig = toml::from_str(
            r#"
            host = "192.168.1.20"
            username = "secret"
            "#,
        )
        .unwrap();

        assert!(!config.allow_clip_sensors);
        assert_eq!(config.request_timeout(), Duration::from_secs(4));
        assert_eq!(config.scan_interval(), Duration::from_secs(1));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn should_fall_back_to_host_for_bridge_id() {
        let mut config = HueConfig {
            host: "bridge.local".to_string(),
            ..HueConfig::default()
        };
        assert_eq!(config.bridge_id(), "bridge.local");

        config.bridge_id = Some("001788FFFE23BFC2".to_string());
        assert_eq!(config.bridge_id(), "001788FFFE23BFC2");
    }

    #[test]
    fn should_reject_missing_username() {
        let config = HueConfig {
            host: "bridge.local".to_string(),
            ..HueConfig::default()
        };
        assert_eq!(
            config.validate().unwrap_err(),
            "hue.username must not be empty"
        );
    }

    #[test]
    fn should_reject_zero_scan_interval() {
        let config = HueConfig {
            host: "bridge.local".to_string(),
            username: "secret".to_string(),
            scan_interval_secs: 0,
            ..HueConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
