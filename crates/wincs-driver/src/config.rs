//! Driver configuration.
//!
//! Sizes every fixed pool the driver allocates at creation. Loadable from
//! YAML or JSON; any field left out takes its default.

use std::path::Path;

use serde::{Deserialize, Serialize};

use wincs_protocol::TLS_MAX_CIPHER_SUITES;

use crate::context::ChannelMask;
use crate::error::ConfigError;

/// Configuration for a [`Driver`](crate::Driver) instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DriverConfig {
    /// TLS context slots.
    pub num_tls_contexts: usize,
    /// Cipher-suite context slots.
    pub num_cipher_suites: usize,
    /// Peer association slots while running as an access point.
    pub num_ap_assocs: usize,
    /// Scan results kept per scan.
    pub scan_cache_size: usize,
    /// Requests that may await device status at once.
    pub max_inflight_requests: usize,
    /// Commands a single request may hold. A full cipher-suite update needs
    /// one more than the suite limit.
    pub max_request_commands: usize,
    /// Bytes of string/byte-array data a single request may carry.
    pub max_request_extra: usize,
    /// Network interfaces the device exposes.
    pub num_netifs: u8,
    /// Channels permitted by the regulatory domain.
    pub regulatory_channel_mask: ChannelMask,
    /// Station connection timeout sent with every connect.
    pub sta_conn_timeout_ms: u32,
}

impl Default for DriverConfig {
    fn default() -> Self {
        DriverConfig {
            num_tls_contexts: 2,
            num_cipher_suites: 2,
            num_ap_assocs: 8,
            scan_cache_size: 50,
            max_inflight_requests: 8,
            max_request_commands: TLS_MAX_CIPHER_SUITES + 1,
            max_request_extra: 4096,
            num_netifs: 2,
            regulatory_channel_mask: ChannelMask::ALL_2_4GHZ,
            sta_conn_timeout_ms: 10_000,
        }
    }
}

impl DriverConfig {
    /// Parse a YAML document.
    pub fn from_yaml_str(s: &str) -> Result<Self, ConfigError> {
        let config: DriverConfig = serde_yaml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse a JSON document.
    pub fn from_json_str(s: &str) -> Result<Self, ConfigError> {
        let config: DriverConfig = serde_json::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a config file. `.json` files are read as JSON, anything else as YAML.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Self::from_json_str(&text),
            _ => Self::from_yaml_str(&text),
        }
    }

    /// Check that every pool is usable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let pools = [
            ("num_tls_contexts", self.num_tls_contexts),
            ("num_cipher_suites", self.num_cipher_suites),
            ("num_ap_assocs", self.num_ap_assocs),
            ("scan_cache_size", self.scan_cache_size),
            ("max_inflight_requests", self.max_inflight_requests),
            ("max_request_commands", self.max_request_commands),
            ("num_netifs", usize::from(self.num_netifs)),
        ];
        for (name, value) in pools {
            if value == 0 {
                return Err(ConfigError::Invalid(format!("{} must be non-zero", name)));
            }
        }
        // Handles are u8 on the wire.
        if self.num_tls_contexts > 255 || self.num_cipher_suites > 255 {
            return Err(ConfigError::Invalid(
                "context pools are limited to 255 slots".to_string(),
            ));
        }
        if self.max_request_commands <= TLS_MAX_CIPHER_SUITES {
            return Err(ConfigError::Invalid(format!(
                "max_request_commands must be at least {}",
                TLS_MAX_CIPHER_SUITES + 1
            )));
        }
        if self.regulatory_channel_mask.is_empty() {
            return Err(ConfigError::Invalid(
                "regulatory_channel_mask permits no channels".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        DriverConfig::default().validate().unwrap();
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let config = DriverConfig::from_yaml_str(
            "scan_cache_size: 4\nregulatory_channel_mask: 2047\n",
        )
        .unwrap();
        assert_eq!(config.scan_cache_size, 4);
        assert_eq!(config.regulatory_channel_mask, ChannelMask(0x07FF));
        assert_eq!(config.num_tls_contexts, 2);
    }

    #[test]
    fn test_json_config() {
        let config = DriverConfig::from_json_str(r#"{"num_ap_assocs": 3}"#).unwrap();
        assert_eq!(config.num_ap_assocs, 3);
    }

    #[test]
    fn test_rejects_zero_pool() {
        let err = DriverConfig::from_yaml_str("num_cipher_suites: 0").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_request_commands_fit_cipher_update() {
        assert_eq!(
            DriverConfig::default().max_request_commands,
            TLS_MAX_CIPHER_SUITES + 1
        );
        let err = DriverConfig::from_yaml_str("max_request_commands: 32").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_rejects_unknown_field() {
        assert!(matches!(
            DriverConfig::from_yaml_str("bogus: 1"),
            Err(ConfigError::Yaml(_))
        ));
    }
}
