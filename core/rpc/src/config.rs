// Copyright Noderpc Contributors
// SPDX-License-Identifier: Apache-2.0

//! Client and server configuration
//!
//! Plain serde structs, loadable from YAML. Everything has a usable
//! default; the only mandatory value is the client's target endpoint.

use std::time::Duration;

use serde::Deserialize;

use crate::error::ConfigError;
use crate::wire::DEFAULT_MAX_FRAME_SIZE;

fn default_connect_timeout() -> Duration {
    Duration::from_secs(5)
}

fn default_initial_interval() -> Duration {
    Duration::from_millis(50)
}

fn default_max_interval() -> Duration {
    Duration::from_secs(2)
}

fn default_multiplier() -> f64 {
    2.0
}

fn default_max_frame_size() -> usize {
    DEFAULT_MAX_FRAME_SIZE
}

fn default_inbound_window() -> usize {
    32
}

fn default_writer_queue() -> usize {
    64
}

/// Exponential backoff for connection establishment.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BackoffConfig {
    #[serde(
        default = "default_initial_interval",
        deserialize_with = "duration_str::deserialize_duration"
    )]
    pub initial_interval: Duration,
    #[serde(
        default = "default_max_interval",
        deserialize_with = "duration_str::deserialize_duration"
    )]
    pub max_interval: Duration,
    #[serde(default = "default_multiplier")]
    pub multiplier: f64,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            initial_interval: default_initial_interval(),
            max_interval: default_max_interval(),
            multiplier: default_multiplier(),
        }
    }
}

impl BackoffConfig {
    /// Delay before retry number `attempt` (0-based), capped at the maximum.
    pub fn delay(&self, attempt: u32) -> Duration {
        let factor = self.multiplier.powi(attempt as i32);
        let delay = self.initial_interval.mul_f64(factor.max(1.0));
        delay.min(self.max_interval)
    }
}

/// Settings for a client channel.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ClientConfig {
    /// Remote endpoint in `host:port` form.
    pub endpoint: String,
    #[serde(
        default = "default_connect_timeout",
        deserialize_with = "duration_str::deserialize_duration"
    )]
    pub connect_timeout: Duration,
    #[serde(default)]
    pub backoff: BackoffConfig,
    #[serde(default = "default_max_frame_size")]
    pub max_frame_size: usize,
    /// Undelivered response messages buffered per call before the reader
    /// stops pulling frames off the socket.
    #[serde(default = "default_inbound_window")]
    pub inbound_window: usize,
}

impl ClientConfig {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            connect_timeout: default_connect_timeout(),
            backoff: BackoffConfig::default(),
            max_frame_size: default_max_frame_size(),
            inbound_window: default_inbound_window(),
        }
    }

    pub fn from_yaml(text: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yaml::from_str(text).map_err(ConfigError::Parse)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<std::path::Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(ConfigError::Read)?;
        Self::from_yaml(&text)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.endpoint.rsplit_once(':').is_none_or(|(host, port)| {
            host.is_empty() || port.parse::<u16>().is_err()
        }) {
            return Err(ConfigError::InvalidEndpoint(self.endpoint.clone()));
        }
        Ok(())
    }
}

/// Settings for a server.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    #[serde(default = "default_max_frame_size")]
    pub max_frame_size: usize,
    /// Outbound frames buffered per connection before producing handlers
    /// are suspended.
    #[serde(default = "default_writer_queue")]
    pub writer_queue: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            max_frame_size: default_max_frame_size(),
            writer_queue: default_writer_queue(),
        }
    }
}

impl ServerConfig {
    pub fn from_yaml(text: &str) -> Result<Self, ConfigError> {
        serde_yaml::from_str(text).map_err(ConfigError::Parse)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_config_from_yaml() {
        let config = ClientConfig::from_yaml(
            "endpoint: 127.0.0.1:4440\nconnect_timeout: 1s\nbackoff:\n  initial_interval: 10ms\n",
        )
        .unwrap();
        assert_eq!(config.endpoint, "127.0.0.1:4440");
        assert_eq!(config.connect_timeout, Duration::from_secs(1));
        assert_eq!(config.backoff.initial_interval, Duration::from_millis(10));
        assert_eq!(config.backoff.max_interval, Duration::from_secs(2));
    }

    #[test]
    fn test_invalid_endpoint_rejected() {
        let err = ClientConfig::from_yaml("endpoint: not-an-endpoint\n").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEndpoint(_)));
    }

    #[test]
    fn test_backoff_delay_caps_at_max() {
        let backoff = BackoffConfig {
            initial_interval: Duration::from_millis(100),
            max_interval: Duration::from_millis(500),
            multiplier: 2.0,
        };
        assert_eq!(backoff.delay(0), Duration::from_millis(100));
        assert_eq!(backoff.delay(1), Duration::from_millis(200));
        assert_eq!(backoff.delay(4), Duration::from_millis(500));
    }
}
