//! Configuration for the Maestro bridge.

use std::time::Duration;

use maestro_bridge_framework::topic::{descendants, has_wildcards};
use maestro_bridge_framework::{BridgeConfig, BridgeError, BusConfig, LoggingConfig, WildcardStyle};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Validation error: {0}")]
    Validation(String),
}

/// Complete bridge configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MaestroBridgeConfig {
    /// Message bus settings
    #[serde(default)]
    pub bus: BusConfig,

    /// Stove and bridging settings
    pub maestro: MaestroConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Encoding of bus messages.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PayloadMode {
    /// One sub-topic per command or state key, bare values.
    #[default]
    Topic,
    /// A single topic carrying JSON objects.
    Json,
}

impl PayloadMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            PayloadMode::Topic => "topic",
            PayloadMode::Json => "json",
        }
    }
}

/// Stove connection and bridging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MaestroConfig {
    /// Stove host name or IP address.
    pub host: String,

    /// Stove WebSocket port (default: 81).
    #[serde(default = "default_port")]
    pub port: u16,

    /// Bus message encoding (default: topic).
    #[serde(default)]
    pub payload_mode: PayloadMode,

    /// Topic that state and status are published under (default: "PUBmcz").
    #[serde(default = "default_publish_topic")]
    pub publish_topic: String,

    /// Topic that commands are received on (default: "SUBmcz").
    #[serde(default = "default_subscribe_topic")]
    pub subscribe_topic: String,

    /// Interval between state requests while connected (default: 15).
    #[serde(default = "default_info_interval")]
    pub info_interval_secs: u64,

    /// Interval between command queue drains (default: 250).
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,

    /// Lifetime of one device session (default: 360).
    #[serde(default = "default_session_duration")]
    pub session_duration_secs: u64,

    /// Pause before reconnecting (default: 1000).
    #[serde(default = "default_reconnect_delay")]
    pub reconnect_delay_ms: u64,

    /// Ended sessions tolerated before "disconnected" is published (default: 3).
    #[serde(default = "default_reconnects_before_alert")]
    pub reconnects_before_alert: u32,

    /// Also reset the reconnect count on every successful connection (default: false).
    #[serde(default)]
    pub reset_streak_on_connect: bool,

    /// WebSocket ping interval (default: 5).
    #[serde(default = "default_ping_interval")]
    pub ping_interval_secs: u64,

    /// Maximum wait for a pong (default: 2).
    #[serde(default = "default_ping_timeout")]
    pub ping_timeout_secs: u64,

    /// WebSocket handshake timeout (default: 10).
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    /// Publish bridge lifecycle status on `<publish_topic>/@/status`.
    #[serde(default)]
    pub bridge_status: bool,
}

fn default_port() -> u16 {
    81
}

fn default_publish_topic() -> String {
    "PUBmcz".to_string()
}

fn default_subscribe_topic() -> String {
    "SUBmcz".to_string()
}

fn default_info_interval() -> u64 {
    15
}

fn default_poll_interval() -> u64 {
    250
}

fn default_session_duration() -> u64 {
    360
}

fn default_reconnect_delay() -> u64 {
    1000
}

fn default_reconnects_before_alert() -> u32 {
    3
}

fn default_ping_interval() -> u64 {
    5
}

fn default_ping_timeout() -> u64 {
    2
}

fn default_connect_timeout() -> u64 {
    10
}

impl MaestroConfig {
    /// WebSocket URL of the stove.
    pub fn device_url(&self) -> String {
        format!("ws://{}:{}", self.host, self.port)
    }

    /// Topic filter for incoming commands.
    ///
    /// Topic mode listens below the subscribe topic, JSON mode on it.
    pub fn command_filter(&self, style: WildcardStyle) -> String {
        match self.payload_mode {
            PayloadMode::Topic => descendants(&self.subscribe_topic, style),
            PayloadMode::Json => self.subscribe_topic.clone(),
        }
    }

    pub fn info_interval(&self) -> Duration {
        Duration::from_secs(self.info_interval_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn session_duration(&self) -> Duration {
        Duration::from_secs(self.session_duration_secs)
    }

    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }

    pub fn ping_interval(&self) -> Duration {
        Duration::from_secs(self.ping_interval_secs)
    }

    pub fn ping_timeout(&self) -> Duration {
        Duration::from_secs(self.ping_timeout_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    /// Validate the stove settings.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.host.is_empty() {
            return Err(ConfigError::Validation(
                "Stove host cannot be empty".to_string(),
            ));
        }

        if self.port == 0 {
            return Err(ConfigError::Validation("Stove port cannot be 0".to_string()));
        }

        for (name, topic) in [
            ("publish_topic", &self.publish_topic),
            ("subscribe_topic", &self.subscribe_topic),
        ] {
            if topic.is_empty() {
                return Err(ConfigError::Validation(format!("{} cannot be empty", name)));
            }
            if has_wildcards(topic) {
                return Err(ConfigError::Validation(format!(
                    "{} '{}' must not contain wildcards",
                    name, topic
                )));
            }
        }

        for (name, value) in [
            ("info_interval_secs", self.info_interval_secs),
            ("poll_interval_ms", self.poll_interval_ms),
            ("session_duration_secs", self.session_duration_secs),
            ("ping_interval_secs", self.ping_interval_secs),
            ("ping_timeout_secs", self.ping_timeout_secs),
            ("connect_timeout_secs", self.connect_timeout_secs),
        ] {
            if value == 0 {
                return Err(ConfigError::Validation(format!("{} must be > 0", name)));
            }
        }

        if self.poll_interval() >= self.session_duration() {
            return Err(ConfigError::Validation(
                "poll_interval_ms must be shorter than session_duration_secs".to_string(),
            ));
        }

        if self.ping_timeout_secs >= self.ping_interval_secs {
            return Err(ConfigError::Validation(
                "ping_timeout_secs must be shorter than ping_interval_secs".to_string(),
            ));
        }

        Ok(())
    }
}

impl BridgeConfig for MaestroBridgeConfig {
    fn bus(&self) -> &BusConfig {
        &self.bus
    }

    fn logging(&self) -> &LoggingConfig {
        &self.logging
    }

    fn key_prefix(&self) -> &str {
        &self.maestro.publish_topic
    }

    fn validate(&self) -> maestro_bridge_framework::Result<()> {
        self.bus.validate().map_err(BridgeError::from)?;
        self.maestro
            .validate()
            .map_err(|e| BridgeError::validation(e.to_string()))
    }
}
