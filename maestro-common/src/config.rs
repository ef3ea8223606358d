use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::topic::WildcardStyle;

/// Zenoh connection configuration.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ZenohConfig {
    /// Zenoh mode: "client", "peer", or "router".
    #[serde(default = "default_mode")]
    pub mode: String,

    /// Endpoints to connect to (for client mode).
    #[serde(default)]
    pub connect: Vec<String>,

    /// Endpoints to listen on (for peer/router mode).
    #[serde(default)]
    pub listen: Vec<String>,
}

fn default_mode() -> String {
    "peer".to_string()
}

impl Default for ZenohConfig {
    fn default() -> Self {
        Self {
            mode: default_mode(),
            connect: Vec::new(),
            listen: Vec::new(),
        }
    }
}

impl ZenohConfig {
    /// Validate the Zenoh settings.
    pub fn validate(&self) -> Result<()> {
        match self.mode.as_str() {
            "client" | "peer" | "router" => Ok(()),
            other => Err(Error::Config(format!(
                "Invalid Zenoh mode: '{}'. Expected 'client', 'peer', or 'router'",
                other
            ))),
        }
    }
}

/// MQTT broker configuration.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MqttConfig {
    /// Broker host name or IP address.
    #[serde(default = "default_mqtt_host")]
    pub host: String,

    /// Broker TCP port.
    #[serde(default = "default_mqtt_port")]
    pub port: u16,

    /// User name, when the broker requires authentication.
    #[serde(default)]
    pub username: Option<String>,

    /// Password, used together with `username`.
    #[serde(default)]
    pub password: Option<String>,

    /// MQTT client identifier.
    #[serde(default = "default_client_id")]
    pub client_id: String,

    /// QoS level for subscriptions and publications (0, 1 or 2).
    #[serde(default = "default_qos")]
    pub qos: u8,

    /// Keep-alive interval in seconds.
    #[serde(default = "default_keep_alive_secs")]
    pub keep_alive_secs: u64,
}

fn default_mqtt_host() -> String {
    "127.0.0.1".to_string()
}

fn default_mqtt_port() -> u16 {
    1883
}

fn default_client_id() -> String {
    "maestro-bridge".to_string()
}

fn default_qos() -> u8 {
    1
}

fn default_keep_alive_secs() -> u64 {
    30
}

impl Default for MqttConfig {
    fn default() -> Self {
        Self {
            host: default_mqtt_host(),
            port: default_mqtt_port(),
            username: None,
            password: None,
            client_id: default_client_id(),
            qos: default_qos(),
            keep_alive_secs: default_keep_alive_secs(),
        }
    }
}

impl MqttConfig {
    /// Validate the broker settings.
    pub fn validate(&self) -> Result<()> {
        if self.host.is_empty() {
            return Err(Error::Config("MQTT host cannot be empty".to_string()));
        }
        if self.port == 0 {
            return Err(Error::Config("MQTT port cannot be 0".to_string()));
        }
        if self.client_id.is_empty() {
            return Err(Error::Config("MQTT client_id cannot be empty".to_string()));
        }
        if self.qos > 2 {
            return Err(Error::Config(format!(
                "Invalid MQTT qos {} (use 0, 1 or 2)",
                self.qos
            )));
        }
        if self.password.is_some() && self.username.is_none() {
            return Err(Error::Config(
                "MQTT password given without a username".to_string(),
            ));
        }
        Ok(())
    }
}

/// Message bus backend selection.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum BusConfig {
    /// Publish and subscribe through Zenoh.
    Zenoh(ZenohConfig),
    /// Publish and subscribe through an MQTT broker.
    Mqtt(MqttConfig),
}

impl Default for BusConfig {
    fn default() -> Self {
        BusConfig::Zenoh(ZenohConfig::default())
    }
}

impl BusConfig {
    /// Wildcard syntax understood by this backend.
    pub fn wildcard_style(&self) -> WildcardStyle {
        match self {
            BusConfig::Zenoh(_) => WildcardStyle::Zenoh,
            BusConfig::Mqtt(_) => WildcardStyle::Mqtt,
        }
    }

    /// Validate the backend settings.
    pub fn validate(&self) -> Result<()> {
        match self {
            BusConfig::Zenoh(zenoh) => zenoh.validate(),
            BusConfig::Mqtt(mqtt) => mqtt.validate(),
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable text format (default).
    #[default]
    Text,
    /// Structured JSON format.
    Json,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level: "trace", "debug", "info", "warn", "error".
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log output format: "text" or "json".
    #[serde(default)]
    pub format: LogFormat,

    /// Optional activity log file, written in addition to stdout.
    #[serde(default)]
    pub file: Option<PathBuf>,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
            file: None,
        }
    }
}

/// Load a configuration file in JSON5 format.
pub fn load_config<T: for<'de> Deserialize<'de>>(path: impl AsRef<Path>) -> Result<T> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| {
        Error::Config(format!(
            "Failed to read config file '{}': {}",
            path.display(),
            e
        ))
    })?;

    json5::from_str(&content).map_err(|e| {
        Error::Config(format!(
            "Failed to parse config file '{}': {}",
            path.display(),
            e
        ))
    })
}

/// Load a configuration from a JSON5 string.
pub fn parse_config<T: for<'de> Deserialize<'de>>(content: &str) -> Result<T> {
    json5::from_str(content).map_err(|e| Error::Config(format!("Failed to parse config: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Deserialize)]
    struct Sample {
        #[serde(default)]
        bus: BusConfig,
        #[serde(default)]
        logging: LoggingConfig,
    }

    #[test]
    fn test_parse_mqtt_bus() {
        let json5 = r#"
        {
            bus: {
                type: "mqtt",
                host: "10.0.0.2",
                username: "stove",
                password: "secret",
            },
        }
        "#;

        let config: Sample = parse_config(json5).unwrap();

        match config.bus {
            BusConfig::Mqtt(mqtt) => {
                assert_eq!(mqtt.host, "10.0.0.2");
                assert_eq!(mqtt.port, 1883);
                assert_eq!(mqtt.username.as_deref(), Some("stove"));
                assert_eq!(mqtt.qos, 1);
                assert_eq!(mqtt.client_id, "maestro-bridge");
            }
            other => panic!("Expected MQTT bus, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_zenoh_bus() {
        let json5 = r#"
        {
            bus: {
                type: "zenoh",
                mode: "client",
                connect: ["tcp/localhost:7447"],
            },
        }
        "#;

        let config: Sample = parse_config(json5).unwrap();

        assert_eq!(
            config.bus,
            BusConfig::Zenoh(ZenohConfig {
                mode: "client".to_string(),
                connect: vec!["tcp/localhost:7447".to_string()],
                listen: Vec::new(),
            })
        );
        assert_eq!(config.bus.wildcard_style(), WildcardStyle::Zenoh);
    }

    #[test]
    fn test_default_config() {
        let config: Sample = parse_config("{}").unwrap();

        assert_eq!(config.bus, BusConfig::default());
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.logging.format, LogFormat::Text);
        assert!(config.logging.file.is_none());
    }

    #[test]
    fn test_json_logging_with_file() {
        let json5 = r#"
        {
            logging: {
                level: "debug",
                format: "json",
                file: "/var/log/maestro/activity.log",
            },
        }
        "#;

        let config: Sample = parse_config(json5).unwrap();

        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.logging.format, LogFormat::Json);
        assert_eq!(
            config.logging.file,
            Some(PathBuf::from("/var/log/maestro/activity.log"))
        );
    }

    #[test]
    fn test_validate_mqtt() {
        assert!(MqttConfig::default().validate().is_ok());

        let bad_qos = MqttConfig {
            qos: 3,
            ..Default::default()
        };
        assert!(bad_qos.validate().is_err());

        let orphan_password = MqttConfig {
            password: Some("secret".to_string()),
            ..Default::default()
        };
        assert!(orphan_password.validate().is_err());
    }

    #[test]
    fn test_validate_zenoh_mode() {
        let config = ZenohConfig {
            mode: "broker".to_string(),
            ..Default::default()
        };
        assert!(BusConfig::Zenoh(config).validate().is_err());
    }
}
