use std::time::Duration;

use rumqttc::{MqttOptions, QoS};
use zenoh::Session;

use crate::config::{MqttConfig, ZenohConfig};
use crate::error::{Error, Result};

/// Connect to Zenoh using the provided configuration.
pub async fn connect(config: &ZenohConfig) -> Result<Session> {
    config.validate()?;

    let mut zenoh_config = zenoh::Config::default();

    zenoh_config
        .insert_json5("mode", &format!("\"{}\"", config.mode))
        .map_err(|e| Error::Config(format!("Failed to set mode: {}", e)))?;

    // Set connect endpoints
    if !config.connect.is_empty() {
        let endpoints_json = serde_json::to_string(&config.connect)
            .map_err(|e| Error::Config(format!("Failed to serialize connect endpoints: {}", e)))?;

        zenoh_config
            .insert_json5("connect/endpoints", &endpoints_json)
            .map_err(|e| Error::Config(format!("Failed to set connect endpoints: {}", e)))?;
    }

    // Set listen endpoints
    if !config.listen.is_empty() {
        let endpoints_json = serde_json::to_string(&config.listen)
            .map_err(|e| Error::Config(format!("Failed to serialize listen endpoints: {}", e)))?;

        zenoh_config
            .insert_json5("listen/endpoints", &endpoints_json)
            .map_err(|e| Error::Config(format!("Failed to set listen endpoints: {}", e)))?;
    }

    tracing::info!(
        mode = %config.mode,
        connect = ?config.connect,
        listen = ?config.listen,
        "Connecting to Zenoh"
    );

    let session = zenoh::open(zenoh_config).await?;

    tracing::info!(zid = %session.zid(), "Connected to Zenoh");

    Ok(session)
}

/// Build the `rumqttc` options for a broker configuration.
pub fn mqtt_options(config: &MqttConfig) -> Result<MqttOptions> {
    config.validate()?;

    let mut options = MqttOptions::new(&config.client_id, &config.host, config.port);
    options.set_keep_alive(Duration::from_secs(config.keep_alive_secs.max(5)));

    if let Some(username) = &config.username {
        options.set_credentials(username, config.password.as_deref().unwrap_or_default());
    }

    Ok(options)
}

/// Convert a numeric QoS level to its `rumqttc` representation.
pub fn mqtt_qos(level: u8) -> Result<QoS> {
    match level {
        0 => Ok(QoS::AtMostOnce),
        1 => Ok(QoS::AtLeastOnce),
        2 => Ok(QoS::ExactlyOnce),
        other => Err(Error::Config(format!(
            "Invalid MQTT qos {} (use 0, 1 or 2)",
            other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mqtt_qos_levels() {
        assert_eq!(mqtt_qos(0).unwrap(), QoS::AtMostOnce);
        assert_eq!(mqtt_qos(1).unwrap(), QoS::AtLeastOnce);
        assert_eq!(mqtt_qos(2).unwrap(), QoS::ExactlyOnce);
        assert!(mqtt_qos(3).is_err());
    }

    #[test]
    fn test_mqtt_options() {
        let config = MqttConfig {
            host: "broker.local".to_string(),
            port: 1884,
            username: Some("stove".to_string()),
            password: Some("secret".to_string()),
            ..Default::default()
        };

        let options = mqtt_options(&config).unwrap();

        assert_eq!(
            options.broker_address(),
            ("broker.local".to_string(), 1884)
        );
        assert_eq!(options.client_id(), "maestro-bridge");
        assert_eq!(options.keep_alive(), Duration::from_secs(30));
    }

    #[test]
    fn test_mqtt_options_rejects_invalid_config() {
        let config = MqttConfig {
            host: String::new(),
            ..Default::default()
        };
        assert!(mqtt_options(&config).is_err());
    }
}
