//! Integration tests for maestro-common library.

use std::io::Write;

use maestro_common::topic::{descendants, join, last_level, mqtt_matches};
use maestro_common::{BusConfig, LoggingConfig, WildcardStyle, load_config};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct FileConfig {
    bus: BusConfig,
    #[serde(default)]
    logging: LoggingConfig,
}

#[test]
fn test_load_config_from_file() {
    let mut file = tempfile::NamedTempFile::new().expect("temp file");
    write!(
        file,
        r#"{{
            // comments are allowed in JSON5
            bus: {{ type: "mqtt", host: "192.168.1.20", qos: 0 }},
            logging: {{ level: "debug" }},
        }}"#
    )
    .expect("write config");

    let config: FileConfig = load_config(file.path()).expect("load config");

    assert_eq!(config.logging.level, "debug");
    match config.bus {
        BusConfig::Mqtt(mqtt) => {
            assert_eq!(mqtt.host, "192.168.1.20");
            assert_eq!(mqtt.qos, 0);
        }
        other => panic!("Expected MQTT bus, got {:?}", other),
    }
}

#[test]
fn test_load_config_missing_file() {
    let result: maestro_common::Result<FileConfig> = load_config("/nonexistent/maestro.json5");
    assert!(matches!(result, Err(maestro_common::Error::Config(_))));
}

#[test]
fn test_command_topics_round_trip_through_wildcards() {
    // A command topic published under the subscription prefix
    let command_topic = join("SUBmcz", "Power_Level");
    assert_eq!(command_topic, "SUBmcz/Power_Level");

    // The bridge subscribes to everything below the prefix
    let filter = descendants("SUBmcz", WildcardStyle::Mqtt);
    assert!(mqtt_matches(&filter, &command_topic));
    assert!(!mqtt_matches(&filter, "PUBmcz/Power_Level"));

    // And recovers the command name from the last level
    assert_eq!(last_level(&command_topic), "Power_Level");
}

#[test]
fn test_wildcard_style_per_backend() {
    let zenoh: BusConfig = maestro_common::parse_config(r#"{ type: "zenoh" }"#).unwrap();
    let mqtt: BusConfig = maestro_common::parse_config(r#"{ type: "mqtt" }"#).unwrap();

    assert_eq!(
        descendants("SUBmcz", zenoh.wildcard_style()),
        "SUBmcz/**"
    );
    assert_eq!(descendants("SUBmcz", mqtt.wildcard_style()), "SUBmcz/#");
}
