//! Translation between bus messages and the stove protocol.

use maestro_bridge_framework::Publication;
use maestro_bridge_framework::topic::{join, last_level};
use serde::Deserialize;
use thiserror::Error;

use crate::command::{CommandKind, CommandValue};
use crate::config::{MaestroConfig, PayloadMode};
use crate::frame::{Frame, FrameError, StateSnapshot, parse_frame};
use crate::supervisor::LinkStatus;

/// Key of connection status publications.
pub const STATUS_KEY: &str = "Status";

/// Errors decoding an inbound bus message.
#[derive(Debug, Error)]
pub enum MessageError {
    #[error("Payload is not valid UTF-8")]
    Utf8(#[from] std::str::Utf8Error),
    #[error("Invalid JSON command: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Invalid command value '{0}'")]
    Value(String),
}

/// JSON command body: `{"Command": "Power_Level", "Value": 3}`.
#[derive(Debug, Deserialize)]
struct JsonCommand {
    #[serde(rename = "Command")]
    command: String,
    #[serde(rename = "Value")]
    value: JsonValue,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum JsonValue {
    Number(f64),
    Text(String),
}

fn parse_value(raw: &str) -> Result<f64, MessageError> {
    raw.trim()
        .parse::<f64>()
        .ok()
        .filter(|value| value.is_finite())
        .ok_or_else(|| MessageError::Value(raw.to_string()))
}

/// Stateless translator configured with the payload mode and publish topic.
#[derive(Debug, Clone)]
pub struct ProtocolBridge {
    mode: PayloadMode,
    publish_topic: String,
}

impl ProtocolBridge {
    pub fn new(mode: PayloadMode, publish_topic: impl Into<String>) -> Self {
        Self {
            mode,
            publish_topic: publish_topic.into(),
        }
    }

    pub fn from_config(config: &MaestroConfig) -> Self {
        Self::new(config.payload_mode, config.publish_topic.clone())
    }

    /// Decode an inbound bus message into a command.
    ///
    /// Unrecognized command names decode to [`CommandKind::Unknown`].
    pub fn parse_command(&self, topic: &str, payload: &[u8]) -> Result<CommandValue, MessageError> {
        let payload = std::str::from_utf8(payload)?;

        match self.mode {
            PayloadMode::Topic => {
                let kind = CommandKind::from_name(last_level(topic));
                Ok(CommandValue::new(kind, parse_value(payload)?))
            }
            PayloadMode::Json => {
                let body: JsonCommand = serde_json::from_str(payload)?;
                let value = match body.value {
                    JsonValue::Number(value) => value,
                    JsonValue::Text(text) => parse_value(&text)?,
                };
                Ok(CommandValue::new(CommandKind::from_name(&body.command), value))
            }
        }
    }

    /// Render the device frame for a command.
    pub fn render_command(&self, command: &CommandValue) -> String {
        command.render()
    }

    /// Decode a device frame.
    ///
    /// Returns `Ok(None)` for frame types other than Info.
    pub fn parse_state(&self, raw: &str) -> Result<Option<StateSnapshot>, FrameError> {
        match parse_frame(raw)? {
            Frame::Info(snapshot) => Ok(Some(snapshot)),
            Frame::Other { tag } => {
                tracing::info!(tag = %tag, "Unsupported frame type received");
                Ok(None)
            }
        }
    }

    /// Publications for changed state entries.
    pub fn render_state(&self, changed: &StateSnapshot) -> Vec<Publication> {
        if changed.is_empty() {
            return Vec::new();
        }

        match self.mode {
            PayloadMode::Topic => changed
                .iter()
                .map(|(key, value)| {
                    Publication::new(join(&self.publish_topic, key), value.to_string())
                })
                .collect(),
            PayloadMode::Json => {
                let object: serde_json::Map<String, serde_json::Value> = changed
                    .iter()
                    .map(|(key, value)| (key.clone(), (*value).into()))
                    .collect();
                vec![Publication::new(
                    self.publish_topic.clone(),
                    serde_json::Value::Object(object).to_string(),
                )]
            }
        }
    }

    /// Publications announcing a connection status.
    pub fn render_status(&self, status: LinkStatus) -> Vec<Publication> {
        match self.mode {
            PayloadMode::Topic => vec![Publication::new(
                join(&self.publish_topic, STATUS_KEY),
                status.as_str(),
            )],
            PayloadMode::Json => vec![Publication::new(
                self.publish_topic.clone(),
                serde_json::json!({ STATUS_KEY: status.as_str() }).to_string(),
            )],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::StateValue;

    fn topic_bridge() -> ProtocolBridge {
        ProtocolBridge::new(PayloadMode::Topic, "PUBmcz")
    }

    fn json_bridge() -> ProtocolBridge {
        ProtocolBridge::new(PayloadMode::Json, "PUBmcz")
    }

    fn state() -> StateSnapshot {
        let mut snapshot = StateSnapshot::new();
        snapshot.insert("Stove_State".to_string(), StateValue::Int(0));
        snapshot.insert("Ambient_Temperature".to_string(), StateValue::Float(20.5));
        snapshot
    }

    #[test]
    fn test_parse_topic_command() {
        let command = topic_bridge()
            .parse_command("SUBmcz/Power_Level", b"3")
            .unwrap();
        assert_eq!(command, CommandValue::new(CommandKind::PowerLevel, 3.0));
    }

    #[test]
    fn test_parse_topic_unknown_command() {
        let command = topic_bridge().parse_command("SUBmcz/Turbo", b"1").unwrap();
        assert_eq!(command.kind, CommandKind::Unknown);
    }

    #[test]
    fn test_parse_topic_bad_value() {
        let err = topic_bridge()
            .parse_command("SUBmcz/Power_Level", b"high")
            .unwrap_err();
        assert!(matches!(err, MessageError::Value(ref v) if v == "high"));

        assert!(topic_bridge().parse_command("SUBmcz/Power", b"NaN").is_err());
        assert!(
            topic_bridge()
                .parse_command("SUBmcz/Power", &[0xff, 0xfe])
                .is_err()
        );
    }

    #[test]
    fn test_parse_json_command_string_value() {
        let command = json_bridge()
            .parse_command("SUBmcz", br#"{"Command":"Power_Level","Value":"3"}"#)
            .unwrap();
        assert_eq!(command, CommandValue::new(CommandKind::PowerLevel, 3.0));
    }

    #[test]
    fn test_parse_json_command_number_value() {
        let command = json_bridge()
            .parse_command("SUBmcz", br#"{"Command":"Temperature_Setpoint","Value":21.5}"#)
            .unwrap();
        assert_eq!(
            command,
            CommandValue::new(CommandKind::TemperatureSetpoint, 21.5)
        );
    }

    #[test]
    fn test_parse_json_command_errors() {
        let bridge = json_bridge();
        assert!(matches!(
            bridge.parse_command("SUBmcz", b"not json"),
            Err(MessageError::Json(_))
        ));
        assert!(matches!(
            bridge.parse_command("SUBmcz", br#"{"Command":"Power"}"#),
            Err(MessageError::Json(_))
        ));
        assert!(matches!(
            bridge.parse_command("SUBmcz", br#"{"Command":"Power","Value":"on"}"#),
            Err(MessageError::Value(_))
        ));
    }

    #[test]
    fn test_parse_state() {
        let bridge = topic_bridge();
        let snapshot = bridge.parse_state("01|0|1").unwrap().unwrap();
        assert_eq!(snapshot["Fan_State"], StateValue::Int(1));

        assert_eq!(bridge.parse_state("0D|1").unwrap(), None);
        assert!(bridge.parse_state("01|x").is_err());
    }

    #[test]
    fn test_render_state_topic_mode() {
        let publications = topic_bridge().render_state(&state());
        assert_eq!(
            publications,
            vec![
                Publication::new("PUBmcz/Stove_State", "0"),
                Publication::new("PUBmcz/Ambient_Temperature", "20.5"),
            ]
        );
    }

    #[test]
    fn test_render_state_json_mode() {
        let publications = json_bridge().render_state(&state());
        assert_eq!(publications.len(), 1);
        assert_eq!(publications[0].topic, "PUBmcz");

        let body: serde_json::Value = serde_json::from_slice(&publications[0].payload).unwrap();
        assert_eq!(
            body,
            serde_json::json!({ "Stove_State": 0, "Ambient_Temperature": 20.5 })
        );
    }

    #[test]
    fn test_render_state_json_keeps_frame_order() {
        let publications = json_bridge().render_state(&state());
        assert_eq!(
            publications[0].payload,
            br#"{"Stove_State":0,"Ambient_Temperature":20.5}"#.to_vec()
        );
    }

    #[test]
    fn test_render_empty_state() {
        assert!(json_bridge().render_state(&StateSnapshot::new()).is_empty());
        assert!(topic_bridge().render_state(&StateSnapshot::new()).is_empty());
    }

    #[test]
    fn test_render_status() {
        assert_eq!(
            topic_bridge().render_status(LinkStatus::Connected),
            vec![Publication::new("PUBmcz/Status", "connected")]
        );
        assert_eq!(
            json_bridge().render_status(LinkStatus::Disconnected),
            vec![Publication::new("PUBmcz", r#"{"Status":"disconnected"}"#)]
        );
    }

    #[test]
    fn test_render_command() {
        let frame = topic_bridge().render_command(&CommandValue::new(CommandKind::PowerLevel, 3.0));
        assert_eq!(frame, "C|WriteParametri|36|3");
    }
}
