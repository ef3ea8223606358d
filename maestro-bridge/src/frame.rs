//! Device frame parsing.
//!
//! The stove pushes `|`-delimited text frames. Field 0 is the type tag;
//! Info frames (tag `01`) carry the stove state as hexadecimal fields in a
//! fixed order, decoded here into a [`StateSnapshot`].

use std::fmt;

use indexmap::IndexMap;
use thiserror::Error;

use crate::command::FRAME_SEPARATOR;

/// Type tag of Info frames.
pub const INFO_TAG: &str = "01";

/// Errors decoding a device frame.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum FrameError {
    #[error("Empty frame")]
    Empty,
    #[error("Invalid value '{value}' for {key} (field {index})")]
    InvalidField {
        index: usize,
        key: &'static str,
        value: String,
    },
}

/// A decoded state value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StateValue {
    Int(i64),
    Float(f64),
}

impl fmt::Display for StateValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StateValue::Int(v) => write!(f, "{}", v),
            StateValue::Float(v) => write!(f, "{}", v),
        }
    }
}

impl From<StateValue> for serde_json::Value {
    fn from(value: StateValue) -> Self {
        match value {
            StateValue::Int(v) => v.into(),
            StateValue::Float(v) => v.into(),
        }
    }
}

/// Ordered state key to value mapping.
pub type StateSnapshot = IndexMap<String, StateValue>;

/// A frame received from the stove.
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    /// Info frame decoded into a snapshot.
    Info(StateSnapshot),
    /// Any other frame type, identified by its tag.
    Other { tag: String },
}

/// How an Info field is decoded.
#[derive(Debug, Clone, Copy)]
enum Field {
    /// Plain hexadecimal integer.
    Int,
    /// Hexadecimal count of half units, published divided by two.
    Half,
}

/// Info frame fields, starting at field 1.
const INFO_LAYOUT: &[(&str, Field)] = &[
    ("Stove_State", Field::Int),
    ("Fan_State", Field::Int),
    ("DuctedFan1", Field::Int),
    ("DuctedFan2", Field::Int),
    ("Fume_Temperature", Field::Int),
    ("Ambient_Temperature", Field::Half),
    ("Puffer_Temperature", Field::Half),
    ("Boiler_Temperature", Field::Half),
    ("NTC3_Temperature", Field::Half),
    ("Candle_Condition", Field::Int),
    ("ACTIVE_Set", Field::Int),
    ("RPM_Fam_Fume", Field::Int),
    ("RPM_WormWheel_Set", Field::Int),
    ("RPM_WormWheel_Live", Field::Int),
    ("3WayValve", Field::Int),
    ("Pump_PWM", Field::Int),
    ("Brazier", Field::Int),
    ("Profile", Field::Int),
    ("Modbus_Address", Field::Int),
    ("Active_Mode", Field::Int),
    ("Active_Live", Field::Int),
    ("Control_Mode", Field::Int),
    ("Eco_Mode", Field::Int),
    ("Silent_Mode", Field::Int),
    ("Chronostat", Field::Int),
    ("Temperature_Setpoint", Field::Half),
    ("Boiler_Setpoint", Field::Half),
    ("Temperature_Motherboard", Field::Half),
    ("Power_Level", Field::Int),
    ("FirmwareVersion", Field::Int),
    ("DatabaseID", Field::Int),
    ("Date_Time_Hours", Field::Int),
    ("Date_Time_Minutes", Field::Int),
    ("Date_Day_Of_Month", Field::Int),
    ("Date_Month", Field::Int),
    ("Date_Year", Field::Int),
    ("Total_Operating_Hours", Field::Int),
    ("Hours_Of_Operation_In_Power1", Field::Int),
    ("Hours_Of_Operation_In_Power2", Field::Int),
    ("Hours_Of_Operation_In_Power3", Field::Int),
    ("Hours_Of_Operation_In_Power4", Field::Int),
    ("Hours_Of_Operation_In_Power5", Field::Int),
    ("Hours_To_Service", Field::Int),
    ("Minutes_To_Switch_Off", Field::Int),
    ("Number_Of_Ignitions", Field::Int),
    ("Active_Temperature", Field::Half),
    ("Celcius_Or_Fahrenheit", Field::Int),
    ("Sound_Effects", Field::Int),
    ("Sound_Effects_State", Field::Int),
    ("Sleep", Field::Int),
    ("Mode", Field::Int),
    ("WifiSondeTemperature1", Field::Int),
    ("WifiSondeTemperature2", Field::Int),
    ("WifiSondeTemperature3", Field::Int),
    ("Unknown", Field::Int),
    ("SetPuffer", Field::Int),
    ("SetBoiler", Field::Int),
    ("SetHealth", Field::Int),
    ("Return_Temperature", Field::Int),
    ("AntiFreeze", Field::Int),
];

/// Parse a raw frame.
///
/// Non-Info frames are returned as [`Frame::Other`]. Info frames shorter than
/// the known layout decode the fields present; extra trailing fields are
/// ignored. A single undecodable field rejects the whole frame.
pub fn parse_frame(raw: &str) -> Result<Frame, FrameError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(FrameError::Empty);
    }

    let mut fields = raw.split(FRAME_SEPARATOR);
    let tag = fields.next().unwrap_or_default();

    if tag != INFO_TAG {
        return Ok(Frame::Other {
            tag: tag.to_string(),
        });
    }

    let mut snapshot = StateSnapshot::with_capacity(INFO_LAYOUT.len());
    for (index, (field, &(key, decoding))) in fields.zip(INFO_LAYOUT).enumerate() {
        let value = decode_field(field, decoding).ok_or_else(|| FrameError::InvalidField {
            index: index + 1,
            key,
            value: field.to_string(),
        })?;
        snapshot.insert(key.to_string(), value);
    }

    Ok(Frame::Info(snapshot))
}

fn decode_field(field: &str, decoding: Field) -> Option<StateValue> {
    let raw = i64::from_str_radix(field, 16).ok()?;
    Some(match decoding {
        Field::Int => StateValue::Int(raw),
        Field::Half => StateValue::Float(raw as f64 / 2.0),
    })
}
