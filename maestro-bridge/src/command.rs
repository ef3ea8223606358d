//! Maestro command table and device frame rendering.
//!
//! Every controllable stove parameter is a [`CommandKind`] with a bus name,
//! a parameter code and a [`ValueEncoding`]. Rendering a [`CommandValue`]
//! produces the text frame written to the stove:
//!
//! ```text
//! C|RecuperoInfo                     (GetInfo)
//! C|WriteParametri|<code>|<value>    (everything else)
//! ```

use std::fmt;

/// Field separator of device frames.
pub const FRAME_SEPARATOR: char = '|';

/// Frame requesting a full Info snapshot.
pub const GET_INFO_FRAME: &str = "C|RecuperoInfo";

/// How a command value is written on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueEncoding {
    /// Rounded integer.
    Int,
    /// Degrees in half-degree steps, sent doubled.
    Temperature,
    /// `1` for on, `0` for off.
    OnOff,
    /// `1` for on, `40` for off (stove power).
    OnOff40,
    /// No device frame (sentinels).
    None,
}

impl ValueEncoding {
    /// Encode `value` as the integer sent to the stove.
    pub fn encode(&self, value: f64) -> i64 {
        match self {
            ValueEncoding::Int => value.round() as i64,
            ValueEncoding::Temperature => (value * 2.0).round() as i64,
            ValueEncoding::OnOff => i64::from(value != 0.0),
            ValueEncoding::OnOff40 => {
                if value != 0.0 {
                    1
                } else {
                    40
                }
            }
            ValueEncoding::None => 0,
        }
    }

    /// Label used in logs and configuration dumps.
    pub fn as_str(&self) -> &'static str {
        match self {
            ValueEncoding::Int => "int",
            ValueEncoding::Temperature => "temperature",
            ValueEncoding::OnOff => "onoff",
            ValueEncoding::OnOff40 => "onoff40",
            ValueEncoding::None => "none",
        }
    }
}

/// Controllable stove parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandKind {
    /// Invalidate the state cache; never sent to the stove.
    Refresh,
    /// Request a state snapshot.
    GetInfo,
    Power,
    PowerLevel,
    TemperatureSetpoint,
    BoilerSetpoint,
    Chronostat,
    ChronostatT1,
    ChronostatT2,
    ChronostatT3,
    FrontFan,
    DuctedFan1,
    DuctedFan2,
    EcoMode,
    SilentMode,
    ActiveMode,
    SoundEffects,
    ControlMode,
    /// Name not in the table.
    Unknown,
}

impl CommandKind {
    /// Every named kind, in table order.
    pub const ALL: [CommandKind; 18] = [
        CommandKind::Refresh,
        CommandKind::GetInfo,
        CommandKind::Power,
        CommandKind::PowerLevel,
        CommandKind::TemperatureSetpoint,
        CommandKind::BoilerSetpoint,
        CommandKind::Chronostat,
        CommandKind::ChronostatT1,
        CommandKind::ChronostatT2,
        CommandKind::ChronostatT3,
        CommandKind::FrontFan,
        CommandKind::DuctedFan1,
        CommandKind::DuctedFan2,
        CommandKind::EcoMode,
        CommandKind::SilentMode,
        CommandKind::ActiveMode,
        CommandKind::SoundEffects,
        CommandKind::ControlMode,
    ];

    /// Look up a kind by its bus name. Unrecognized names give [`CommandKind::Unknown`].
    pub fn from_name(name: &str) -> Self {
        Self::ALL
            .into_iter()
            .find(|kind| kind.name() == name)
            .unwrap_or(CommandKind::Unknown)
    }

    /// Canonical name used on the bus.
    pub fn name(&self) -> &'static str {
        match self {
            CommandKind::Refresh => "Refresh",
            CommandKind::GetInfo => "GetInfo",
            CommandKind::Power => "Power",
            CommandKind::PowerLevel => "Power_Level",
            CommandKind::TemperatureSetpoint => "Temperature_Setpoint",
            CommandKind::BoilerSetpoint => "Boiler_Setpoint",
            CommandKind::Chronostat => "Chronostat",
            CommandKind::ChronostatT1 => "Chronostat_T1",
            CommandKind::ChronostatT2 => "Chronostat_T2",
            CommandKind::ChronostatT3 => "Chronostat_T3",
            CommandKind::FrontFan => "Fan_State",
            CommandKind::DuctedFan1 => "DuctedFan1",
            CommandKind::DuctedFan2 => "DuctedFan2",
            CommandKind::EcoMode => "Eco_Mode",
            CommandKind::SilentMode => "Silent_Mode",
            CommandKind::ActiveMode => "Active_Mode",
            CommandKind::SoundEffects => "Sound_Effects",
            CommandKind::ControlMode => "Control_Mode",
            CommandKind::Unknown => "Unknown",
        }
    }

    /// Parameter code in `WriteParametri` frames (0 for sentinels).
    pub fn code(&self) -> u16 {
        match self {
            CommandKind::Power => 34,
            CommandKind::ActiveMode => 35,
            CommandKind::PowerLevel => 36,
            CommandKind::FrontFan => 37,
            CommandKind::DuctedFan1 => 38,
            CommandKind::DuctedFan2 => 39,
            CommandKind::ControlMode => 40,
            CommandKind::EcoMode => 41,
            CommandKind::TemperatureSetpoint => 42,
            CommandKind::SilentMode => 45,
            CommandKind::SoundEffects => 50,
            CommandKind::BoilerSetpoint => 51,
            CommandKind::ChronostatT1 => 1108,
            CommandKind::ChronostatT2 => 1109,
            CommandKind::ChronostatT3 => 1110,
            CommandKind::Chronostat => 1111,
            CommandKind::Refresh | CommandKind::GetInfo | CommandKind::Unknown => 0,
        }
    }

    /// Wire encoding of values for this kind.
    pub fn encoding(&self) -> ValueEncoding {
        match self {
            CommandKind::Power => ValueEncoding::OnOff40,
            CommandKind::PowerLevel
            | CommandKind::FrontFan
            | CommandKind::DuctedFan1
            | CommandKind::DuctedFan2 => ValueEncoding::Int,
            CommandKind::TemperatureSetpoint
            | CommandKind::BoilerSetpoint
            | CommandKind::ChronostatT1
            | CommandKind::ChronostatT2
            | CommandKind::ChronostatT3 => ValueEncoding::Temperature,
            CommandKind::Chronostat
            | CommandKind::EcoMode
            | CommandKind::SilentMode
            | CommandKind::ActiveMode
            | CommandKind::SoundEffects
            | CommandKind::ControlMode => ValueEncoding::OnOff,
            CommandKind::Refresh | CommandKind::GetInfo | CommandKind::Unknown => {
                ValueEncoding::None
            }
        }
    }
}

impl fmt::Display for CommandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A command and the value to apply.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CommandValue {
    pub kind: CommandKind,
    pub value: f64,
}

impl CommandValue {
    pub fn new(kind: CommandKind, value: f64) -> Self {
        Self { kind, value }
    }

    /// The periodic state request.
    pub fn get_info() -> Self {
        Self::new(CommandKind::GetInfo, 0.0)
    }

    /// Render the device frame for this command.
    pub fn render(&self) -> String {
        match self.kind {
            CommandKind::GetInfo => GET_INFO_FRAME.to_string(),
            kind => format!(
                "C{sep}WriteParametri{sep}{}{sep}{}",
                kind.code(),
                kind.encoding().encode(self.value),
                sep = FRAME_SEPARATOR
            ),
        }
    }
}
