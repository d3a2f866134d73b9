//! Commands sent from the client to the controller

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::{DaysMask, Program, StartTime};

/// The fixed command kinds; the `cmd` value on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verb {
    GetStatus,
    StartZone,
    Stop,
    GetProgram,
    SetProgram,
    SetTime,
}

impl Verb {
    pub const ALL: [Verb; 6] = [
        Verb::GetStatus,
        Verb::StartZone,
        Verb::Stop,
        Verb::GetProgram,
        Verb::SetProgram,
        Verb::SetTime,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Verb::GetStatus => "get_status",
            Verb::StartZone => "start_zone",
            Verb::Stop => "stop",
            Verb::GetProgram => "get_program",
            Verb::SetProgram => "set_program",
            Verb::SetTime => "set_time",
        }
    }
}

impl fmt::Display for Verb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown verb {0:?}")]
pub struct UnknownVerb(pub String);

impl FromStr for Verb {
    type Err = UnknownVerb;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Verb::ALL
            .into_iter()
            .find(|v| v.as_str() == s)
            .ok_or_else(|| UnknownVerb(s.to_string()))
    }
}

/// A request to the controller.
///
/// Serializes to one flat JSON object: the verb under `cmd`, parameters as
/// sibling fields. Verbs without parameters carry only `cmd`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "cmd", rename_all = "snake_case")]
pub enum Command {
    GetStatus,
    StartZone {
        zone: u8,
        #[serde(rename = "duration")]
        duration_minutes: u32,
    },
    Stop,
    GetProgram {
        zone: u8,
        #[serde(rename = "prog")]
        program: u8,
    },
    SetProgram {
        zone: u8,
        #[serde(rename = "prog")]
        program: u8,
        #[serde(rename = "start")]
        start_time: StartTime,
        #[serde(rename = "days")]
        days_mask: DaysMask,
        #[serde(rename = "duration")]
        duration_minutes: u32,
        enabled: bool,
    },
    SetTime {
        /// `YYYY-MM-DDTHH:MM:SS`, local time, no zone suffix
        #[serde(rename = "time")]
        timestamp: String,
    },
}

impl Command {
    pub fn verb(&self) -> Verb {
        match self {
            Command::GetStatus => Verb::GetStatus,
            Command::StartZone { .. } => Verb::StartZone,
            Command::Stop => Verb::Stop,
            Command::GetProgram { .. } => Verb::GetProgram,
            Command::SetProgram { .. } => Verb::SetProgram,
            Command::SetTime { .. } => Verb::SetTime,
        }
    }

    pub fn set_program(zone: u8, program: u8, config: &Program) -> Self {
        Command::SetProgram {
            zone,
            program,
            start_time: config.start,
            days_mask: config.days,
            duration_minutes: config.duration_minutes,
            enabled: config.enabled,
        }
    }

    /// Wire bytes: UTF-8 JSON, one object
    pub fn encode(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }
}

#[cfg(test)]
mod tests {
    use super::{Command, Verb};
    use crate::{DaysMask, Program, StartTime};

    fn encoded(cmd: &Command) -> String {
        String::from_utf8(cmd.encode().unwrap()).unwrap()
    }

    #[test]
    fn start_zone_is_exact() {
        let cmd = Command::StartZone { zone: 2, duration_minutes: 15 };
        assert_eq!(encoded(&cmd), r#"{"cmd":"start_zone","zone":2,"duration":15}"#);
    }

    #[test]
    fn parameterless_verbs() {
        assert_eq!(encoded(&Command::GetStatus), r#"{"cmd":"get_status"}"#);
        assert_eq!(encoded(&Command::Stop), r#"{"cmd":"stop"}"#);
    }

    #[test]
    fn get_program() {
        let cmd = Command::GetProgram { zone: 3, program: 0 };
        assert_eq!(encoded(&cmd), r#"{"cmd":"get_program","zone":3,"prog":0}"#);
    }

    #[test]
    fn set_program() {
        let program = Program {
            enabled: true,
            start: StartTime::at(6, 0).unwrap(),
            days: DaysMask::parse_lenient("SM-W-F-"),
            duration_minutes: 15,
        };
        let cmd = Command::set_program(1, 2, &program);
        assert_eq!(
            encoded(&cmd),
            r#"{"cmd":"set_program","zone":1,"prog":2,"start":"06:00","days":"SM-W-F-","duration":15,"enabled":true}"#
        );
    }

    #[test]
    fn set_time() {
        let cmd = Command::SetTime { timestamp: "2025-12-27T16:30:00".to_string() };
        assert_eq!(encoded(&cmd), r#"{"cmd":"set_time","time":"2025-12-27T16:30:00"}"#);
    }

    #[test]
    fn verb_names_match_cmd_field() {
        let commands = [
            Command::GetStatus,
            Command::StartZone { zone: 1, duration_minutes: 1 },
            Command::Stop,
            Command::GetProgram { zone: 1, program: 1 },
            Command::set_program(1, 1, &Program::default()),
            Command::SetTime { timestamp: String::new() },
        ];
        for cmd in commands {
            let value: serde_json::Value = serde_json::from_slice(&cmd.encode().unwrap()).unwrap();
            assert_eq!(value["cmd"], cmd.verb().as_str());
            assert_eq!(cmd.verb().as_str().parse::<Verb>().unwrap(), cmd.verb());
        }
    }

    #[test]
    fn unknown_verb() {
        assert!("water_everything".parse::<Verb>().is_err());
    }

    #[test]
    fn controller_side_decoding() {
        let cmd: Command =
            serde_json::from_str(r#"{"cmd":"get_program","zone":4,"prog":1}"#).unwrap();
        assert_eq!(cmd, Command::GetProgram { zone: 4, program: 1 });
    }
}
