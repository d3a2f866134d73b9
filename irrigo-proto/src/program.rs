//! Watering program slots

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::DaysMask;

/// Zones wired on the controller
pub const ZONE_COUNT: u8 = 4;

/// Program slots each zone holds
pub const PROGRAMS_PER_ZONE: u8 = 3;

/// Start time of a program: `HH:MM`, or `none` on the wire when the slot has
/// no start time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum StartTime {
    #[default]
    Unset,
    At { hour: u8, minute: u8 },
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid start time {0:?}, expected HH:MM or \"none\"")]
pub struct InvalidStartTime(pub String);

impl StartTime {
    pub fn at(hour: u8, minute: u8) -> Result<Self, InvalidStartTime> {
        if hour > 23 || minute > 59 {
            return Err(InvalidStartTime(format!("{hour}:{minute}")));
        }
        Ok(Self::At { hour, minute })
    }

    pub fn is_set(&self) -> bool {
        matches!(self, Self::At { .. })
    }
}

impl fmt::Display for StartTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unset => f.write_str("none"),
            Self::At { hour, minute } => write!(f, "{hour:02}:{minute:02}"),
        }
    }
}

impl FromStr for StartTime {
    type Err = InvalidStartTime;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == "none" {
            return Ok(Self::Unset);
        }
        let invalid = || InvalidStartTime(s.to_string());
        let (h, m) = s.split_once(':').ok_or_else(invalid)?;
        if h.is_empty() || h.len() > 2 || m.len() != 2 {
            return Err(invalid());
        }
        let hour = h.parse::<u8>().map_err(|_| invalid())?;
        let minute = m.parse::<u8>().map_err(|_| invalid())?;
        Self::at(hour, minute).map_err(|_| invalid())
    }
}

impl Serialize for StartTime {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for StartTime {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// One program slot of a zone
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Program {
    pub enabled: bool,
    pub start: StartTime,
    pub days: DaysMask,
    pub duration_minutes: u32,
}

#[cfg(test)]
mod tests {
    use super::StartTime;

    #[test]
    fn start_time_text() {
        assert_eq!(StartTime::at(6, 5).unwrap().to_string(), "06:05");
        assert_eq!(StartTime::Unset.to_string(), "none");
        assert_eq!("06:00".parse::<StartTime>().unwrap(), StartTime::At { hour: 6, minute: 0 });
        assert_eq!("6:00".parse::<StartTime>().unwrap(), StartTime::At { hour: 6, minute: 0 });
        assert_eq!("none".parse::<StartTime>().unwrap(), StartTime::Unset);
    }

    #[test]
    fn start_time_rejects_garbage() {
        for bad in ["", "24:00", "12:60", "12", "12:0", "ab:cd", "123:00", "12:00:00"] {
            assert!(bad.parse::<StartTime>().is_err(), "{bad:?} accepted");
        }
    }
}
