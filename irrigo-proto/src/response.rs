//! Responses notified by the controller

use serde::Deserialize;

use crate::{DaysMask, Program, StartTime, Verb};

/// Value the controller reports for `time` when its RTC is not running
pub const RTC_UNAVAILABLE: &str = "unavailable";

/// Why an inbound notification could not be decoded
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("response is not UTF-8: {0}")]
    Utf8(#[from] std::str::Utf8Error),
    #[error("response is not a JSON object: {0}")]
    Json(#[from] serde_json::Error),
    #[error("response has no status field")]
    MissingStatus,
    #[error("unknown response status {0:?}")]
    UnknownStatus(String),
    #[error(transparent)]
    StartTime(#[from] crate::InvalidStartTime),
}

/// The wire shape: every field the controller may send, all optional.
/// Unknown fields are ignored.
#[derive(Debug, Default, Deserialize)]
struct WireResponse {
    status: Option<String>,
    cmd: Option<String>,
    message: Option<String>,
    active_zone: Option<u8>,
    duration: Option<u32>,
    manual: Option<bool>,
    time: Option<String>,
    enabled: Option<bool>,
    start: Option<String>,
    days: Option<String>,
}

/// Controller state as reported by `get_status`
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SystemStatus {
    /// 0 when idle, otherwise the running zone
    pub active_zone: u8,
    pub duration_minutes: Option<u32>,
    pub manual: bool,
    /// RTC reading, `YYYY-MM-DD HH:MM:SS`; `None` when the controller has no
    /// valid clock
    pub rtc_time: Option<String>,
}

impl SystemStatus {
    pub fn is_idle(&self) -> bool {
        self.active_zone == 0
    }
}

/// Verb-specific body of a successful response
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    Status(SystemStatus),
    Program(Program),
    /// Verbs that only acknowledge, and responses without a known verb
    Ack,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    Ok {
        verb: Option<Verb>,
        payload: Payload,
    },
    Error {
        verb: Option<Verb>,
        message: Option<String>,
    },
}

impl Response {
    /// The echoed verb. `None` when `cmd` was absent or not a verb this
    /// client knows.
    pub fn verb(&self) -> Option<Verb> {
        match self {
            Response::Ok { verb, .. } | Response::Error { verb, .. } => *verb,
        }
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, Response::Ok { .. })
    }

    /// Decode one notification. Each notification is one complete message.
    pub fn decode(bytes: &[u8]) -> Result<Self, DecodeError> {
        let text = std::str::from_utf8(bytes)?;
        let mut wire: WireResponse = serde_json::from_str(text)?;
        let verb = wire.cmd.as_deref().and_then(|c| c.parse::<Verb>().ok());
        let status = wire.status.take();

        match status.as_deref() {
            Some("ok") => {
                let payload = decode_payload(verb, wire)?;
                Ok(Response::Ok { verb, payload })
            }
            Some("error") => Ok(Response::Error {
                verb,
                message: wire.message,
            }),
            Some(other) => Err(DecodeError::UnknownStatus(other.to_string())),
            None => Err(DecodeError::MissingStatus),
        }
    }
}

fn decode_payload(verb: Option<Verb>, wire: WireResponse) -> Result<Payload, DecodeError> {
    let Some(verb) = verb else {
        return Ok(Payload::Ack);
    };

    Ok(match verb {
        Verb::GetStatus => Payload::Status(SystemStatus {
            active_zone: wire.active_zone.unwrap_or(0),
            duration_minutes: wire.duration,
            manual: wire.manual.unwrap_or(false),
            rtc_time: wire.time.filter(|t| t != RTC_UNAVAILABLE && !t.is_empty()),
        }),
        Verb::GetProgram => Payload::Program(Program {
            enabled: wire.enabled.unwrap_or(false),
            start: match wire.start.as_deref() {
                Some(s) => s.parse()?,
                None => StartTime::Unset,
            },
            days: wire
                .days
                .as_deref()
                .map(DaysMask::parse_lenient)
                .unwrap_or_default(),
            duration_minutes: wire.duration.unwrap_or(0),
        }),
        Verb::StartZone | Verb::Stop | Verb::SetProgram | Verb::SetTime => Payload::Ack,
    })
}
