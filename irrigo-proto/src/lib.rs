//! Irrigo wire protocol - commands, responses and their JSON encoding
//!
//! Every message is one UTF-8 JSON object carried in a single BLE write or
//! notification; the link does the framing. Commands carry the verb under
//! `cmd` with parameters as sibling fields:
//!
//! ```text
//! {"cmd":"start_zone","zone":2,"duration":15}
//! ```
//!
//! Responses carry `status` (`ok` / `error`), usually echo `cmd`, and add
//! verb-specific fields.
//!
//! The protocol has no request identifier. A response can only be matched
//! to a command by its verb, so a client must keep at most one command in
//! flight.

pub mod ble;
mod command;
mod days;
mod program;
mod response;

pub use command::{Command, UnknownVerb, Verb};
pub use days::{DAY_LETTERS, DaysMask};
pub use program::{InvalidStartTime, PROGRAMS_PER_ZONE, Program, StartTime, ZONE_COUNT};
pub use response::{DecodeError, Payload, RTC_UNAVAILABLE, Response, SystemStatus};
