//! Drift between the local clock and the controller's RTC

use std::fmt;

use chrono::{Local, NaiveDateTime};

/// Format of the RTC reading in status responses
pub const RTC_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Format `set_time` sends: local time, no zone suffix
pub const SET_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// Drift below this counts as in sync
pub const IN_SYNC_THRESHOLD_SECS: f64 = 3.0;

/// Parse `YYYY-MM-DD HH:MM:SS`. Anything else, including a valid date in
/// another layout, is `None`.
pub fn parse_rtc(s: &str) -> Option<NaiveDateTime> {
    let bytes = s.as_bytes();
    if bytes.len() != 19 {
        return None;
    }
    let shape = bytes.iter().enumerate().all(|(i, b)| match i {
        4 | 7 => *b == b'-',
        10 => *b == b' ',
        13 | 16 => *b == b':',
        _ => b.is_ascii_digit(),
    });
    if !shape {
        return None;
    }
    NaiveDateTime::parse_from_str(s, RTC_FORMAT).ok()
}

pub fn format_set_time(t: NaiveDateTime) -> String {
    t.format(SET_TIME_FORMAT).to_string()
}

/// Local wall-clock time as `set_time` expects it
pub fn local_timestamp() -> String {
    format_set_time(Local::now().naive_local())
}

/// An RTC reading and the local time it arrived
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RtcSample {
    pub rtc: NaiveDateTime,
    pub received_at: NaiveDateTime,
}

impl RtcSample {
    /// `None` when `raw` is not a valid reading; that is a normal state
    /// (controller without a set clock), not an error
    pub fn new(raw: &str, received_at: NaiveDateTime) -> Option<Self> {
        parse_rtc(raw).map(|rtc| Self { rtc, received_at })
    }

    pub fn received_now(raw: &str) -> Option<Self> {
        Self::new(raw, Local::now().naive_local())
    }

    pub fn drift_at(&self, local: NaiveDateTime) -> Drift {
        Drift::between(self.rtc, local)
    }

    /// Drift as of when the reading arrived
    pub fn drift(&self) -> Drift {
        self.drift_at(self.received_at)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Drift {
    /// Absolute difference, seconds
    pub seconds: f64,
    pub in_sync: bool,
}

impl Drift {
    pub fn between(rtc: NaiveDateTime, local: NaiveDateTime) -> Self {
        let seconds = ((local - rtc).num_milliseconds() as f64 / 1000.0).abs();
        Self {
            seconds,
            in_sync: seconds < IN_SYNC_THRESHOLD_SECS,
        }
    }
}

impl fmt::Display for Drift {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.in_sync {
            f.write_str("synced")
        } else {
            write!(f, "±{}s", self.seconds.round())
        }
    }
}

/// Drift of the reading `rtc` against `local`; `None` when there is no
/// usable reading
pub fn measure(rtc: &str, local: NaiveDateTime) -> Option<Drift> {
    parse_rtc(rtc).map(|rtc| Drift::between(rtc, local))
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDateTime;

    use super::{Drift, RtcSample, format_set_time, local_timestamp, measure, parse_rtc};

    fn local(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S").unwrap()
    }

    #[test]
    fn small_drift_is_in_sync() {
        let drift = measure("2025-12-27 16:30:00", local("2025-12-27T16:30:02")).unwrap();
        assert_eq!(drift.seconds, 2.0);
        assert!(drift.in_sync);
    }

    #[test]
    fn large_drift_is_not() {
        let drift = measure("2025-12-27 16:30:00", local("2025-12-27T16:30:10")).unwrap();
        assert_eq!(drift.seconds, 10.0);
        assert!(!drift.in_sync);
        assert_eq!(drift.to_string(), "±10s");
    }

    #[test]
    fn drift_is_absolute() {
        let drift = measure("2025-12-27 16:30:10", local("2025-12-27T16:30:00")).unwrap();
        assert_eq!(drift.seconds, 10.0);
    }

    #[test]
    fn threshold_is_exclusive() {
        let drift = measure("2025-12-27 16:30:00", local("2025-12-27T16:30:03")).unwrap();
        assert!(!drift.in_sync);
    }

    #[test]
    fn unparseable_reading_is_no_sample() {
        for raw in [
            "unavailable",
            "",
            "2025-12-27T16:30:00",
            "2025-12-27 16:30",
            "2025-13-27 16:30:00",
            "27/12/2025 16:30:00",
            "2025-12-27 16:30:00Z",
        ] {
            assert!(parse_rtc(raw).is_none(), "{raw:?} parsed");
            assert!(RtcSample::new(raw, local("2025-12-27T16:30:00")).is_none());
        }
    }

    #[test]
    fn sample_drift_at_receipt() {
        let sample = RtcSample::new("2025-12-27 16:30:00", local("2025-12-27T16:30:01")).unwrap();
        assert_eq!(sample.drift(), Drift { seconds: 1.0, in_sync: true });
        assert_eq!(sample.drift_at(local("2025-12-27T16:31:00")).seconds, 60.0);
    }

    #[test]
    fn set_time_format() {
        assert_eq!(format_set_time(local("2025-01-02T03:04:05")), "2025-01-02T03:04:05");

        let now = local_timestamp();
        assert_eq!(now.len(), 19);
        assert!(NaiveDateTime::parse_from_str(&now, "%Y-%m-%dT%H:%M:%S").is_ok());
        for (i, b) in now.bytes().enumerate() {
            match i {
                4 | 7 => assert_eq!(b, b'-'),
                10 => assert_eq!(b, b'T'),
                13 | 16 => assert_eq!(b, b':'),
                _ => assert!(b.is_ascii_digit(), "{now}"),
            }
        }
    }
}
