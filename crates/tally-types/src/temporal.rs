use std::fmt;

use chrono::{DateTime, FixedOffset, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// Timestamp stamped on a block's author and committer lines.
///
/// Resolution is one second, matching the git object format. The offset is
/// informational (it is part of the hashed block text) and does not affect
/// ordering beyond breaking ties.
///
/// Ordering: `seconds` → `offset_minutes`.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BlockTime {
    /// Seconds since the UNIX epoch.
    pub seconds: i64,
    /// Offset from UTC in minutes (e.g. `+0130` is 90).
    pub offset_minutes: i32,
}

impl BlockTime {
    /// Create a time with explicit values.
    pub fn new(seconds: i64, offset_minutes: i32) -> Self {
        Self {
            seconds,
            offset_minutes,
        }
    }

    /// The current wall-clock time, in UTC.
    pub fn now() -> Self {
        Self::new(Utc::now().timestamp(), 0)
    }

    /// The epoch.
    pub const fn zero() -> Self {
        Self {
            seconds: 0,
            offset_minutes: 0,
        }
    }

    /// This time advanced by the smallest representable tick (one second).
    pub fn increment(&self) -> Self {
        Self::new(self.seconds.saturating_add(1), self.offset_minutes)
    }

    /// Git-style encoding: `"<seconds> <+|-><hh><mm>"`.
    pub fn encode(&self) -> String {
        let sign = if self.offset_minutes < 0 { '-' } else { '+' };
        let abs = self.offset_minutes.unsigned_abs();
        format!("{} {}{:02}{:02}", self.seconds, sign, abs / 60, abs % 60)
    }

    /// Parse the git-style encoding produced by [`encode`](Self::encode).
    pub fn parse(s: &str) -> Result<Self, TypeError> {
        let (secs, tz) = s
            .trim()
            .split_once(' ')
            .ok_or_else(|| TypeError::InvalidTime(s.to_string()))?;
        let seconds: i64 = secs
            .parse()
            .map_err(|_| TypeError::InvalidTime(s.to_string()))?;

        let tz = tz.trim();
        if tz.len() != 5 || !tz.is_ascii() {
            return Err(TypeError::InvalidTime(s.to_string()));
        }
        let sign = match &tz[..1] {
            "+" => 1,
            "-" => -1,
            _ => return Err(TypeError::InvalidTime(s.to_string())),
        };
        let hours: i32 = tz[1..3]
            .parse()
            .map_err(|_| TypeError::InvalidTime(s.to_string()))?;
        let minutes: i32 = tz[3..5]
            .parse()
            .map_err(|_| TypeError::InvalidTime(s.to_string()))?;

        Ok(Self::new(seconds, sign * (hours * 60 + minutes)))
    }

    /// Convert to a `chrono` date-time in the recorded offset.
    pub fn to_datetime(&self) -> Option<DateTime<FixedOffset>> {
        let offset = FixedOffset::east_opt(self.offset_minutes * 60)?;
        offset.timestamp_opt(self.seconds, 0).single()
    }
}

impl fmt::Debug for BlockTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BlockTime({})", self.encode())
    }
}

impl fmt::Display for BlockTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.to_datetime() {
            Some(dt) => write!(f, "{}", dt.to_rfc3339()),
            None => write!(f, "{}", self.encode()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn increment_is_one_second() {
        let t = BlockTime::new(1_700_000_000, 60);
        let next = t.increment();
        assert_eq!(next.seconds, 1_700_000_001);
        assert_eq!(next.offset_minutes, 60);
        assert!(next > t);
    }

    #[test]
    fn encode_positive_and_negative_offsets() {
        assert_eq!(BlockTime::new(12, 90).encode(), "12 +0130");
        assert_eq!(BlockTime::new(12, -300).encode(), "12 -0500");
        assert_eq!(BlockTime::new(0, 0).encode(), "0 +0000");
    }

    #[test]
    fn parse_inverts_encode() {
        for t in [
            BlockTime::new(1_700_000_000, 0),
            BlockTime::new(42, -330),
            BlockTime::new(-5, 840),
        ] {
            assert_eq!(BlockTime::parse(&t.encode()).unwrap(), t);
        }
    }

    #[test]
    fn parse_rejects_garbage() {
        assert!(BlockTime::parse("").is_err());
        assert!(BlockTime::parse("123").is_err());
        assert!(BlockTime::parse("abc +0000").is_err());
        assert!(BlockTime::parse("123 0000").is_err());
        assert!(BlockTime::parse("123 *0100").is_err());
    }

    #[test]
    fn now_produces_reasonable_timestamp() {
        // After 2020-01-01.
        assert!(BlockTime::now().seconds > 1_577_836_800);
    }

    #[test]
    fn display_is_rfc3339() {
        let t = BlockTime::new(0, 60);
        assert_eq!(format!("{t}"), "1970-01-01T01:00:00+01:00");
    }
}
