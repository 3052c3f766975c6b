//! # Temporal Types — UTC-Only Timestamps
//!
//! Defines `Timestamp`, a UTC timestamp truncated to millisecond precision.
//!
//! Timestamps arrive from three places with three renderings: Supabase
//! returns `2026-01-15T12:00:00.123456+00:00`, the backend API returns
//! `2026-01-15T12:00:00.123Z`, and local storage holds whatever this type
//! wrote. Parsing accepts any RFC 3339 offset and converts to UTC; output
//! is always `YYYY-MM-DDTHH:MM:SS.mmmZ`.

use chrono::{DateTime, SecondsFormat, Timelike, Utc};
use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// A UTC timestamp with millisecond precision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    /// Current UTC time, truncated to milliseconds.
    pub fn now() -> Self {
        Self(truncate_to_millis(Utc::now()))
    }

    /// From a `DateTime<Utc>`, truncating sub-millisecond components.
    pub fn from_utc(dt: DateTime<Utc>) -> Self {
        Self(truncate_to_millis(dt))
    }

    /// Parse an RFC 3339 string with any offset, converting to UTC.
    pub fn parse(s: &str) -> Result<Self, CoreError> {
        let dt = DateTime::parse_from_rfc3339(s).map_err(|e| CoreError::InvalidTimestamp {
            input: s.to_string(),
            reason: e.to_string(),
        })?;
        Ok(Self(truncate_to_millis(dt.with_timezone(&Utc))))
    }

    /// Create a timestamp from Unix epoch milliseconds.
    pub fn from_epoch_millis(millis: i64) -> Result<Self, CoreError> {
        DateTime::from_timestamp_millis(millis)
            .map(Self)
            .ok_or_else(|| CoreError::InvalidTimestamp {
                input: millis.to_string(),
                reason: "out of range".to_string(),
            })
    }

    /// Access the inner `DateTime<Utc>`.
    pub fn as_datetime(&self) -> &DateTime<Utc> {
        &self.0
    }

    /// Unix epoch milliseconds.
    pub fn epoch_millis(&self) -> i64 {
        self.0.timestamp_millis()
    }

    /// Render as RFC 3339 with millisecond precision and `Z` suffix.
    pub fn to_rfc3339(&self) -> String {
        self.0.to_rfc3339_opts(SecondsFormat::Millis, true)
    }
}

impl std::fmt::Display for Timestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_rfc3339())
    }
}

impl TryFrom<String> for Timestamp {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Timestamp> for String {
    fn from(ts: Timestamp) -> Self {
        ts.to_rfc3339()
    }
}

fn truncate_to_millis(dt: DateTime<Utc>) -> DateTime<Utc> {
    let millis = dt.nanosecond() / 1_000_000;
    dt.with_nanosecond(millis * 1_000_000).unwrap_or(dt)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn now_has_no_sub_millis() {
        let ts = Timestamp::now();
        assert_eq!(ts.as_datetime().nanosecond() % 1_000_000, 0);
    }

    #[test]
    fn from_utc_truncates_to_millis() {
        let dt = Utc
            .with_ymd_and_hms(2026, 3, 2, 9, 30, 45)
            .unwrap()
            .with_nanosecond(123_456_789)
            .unwrap();
        let ts = Timestamp::from_utc(dt);
        assert_eq!(ts.to_rfc3339(), "2026-03-02T09:30:45.123Z");
    }

    #[test]
    fn parse_supabase_microsecond_offset_form() {
        let ts = Timestamp::parse("2026-03-02T09:30:45.123456+00:00").unwrap();
        assert_eq!(ts.to_rfc3339(), "2026-03-02T09:30:45.123Z");
    }

    #[test]
    fn parse_converts_non_utc_offset() {
        let ts = Timestamp::parse("2026-03-02T06:30:45-03:00").unwrap();
        assert_eq!(ts.to_rfc3339(), "2026-03-02T09:30:45.000Z");
    }

    #[test]
    fn parse_rejects_garbage() {
        assert!(Timestamp::parse("yesterday").is_err());
        assert!(Timestamp::parse("2026-03-02").is_err());
        assert!(Timestamp::parse("").is_err());
    }

    #[test]
    fn epoch_millis_roundtrip() {
        let ts = Timestamp::parse("2026-03-02T09:30:45.250Z").unwrap();
        let back = Timestamp::from_epoch_millis(ts.epoch_millis()).unwrap();
        assert_eq!(ts, back);
    }

    #[test]
    fn serde_uses_rfc3339_string() {
        let ts = Timestamp::parse("2026-03-02T09:30:45Z").unwrap();
        let json = serde_json::to_string(&ts).unwrap();
        assert_eq!(json, "\"2026-03-02T09:30:45.000Z\"");
        let back: Timestamp = serde_json::from_str(&json).unwrap();
        assert_eq!(ts, back);
    }

    #[test]
    fn ordering_follows_instant() {
        let a = Timestamp::parse("2026-03-02T09:30:45Z").unwrap();
        let b = Timestamp::parse("2026-03-02T09:30:45.001Z").unwrap();
        assert!(a < b);
    }
}
