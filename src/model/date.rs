//! The date of a transaction.
//!
//! A `TxnDate` keeps the exact text it was parsed from so that a document can be loaded and
//! written back without changing the date strings of records nobody touched.

use anyhow::bail;
use chrono::{
    DateTime, Datelike, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, SecondsFormat, Utc,
};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::cmp::Ordering;
use std::fmt::{Display, Formatter};
use std::hash::{Hash, Hasher};
use std::str::FromStr;

/// The instant a transaction happened, along with its stored textual form.
#[derive(Debug, Clone)]
pub struct TxnDate {
    text: String,
    at: DateTime<FixedOffset>,
}

impl TxnDate {
    /// Creates a date from an instant, formatted the way new records are stored, e.g.
    /// `2024-01-10T08:30:00.000Z`.
    pub fn from_utc(at: DateTime<Utc>) -> Self {
        Self {
            text: at.to_rfc3339_opts(SecondsFormat::Millis, true),
            at: at.fixed_offset(),
        }
    }

    pub fn now() -> Self {
        Self::from_utc(Utc::now())
    }

    /// The text exactly as stored.
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn instant(&self) -> DateTime<FixedOffset> {
        self.at
    }

    /// The calendar date in the offset the date was stored with.
    pub fn day(&self) -> NaiveDate {
        self.at.date_naive()
    }

    pub fn year(&self) -> i32 {
        self.day().year()
    }

    pub fn month(&self) -> u32 {
        self.day().month()
    }

    pub fn day_of_month(&self) -> u32 {
        self.day().day()
    }
}

impl FromStr for TxnDate {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let text = s.trim();
        let at = if let Ok(at) = DateTime::parse_from_rfc3339(text) {
            at
        } else if let Ok(naive) = NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f") {
            naive.and_utc().fixed_offset()
        } else if let Ok(naive) = NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S%.f") {
            naive.and_utc().fixed_offset()
        } else if let Ok(day) = NaiveDate::parse_from_str(text, "%Y-%m-%d") {
            day.and_time(NaiveTime::MIN).and_utc().fixed_offset()
        } else {
            bail!("Unable to parse '{text}' as a date, expected e.g. 2024-01-10 or 2024-01-10T08:30:00Z")
        };
        Ok(Self {
            text: text.to_string(),
            at,
        })
    }
}

impl Display for TxnDate {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.text)
    }
}

impl PartialEq for TxnDate {
    fn eq(&self, other: &Self) -> bool {
        self.text == other.text
    }
}

impl Eq for TxnDate {}

impl Hash for TxnDate {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.text.hash(state)
    }
}

impl PartialOrd for TxnDate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for TxnDate {
    /// Chronological, then by text so that the ordering agrees with `Eq`.
    fn cmp(&self, other: &Self) -> Ordering {
        self.at
            .cmp(&other.at)
            .then_with(|| self.text.cmp(&other.text))
    }
}

impl Serialize for TxnDate {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.text)
    }
}

impl<'de> Deserialize<'de> for TxnDate {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        TxnDate::from_str(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_parse_rfc3339_keeps_text() {
        let d = TxnDate::from_str("2024-01-20T23:30:00.000Z").unwrap();
        assert_eq!(d.text(), "2024-01-20T23:30:00.000Z");
        assert_eq!(d.day(), NaiveDate::from_ymd_opt(2024, 1, 20).unwrap());
    }

    #[test]
    fn test_parse_date_only() {
        let d = TxnDate::from_str("2024-01-10").unwrap();
        assert_eq!(d.year(), 2024);
        assert_eq!(d.month(), 1);
        assert_eq!(d.day_of_month(), 10);
        assert_eq!(d.to_string(), "2024-01-10");
    }

    #[test]
    fn test_parse_uses_stored_offset_for_calendar_day() {
        let d = TxnDate::from_str("2024-01-15T23:30:00-05:00").unwrap();
        assert_eq!(d.day_of_month(), 15);
    }

    #[test]
    fn test_parse_naive_datetime() {
        let d = TxnDate::from_str("2024-03-01T10:00:00").unwrap();
        assert_eq!(d.month(), 3);
        let d = TxnDate::from_str("2024-03-01 10:00:00").unwrap();
        assert_eq!(d.month(), 3);
    }

    #[test]
    fn test_parse_invalid() {
        assert!(TxnDate::from_str("yesterday").is_err());
        assert!(TxnDate::from_str("2024-13-01").is_err());
    }

    #[test]
    fn test_from_utc_format() {
        let at = Utc.with_ymd_and_hms(2024, 1, 10, 8, 30, 0).unwrap();
        let d = TxnDate::from_utc(at);
        assert_eq!(d.text(), "2024-01-10T08:30:00.000Z");
    }

    #[test]
    fn test_ordering_is_chronological() {
        let a = TxnDate::from_str("2024-01-10").unwrap();
        let b = TxnDate::from_str("2024-01-09T23:00:00-05:00").unwrap();
        assert!(b > a);
    }

    #[test]
    fn test_serde_round_trip_text() {
        let json = "\"2024-01-10\"";
        let d: TxnDate = serde_json::from_str(json).unwrap();
        assert_eq!(serde_json::to_string(&d).unwrap(), json);
    }
}
