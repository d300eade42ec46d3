use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Deserializer, Serialize, de};
use std::fmt;

/// Server timestamp, carried as UTC and rendered in whatever zone the caller
/// displays in.
///
/// The backend emits either RFC 3339 strings or zone-less local date-times
/// (`2025-03-08T14:30:00`); the latter are taken as UTC.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct Timestamp(pub DateTime<Utc>);

impl Timestamp {
    /// Parses either accepted wire form.
    ///
    /// # Errors
    /// Returns the chrono parse error when neither form matches.
    pub fn parse(value: &str) -> Result<Self, chrono::ParseError> {
        match DateTime::parse_from_rfc3339(value) {
            Ok(parsed) => Ok(Self(parsed.with_timezone(&Utc))),
            Err(_) => NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f")
                .map(|naive| Self(naive.and_utc())),
        }
    }

    /// Calendar date of this instant as seen in `tz`.
    #[must_use]
    pub fn date_in<Tz: TimeZone>(&self, tz: &Tz) -> NaiveDate {
        self.0.with_timezone(tz).date_naive()
    }
}

impl<'de> Deserialize<'de> for Timestamp {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(de::Error::custom)
    }
}

impl From<DateTime<Utc>> for Timestamp {
    fn from(value: DateTime<Utc>) -> Self {
        Self(value)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format("%Y-%m-%d %H:%M:%S"))
    }
}
