//! Timestamp formatting for encoded documents
//!
//! Search backends usually want ISO 8601 with milliseconds in `@timestamp`,
//! but some index templates map the field as `epoch_millis`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::{self, Write};

/// Timestamp format options for encoded documents
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimestampFormat {
    /// ISO 8601 with milliseconds: `2025-01-08T10:30:45.123Z`
    #[default]
    Iso8601,

    /// ISO 8601 with microseconds: `2025-01-08T10:30:45.123456Z`
    Iso8601Micros,

    /// RFC 3339 format: `2025-01-08T10:30:45.123456+00:00`
    Rfc3339,

    /// Unix timestamp in seconds: `1736332245`
    Unix,

    /// Unix timestamp in milliseconds: `1736332245123`
    UnixMillis,

    /// Unix timestamp in microseconds: `1736332245123456`
    UnixMicros,

    /// Custom strftime format
    Custom(String),
}

impl TimestampFormat {
    /// Render `datetime`, failing if a custom strftime string is invalid.
    pub fn try_format(&self, datetime: &DateTime<Utc>) -> Result<String, fmt::Error> {
        let mut out = String::with_capacity(32);
        match self {
            TimestampFormat::Iso8601 => write!(out, "{}", datetime.format(ISO8601_MILLIS))?,
            TimestampFormat::Iso8601Micros => {
                write!(out, "{}", datetime.format("%Y-%m-%dT%H:%M:%S%.6fZ"))?
            }
            TimestampFormat::Rfc3339 => out.push_str(&datetime.to_rfc3339()),
            TimestampFormat::Unix => write!(out, "{}", datetime.timestamp())?,
            TimestampFormat::UnixMillis => write!(out, "{}", datetime.timestamp_millis())?,
            TimestampFormat::UnixMicros => write!(out, "{}", datetime.timestamp_micros())?,
            TimestampFormat::Custom(format_str) => write!(out, "{}", datetime.format(format_str))?,
        }
        Ok(out)
    }

    /// Render `datetime`, using ISO 8601 if a custom format is invalid.
    #[must_use]
    pub fn format(&self, datetime: &DateTime<Utc>) -> String {
        self.try_format(datetime)
            .unwrap_or_else(|_| iso8601_millis(datetime))
    }

    /// Check if this is a Unix-based numeric format
    #[must_use]
    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            TimestampFormat::Unix | TimestampFormat::UnixMillis | TimestampFormat::UnixMicros
        )
    }

    /// JSON representation: numbers for the Unix formats, strings otherwise
    pub fn try_json_value(&self, datetime: &DateTime<Utc>) -> Result<serde_json::Value, fmt::Error> {
        Ok(match self {
            TimestampFormat::Unix => datetime.timestamp().into(),
            TimestampFormat::UnixMillis => datetime.timestamp_millis().into(),
            TimestampFormat::UnixMicros => datetime.timestamp_micros().into(),
            _ => serde_json::Value::String(self.try_format(datetime)?),
        })
    }

    /// Like [`try_json_value`](Self::try_json_value), falling back to ISO 8601.
    ///
    /// The flag is `true` when the fallback was used.
    #[must_use]
    pub fn to_json_value(&self, datetime: &DateTime<Utc>) -> (serde_json::Value, bool) {
        match self.try_json_value(datetime) {
            Ok(value) => (value, false),
            Err(_) => (serde_json::Value::String(iso8601_millis(datetime)), true),
        }
    }
}

const ISO8601_MILLIS: &str = "%Y-%m-%dT%H:%M:%S%.3fZ";

fn iso8601_millis(datetime: &DateTime<Utc>) -> String {
    datetime.format(ISO8601_MILLIS).to_string()
}
