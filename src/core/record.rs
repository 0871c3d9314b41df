//! Normalized record produced by the field normalizer

use super::fields::{FieldValue, Fields};
use super::log_entry::TracingContext;
use super::log_level::LogLevel;
use chrono::{DateTime, Utc};

/// Reserved key always present on a normalized record
pub const SEVERITY_KEY: &str = "severity";

/// Reserved key some callers use for the level; renamed to [`SEVERITY_KEY`]
pub const INTERNAL_LEVEL_KEY: &str = "log.level";

/// Flat mapping of field names to values, with the reserved keys enforced.
///
/// One record per accepted [`LogEntry`](super::LogEntry); transient, consumed
/// by an [`Encoder`](super::Encoder).
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedRecord {
    pub timestamp: DateTime<Utc>,
    pub level: LogLevel,
    pub message: String,
    pub fields: Fields,
    pub tracing: Option<TracingContext>,
    pub thread_name: Option<String>,
}

impl NormalizedRecord {
    /// Resolved severity string
    pub fn severity(&self) -> &str {
        self.fields
            .get(SEVERITY_KEY)
            .and_then(FieldValue::as_str)
            .unwrap_or_else(|| self.level.severity())
    }

    pub fn field(&self, key: &str) -> Option<&FieldValue> {
        self.fields.get(key)
    }
}
