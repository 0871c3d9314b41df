//! Field normalization
//!
//! Turns a [`LogEntry`] into a [`NormalizedRecord`]:
//!
//! 1. Fixed contextual fields (app, environment, ...) form the base.
//! 2. Tenant attributes and the trace name are layered on top.
//! 3. Caller-supplied fields win on collision.
//! 4. The reserved `log.level` key, if present, becomes `severity`;
//!    otherwise `severity` is taken from the entry's level.
//! 5. Transform stages run in order, then rule 4 is re-asserted.
//!
//! Normalization is pure apart from a one-time warning for invalid levels.

use super::fields::{FieldValue, Fields};
use super::log_entry::LogEntry;
use super::log_level::LogLevel;
use super::record::{NormalizedRecord, INTERNAL_LEVEL_KEY, SEVERITY_KEY};
use super::tenant::TRACE_NAME_FIELD;
use std::collections::BTreeSet;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

/// A post-processing stage applied to every normalized record.
///
/// Stages are passed explicitly when the logger is built and run in the
/// order they were registered.
pub trait Transform: Send + Sync {
    fn apply(&self, record: &mut NormalizedRecord);
    fn name(&self) -> &str;
}

/// Move a field to a new key, overwriting anything already there
#[derive(Debug, Clone)]
pub struct RenameField {
    from: String,
    to: String,
}

impl RenameField {
    pub fn new(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
        }
    }
}

impl Transform for RenameField {
    fn apply(&self, record: &mut NormalizedRecord) {
        if let Some(value) = record.fields.remove(&self.from) {
            record.fields.insert(self.to.clone(), value);
        }
    }

    fn name(&self) -> &str {
        "rename_field"
    }
}

/// Remove a set of fields
#[derive(Debug, Clone)]
pub struct DropFields {
    keys: BTreeSet<String>,
}

impl DropFields {
    pub fn new<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            keys: keys.into_iter().map(Into::into).collect(),
        }
    }
}

impl Transform for DropFields {
    fn apply(&self, record: &mut NormalizedRecord) {
        for key in &self.keys {
            record.fields.remove(key);
        }
    }

    fn name(&self) -> &str {
        "drop_fields"
    }
}

/// Replace the values of sensitive fields with a placeholder
#[derive(Debug, Clone)]
pub struct RedactFields {
    keys: BTreeSet<String>,
}

impl RedactFields {
    pub const PLACEHOLDER: &'static str = "[REDACTED]";

    pub fn new<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            keys: keys.into_iter().map(Into::into).collect(),
        }
    }
}

impl Transform for RedactFields {
    fn apply(&self, record: &mut NormalizedRecord) {
        for key in &self.keys {
            if record.fields.contains_key(key) {
                record.fields.insert(key.clone(), Self::PLACEHOLDER);
            }
        }
    }

    fn name(&self) -> &str {
        "redact_fields"
    }
}

pub struct Normalizer {
    static_fields: Fields,
    stages: Vec<Arc<dyn Transform>>,
    invalid_level_warned: AtomicBool,
    invalid_levels: AtomicU64,
}

impl Normalizer {
    pub fn new(static_fields: Fields) -> Self {
        Self {
            static_fields,
            stages: Vec::new(),
            invalid_level_warned: AtomicBool::new(false),
            invalid_levels: AtomicU64::new(0),
        }
    }

    #[must_use]
    pub fn with_stage(mut self, stage: Arc<dyn Transform>) -> Self {
        self.stages.push(stage);
        self
    }

    #[must_use]
    pub fn with_stages(mut self, stages: impl IntoIterator<Item = Arc<dyn Transform>>) -> Self {
        self.stages.extend(stages);
        self
    }

    pub fn static_fields(&self) -> &Fields {
        &self.static_fields
    }

    /// Number of entries whose reserved level value was unusable
    pub fn invalid_level_count(&self) -> u64 {
        self.invalid_levels.load(Ordering::Relaxed)
    }

    pub fn normalize(&self, entry: LogEntry) -> NormalizedRecord {
        let LogEntry {
            level,
            message,
            timestamp,
            fields: mut caller,
            tenant,
            trace_name,
            tracing,
            thread_name,
            ..
        } = entry;

        let mut fields = self.static_fields.clone();
        if let Some(tenant) = tenant {
            fields.extend(&tenant.to_fields());
        }
        if let Some(trace_name) = trace_name {
            fields.insert(TRACE_NAME_FIELD, trace_name);
        }

        // A caller-supplied severity never survives; the reserved key decides.
        caller.remove(SEVERITY_KEY);
        fields.extend(&caller);

        let severity = self.resolve_severity(fields.remove(INTERNAL_LEVEL_KEY), level);
        fields.insert(SEVERITY_KEY, severity.clone());

        let mut record = NormalizedRecord {
            timestamp,
            level,
            message,
            fields,
            tracing,
            thread_name,
        };

        if !self.stages.is_empty() {
            for stage in &self.stages {
                stage.apply(&mut record);
            }
            record.fields.remove(INTERNAL_LEVEL_KEY);
            record.fields.insert(SEVERITY_KEY, severity);
        }

        record
    }

    fn resolve_severity(&self, reserved: Option<FieldValue>, level: LogLevel) -> String {
        match reserved {
            None => level.severity().to_string(),
            Some(FieldValue::String(s)) if !s.trim().is_empty() => s,
            Some(other) => {
                self.invalid_levels.fetch_add(1, Ordering::Relaxed);
                if !self.invalid_level_warned.swap(true, Ordering::Relaxed) {
                    eprintln!(
                        "[SHIPPER WARNING] Invalid value for '{}' ({}), using '{}'",
                        INTERNAL_LEVEL_KEY,
                        other,
                        LogLevel::Info.severity()
                    );
                }
                LogLevel::Info.severity().to_string()
            }
        }
    }
}

impl fmt::Debug for Normalizer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Normalizer")
            .field("static_fields", &self.static_fields)
            .field(
                "stages",
                &self.stages.iter().map(|s| s.name()).collect::<Vec<_>>(),
            )
            .finish()
    }
}

impl Default for Normalizer {
    fn default() -> Self {
        Self::new(Fields::new())
    }
}
