//! Encoders turning normalized records into sink documents
//!
//! Encoding never fails: a field value JSON cannot represent is replaced by
//! its string form, an unusable timestamp format falls back to ISO 8601, and
//! the record is flagged as degraded.

use super::fields::Fields;
use super::log_level::LogLevel;
use super::record::{NormalizedRecord, SEVERITY_KEY};
use super::tenant::TRACE_NAME_FIELD;
use super::timestamp::TimestampFormat;
use serde_json::{Map, Value};

/// ECS version advertised in encoded documents
pub const ECS_VERSION: &str = "1.6.0";

/// Tag added to documents whose encoding substituted a value
pub const DEGRADED_TAG: &str = "degraded";

/// A record serialized into the sink's document representation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedRecord {
    payload: String,
    level: LogLevel,
    degraded: bool,
}

impl EncodedRecord {
    pub fn new(payload: impl Into<String>, level: LogLevel, degraded: bool) -> Self {
        Self {
            payload: payload.into(),
            level,
            degraded,
        }
    }

    /// The serialized JSON document
    pub fn payload(&self) -> &str {
        &self.payload
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.payload.as_bytes()
    }

    pub fn level(&self) -> LogLevel {
        self.level
    }

    pub fn is_degraded(&self) -> bool {
        self.degraded
    }
}

/// Serializes a [`NormalizedRecord`] into a document for a target schema
pub trait Encoder: Send + Sync {
    fn encode(&self, record: &NormalizedRecord) -> EncodedRecord;
    fn name(&self) -> &str;
}

/// Convert every field, substituting a string for values JSON cannot carry.
///
/// Returns the converted map and whether any substitution happened.
fn encode_fields(fields: &Fields, skip: &[&str]) -> (Map<String, Value>, bool) {
    let mut out = Map::with_capacity(fields.len());
    let mut degraded = false;
    for (key, value) in fields.iter() {
        if skip.contains(&key.as_str()) {
            continue;
        }
        let json = value.to_json_value().unwrap_or_else(|_| {
            degraded = true;
            Value::String(value.to_string())
        });
        out.insert(key.clone(), json);
    }
    (out, degraded)
}

fn to_payload(doc: Value, record: &NormalizedRecord, degraded: bool) -> EncodedRecord {
    match serde_json::to_string(&doc) {
        Ok(payload) => EncodedRecord::new(payload, record.level, degraded),
        Err(e) => minimal_document(record, &e.to_string()),
    }
}

/// Last resort document: keeps the message and severity, drops everything else.
pub(crate) fn minimal_document(record: &NormalizedRecord, reason: &str) -> EncodedRecord {
    let minimal = serde_json::json!({
        "message": record.message,
        "severity": record.severity(),
        "tags": [DEGRADED_TAG],
        "error.message": reason,
    });
    EncodedRecord::new(minimal.to_string(), record.level, true)
}

/// ECS-like document layout.
///
/// ```text
/// {"@timestamp": .., "message": .., "severity": .., "ecs.version": "1.6.0",
///  "service.name": .., "service.environment": .., "process.thread.name": ..,
///  "trace.id": .., "span.id": .., "fields": { ..caller and context fields.. }}
/// ```
#[derive(Debug, Clone, Default)]
pub struct EcsEncoder {
    timestamp_format: TimestampFormat,
}

impl EcsEncoder {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_timestamp_format(mut self, format: TimestampFormat) -> Self {
        self.timestamp_format = format;
        self
    }
}

impl Encoder for EcsEncoder {
    fn encode(&self, record: &NormalizedRecord) -> EncodedRecord {
        let (mut fields, fields_degraded) = encode_fields(&record.fields, &[SEVERITY_KEY]);
        let (timestamp, timestamp_degraded) =
            self.timestamp_format.to_json_value(&record.timestamp);
        let degraded = fields_degraded || timestamp_degraded;

        // A nested `fields` map (e.g. fields.service) is hoisted into the namespace.
        match fields.remove("fields") {
            Some(Value::Object(nested)) => {
                for (k, v) in nested {
                    fields.entry(k).or_insert(v);
                }
            }
            Some(other) => {
                fields.insert("fields".into(), other);
            }
            None => {}
        }

        let mut doc = Map::new();
        doc.insert("@timestamp".into(), timestamp);
        doc.insert("message".into(), Value::String(record.message.clone()));
        doc.insert(SEVERITY_KEY.into(), Value::String(record.severity().to_string()));
        doc.insert("ecs.version".into(), Value::String(ECS_VERSION.into()));

        if let Some(Value::String(app)) = fields.get("app") {
            doc.insert("service.name".into(), Value::String(app.clone()));
        }
        if let Some(Value::String(env)) = fields.get("environment") {
            doc.insert("service.environment".into(), Value::String(env.clone()));
        }
        if let Some(Value::String(trace_name)) = fields.get(TRACE_NAME_FIELD) {
            doc.insert("log.logger".into(), Value::String(trace_name.clone()));
        }
        if let Some(ref name) = record.thread_name {
            doc.insert("process.thread.name".into(), Value::String(name.clone()));
        }
        if let Some(ref tracing) = record.tracing {
            doc.insert("trace.id".into(), Value::String(tracing.trace_id.clone()));
            doc.insert("span.id".into(), Value::String(tracing.span_id.clone()));
            if let Some(ref parent) = tracing.parent_span_id {
                doc.insert("parent.id".into(), Value::String(parent.clone()));
            }
        }

        doc.insert("fields".into(), Value::Object(fields));
        if degraded {
            doc.insert("tags".into(), Value::Array(vec![Value::String(DEGRADED_TAG.into())]));
        }

        to_payload(Value::Object(doc), record, degraded)
    }

    fn name(&self) -> &str {
        "ecs"
    }
}

/// Flat JSON layout: every field at the top level next to the reserved keys
#[derive(Debug, Clone, Default)]
pub struct FlatJsonEncoder {
    timestamp_format: TimestampFormat,
}

impl FlatJsonEncoder {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_timestamp_format(mut self, format: TimestampFormat) -> Self {
        self.timestamp_format = format;
        self
    }
}

impl Encoder for FlatJsonEncoder {
    fn encode(&self, record: &NormalizedRecord) -> EncodedRecord {
        let (mut doc, fields_degraded) = encode_fields(&record.fields, &[SEVERITY_KEY]);
        let (timestamp, timestamp_degraded) =
            self.timestamp_format.to_json_value(&record.timestamp);
        let degraded = fields_degraded || timestamp_degraded;

        doc.insert("timestamp".into(), timestamp);
        doc.insert("message".into(), Value::String(record.message.clone()));
        doc.insert(SEVERITY_KEY.into(), Value::String(record.severity().to_string()));
        if let Some(ref tracing) = record.tracing {
            doc.insert("trace_id".into(), Value::String(tracing.trace_id.clone()));
            doc.insert("span_id".into(), Value::String(tracing.span_id.clone()));
        }
        if degraded {
            doc.insert("degraded".into(), Value::Bool(true));
        }

        to_payload(Value::Object(doc), record, degraded)
    }

    fn name(&self) -> &str {
        "flat_json"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{FieldValue, LogEntry, Normalizer, TracingContext};

    fn record(fields: Fields) -> NormalizedRecord {
        let normalizer = Normalizer::new(
            Fields::new()
                .with_field("app", "orders")
                .with_field("environment", "prod")
                .with_field("fields", Fields::new().with_field("service", "orders")),
        );
        normalizer.normalize(
            LogEntry::new(LogLevel::Error, "payment failed")
                .with_fields(fields)
                .with_tracing(TracingContext::new("t1", "s1")),
        )
    }

    #[test]
    fn test_ecs_layout() {
        let encoded = EcsEncoder::new().encode(&record(Fields::new().with_field("order_id", 42)));
        assert!(!encoded.is_degraded());
        assert_eq!(encoded.level(), LogLevel::Error);

        let doc: Value = serde_json::from_str(encoded.payload()).unwrap();
        assert_eq!(doc["message"], "payment failed");
        assert_eq!(doc["severity"], "error");
        assert_eq!(doc["service.name"], "orders");
        assert_eq!(doc["service.environment"], "prod");
        assert_eq!(doc["trace.id"], "t1");
        assert_eq!(doc["ecs.version"], ECS_VERSION);
        assert_eq!(doc["fields"]["order_id"], 42);
        assert_eq!(doc["fields"]["service"], "orders");
        assert!(doc["fields"].get("severity").is_none());
        assert!(doc.get("tags").is_none());
    }

    #[test]
    fn test_degraded_value_substituted() {
        let encoded = EcsEncoder::new().encode(&record(
            Fields::new()
                .with_field("ratio", f64::NAN)
                .with_field("raw", FieldValue::Json("{broken".into())),
        ));
        assert!(encoded.is_degraded());

        let doc: Value = serde_json::from_str(encoded.payload()).unwrap();
        assert_eq!(doc["fields"]["ratio"], "NaN");
        assert_eq!(doc["fields"]["raw"], "{broken");
        assert_eq!(doc["tags"][0], DEGRADED_TAG);
        assert_eq!(doc["message"], "payment failed");
    }

    #[test]
    fn test_raw_json_embedded() {
        let encoded = FlatJsonEncoder::new().encode(&record(
            Fields::new().with_field("payload", FieldValue::Json(r#"{"sku":"A1"}"#.into())),
        ));
        let doc: Value = serde_json::from_str(encoded.payload()).unwrap();
        assert_eq!(doc["payload"]["sku"], "A1");
        assert_eq!(doc["severity"], "error");
        assert!(doc.get("degraded").is_none());
    }

    #[test]
    fn test_invalid_timestamp_format_degrades() {
        let encoded = EcsEncoder::new()
            .with_timestamp_format(TimestampFormat::Custom("%Q".into()))
            .encode(&record(Fields::new()));
        assert!(encoded.is_degraded());

        let doc: Value = serde_json::from_str(encoded.payload()).unwrap();
        assert!(doc["@timestamp"].as_str().unwrap().ends_with('Z'));
        assert_eq!(doc["tags"][0], DEGRADED_TAG);
        assert_eq!(doc["message"], "payment failed");

        let encoded = FlatJsonEncoder::new()
            .with_timestamp_format(TimestampFormat::Custom("%Q".into()))
            .encode(&record(Fields::new()));
        assert!(encoded.is_degraded());
        let doc: Value = serde_json::from_str(encoded.payload()).unwrap();
        assert_eq!(doc["degraded"], true);
        assert!(doc["timestamp"].is_string());
    }

    #[test]
    fn test_flat_reserved_keys_win() {
        let encoded = FlatJsonEncoder::new()
            .with_timestamp_format(TimestampFormat::UnixMillis)
            .encode(&record(Fields::new().with_field("message", "shadow")));
        let doc: Value = serde_json::from_str(encoded.payload()).unwrap();
        assert_eq!(doc["message"], "payment failed");
        assert!(doc["timestamp"].is_number());
    }
}
