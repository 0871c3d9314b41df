//! Log entry structure

use super::fields::Fields;
use super::log_level::LogLevel;
use super::tenant::TenantContext;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::sync::Arc;

// Thread-local caches for thread information to avoid repeated allocations
thread_local! {
    static THREAD_ID_CACHE: RefCell<Option<String>> = const { RefCell::new(None) };
    static THREAD_NAME_CACHE: RefCell<Option<Option<String>>> = const { RefCell::new(None) };
}

/// Get cached thread ID, computing and caching it on first access
fn get_thread_id() -> String {
    THREAD_ID_CACHE.with(|cache| {
        cache
            .borrow_mut()
            .get_or_insert_with(|| format!("{:?}", std::thread::current().id()))
            .clone()
    })
}

/// Get cached thread name, computing and caching it on first access
fn get_thread_name() -> Option<String> {
    THREAD_NAME_CACHE.with(|cache| {
        cache
            .borrow_mut()
            .get_or_insert_with(|| std::thread::current().name().map(String::from))
            .clone()
    })
}

/// Tracing context for distributed tracing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TracingContext {
    /// Trace ID for request correlation
    pub trace_id: String,

    /// Span ID for this operation
    pub span_id: String,

    /// Parent span ID (if any)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_span_id: Option<String>,
}

impl TracingContext {
    pub fn new(trace_id: impl Into<String>, span_id: impl Into<String>) -> Self {
        Self {
            trace_id: trace_id.into(),
            span_id: span_id.into(),
            parent_span_id: None,
        }
    }

    pub fn with_parent(mut self, parent_span_id: impl Into<String>) -> Self {
        self.parent_span_id = Some(parent_span_id.into());
        self
    }
}

/// A single log call, captured at the call site.
///
/// Immutable once built; consumed by the normalizer.
#[derive(Debug, Clone)]
pub struct LogEntry {
    pub level: LogLevel,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    pub fields: Fields,
    pub tenant: Option<Arc<TenantContext>>,
    pub trace_name: Option<String>,
    pub tracing: Option<TracingContext>,
    pub thread_id: String,
    pub thread_name: Option<String>,
}

impl LogEntry {
    /// Sanitize log message to prevent log injection attacks
    ///
    /// Replaces newlines, carriage returns, and tabs with escape sequences
    /// so a message always stays on one line of any line-oriented output.
    fn sanitize_message(message: &str) -> String {
        message
            .replace('\n', "\\n")
            .replace('\r', "\\r")
            .replace('\t', "\\t")
    }

    pub fn new(level: LogLevel, message: impl Into<String>) -> Self {
        Self {
            level,
            message: Self::sanitize_message(&message.into()),
            timestamp: Utc::now(),
            fields: Fields::new(),
            tenant: None,
            trace_name: None,
            tracing: None,
            thread_id: get_thread_id(),
            thread_name: get_thread_name(),
        }
    }

    pub fn with_fields(mut self, fields: Fields) -> Self {
        self.fields = fields;
        self
    }

    pub fn with_tenant(mut self, tenant: Arc<TenantContext>) -> Self {
        self.tenant = Some(tenant);
        self
    }

    pub fn with_trace_name(mut self, trace_name: impl Into<String>) -> Self {
        self.trace_name = Some(trace_name.into());
        self
    }

    pub fn with_tracing(mut self, tracing: TracingContext) -> Self {
        self.tracing = Some(tracing);
        self
    }

    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_sanitized() {
        let entry = LogEntry::new(LogLevel::Info, "line one\nERROR fake\tentry");
        assert_eq!(entry.message, "line one\\nERROR fake\\tentry");
    }

    #[test]
    fn test_builder_methods() {
        let tenant = Arc::new(TenantContext::new("t-9"));
        let entry = LogEntry::new(LogLevel::Warn, "hello")
            .with_fields(Fields::new().with_field("k", "v"))
            .with_tenant(Arc::clone(&tenant))
            .with_trace_name("checkout")
            .with_tracing(TracingContext::new("trace-1", "span-1").with_parent("span-0"));

        assert_eq!(entry.fields.len(), 1);
        assert_eq!(entry.tenant.as_deref(), Some(&*tenant));
        assert_eq!(entry.trace_name.as_deref(), Some("checkout"));
        let tracing = entry.tracing.unwrap();
        assert_eq!(tracing.parent_span_id.as_deref(), Some("span-0"));
    }

    #[test]
    fn test_thread_id_cached() {
        let a = LogEntry::new(LogLevel::Info, "a");
        let b = LogEntry::new(LogLevel::Info, "b");
        assert_eq!(a.thread_id, b.thread_id);
    }
}
