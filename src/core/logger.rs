//! Logger facade
//!
//! A [`Logger`] is a cheap handle: clones and scoped children
//! ([`Logger::with_fields`], [`Logger::with_tenant`]) share one pipeline, so
//! deriving a facade never opens another sink connection.

use super::{
    config::LoggerConfig,
    encoder::{EcsEncoder, Encoder},
    fallback::FallbackSink,
    fields::Fields,
    log_entry::{LogEntry, TracingContext},
    log_level::LogLevel,
    metrics::PipelineMetrics,
    normalizer::{Normalizer, Transform},
    overflow_policy::{OverflowCallback, OverflowPolicy},
    pipeline::{Pipeline, PipelineParts},
    queue::{EnqueueOutcome, QueueConfig},
    retry::RetryPolicy,
    shipper::ShipperConfig,
    sink::SinkClient,
    tenant::TenantContext,
};
use crate::sinks::ConsoleFallback;
use parking_lot::RwLock;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

pub use super::pipeline::DEFAULT_SHUTDOWN_TIMEOUT;

/// Default bound on the flush performed by [`Logger::fatal`]
pub const DEFAULT_FATAL_FLUSH_TIMEOUT: Duration = Duration::from_secs(5);

/// Called after a fatal entry has been flushed. Receives the message.
pub type FatalHandler = Arc<dyn Fn(&str) + Send + Sync>;

fn exit_process(_message: &str) {
    std::process::exit(1)
}

struct LoggerInner {
    pipeline: Pipeline,
    normalizer: Normalizer,
    encoder: Arc<dyn Encoder>,
    min_level: RwLock<LogLevel>,
    ship_level: LogLevel,
    echo: Option<Arc<dyn FallbackSink>>,
    fatal_handler: FatalHandler,
    fatal_flush_timeout: Duration,
}

/// Context a scoped facade attaches to every entry
#[derive(Default, Clone)]
struct Scope {
    fields: Fields,
    tenant: Option<Arc<TenantContext>>,
    trace_name: Option<String>,
    tracing: Option<TracingContext>,
}

#[derive(Clone)]
pub struct Logger {
    inner: Arc<LoggerInner>,
    scope: Arc<Scope>,
}

impl Logger {
    pub fn builder() -> LoggerBuilder {
        LoggerBuilder::new()
    }

    /// Build a logger from a configuration record.
    ///
    /// Never fails: an invalid level becomes `info` and a sink that cannot be
    /// constructed disables shipping, each reported once on stderr.
    pub fn from_config(config: &LoggerConfig) -> Self {
        LoggerBuilder::from_config(config).build()
    }

    /// A logger that ships nothing
    pub fn disabled() -> Self {
        LoggerBuilder::new().shipping(false).build()
    }

    fn derive(&self, scope: Scope) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            scope: Arc::new(scope),
        }
    }

    /// A child facade attaching `fields` to every entry; `self` is unchanged.
    ///
    /// Later fields win over fields attached earlier.
    #[must_use]
    pub fn with_fields(&self, fields: Fields) -> Self {
        let mut scope = (*self.scope).clone();
        scope.fields.extend(&fields);
        self.derive(scope)
    }

    #[must_use]
    pub fn with_field(&self, key: impl Into<String>, value: impl Into<super::FieldValue>) -> Self {
        self.with_fields(Fields::new().with_field(key, value))
    }

    /// A child facade attaching a tenant and a `trace_name` to every entry
    #[must_use]
    pub fn with_tenant(&self, trace_name: impl Into<String>, tenant: impl Into<Arc<TenantContext>>) -> Self {
        let mut scope = (*self.scope).clone();
        scope.trace_name = Some(trace_name.into());
        scope.tenant = Some(tenant.into());
        self.derive(scope)
    }

    #[must_use]
    pub fn with_tracing(&self, tracing: TracingContext) -> Self {
        let mut scope = (*self.scope).clone();
        scope.tracing = Some(tracing);
        self.derive(scope)
    }

    /// Log and report what the dispatch queue did with the record.
    ///
    /// Returns `None` when the entry was filtered by the minimum level or is
    /// below the ship level (echo only).
    pub fn try_log(
        &self,
        level: LogLevel,
        message: impl Into<String>,
        fields: Fields,
    ) -> Option<EnqueueOutcome> {
        let inner = &*self.inner;
        if level < *inner.min_level.read() {
            inner.pipeline.metrics().record_filtered();
            return None;
        }

        let fields = if self.scope.fields.is_empty() {
            fields
        } else {
            self.scope.fields.merged(&fields)
        };
        let mut entry = LogEntry::new(level, message).with_fields(fields);
        if let Some(ref tenant) = self.scope.tenant {
            entry = entry.with_tenant(Arc::clone(tenant));
        }
        if let Some(ref trace_name) = self.scope.trace_name {
            entry = entry.with_trace_name(trace_name.clone());
        }
        if let Some(ref tracing) = self.scope.tracing {
            entry = entry.with_tracing(tracing.clone());
        }

        let record = inner.normalizer.normalize(entry);
        if let Some(ref echo) = inner.echo {
            let encoded = inner.encoder.encode(&record);
            let _ = echo.write_line(level, encoded.payload());
        }

        if level < inner.ship_level {
            return None;
        }
        Some(inner.pipeline.enqueue(record))
    }

    #[inline]
    pub fn log(&self, level: LogLevel, message: impl Into<String>) {
        self.try_log(level, message, Fields::new());
    }

    #[inline]
    pub fn log_with(&self, level: LogLevel, message: impl Into<String>, fields: Fields) {
        self.try_log(level, message, fields);
    }

    #[inline]
    pub fn trace(&self, message: impl Into<String>) {
        self.log(LogLevel::Trace, message);
    }

    #[inline]
    pub fn debug(&self, message: impl Into<String>) {
        self.log(LogLevel::Debug, message);
    }

    #[inline]
    pub fn info(&self, message: impl Into<String>) {
        self.log(LogLevel::Info, message);
    }

    #[inline]
    pub fn warn(&self, message: impl Into<String>) {
        self.log(LogLevel::Warn, message);
    }

    #[inline]
    pub fn error(&self, message: impl Into<String>) {
        self.log(LogLevel::Error, message);
    }

    pub fn trace_with(&self, message: impl Into<String>, fields: Fields) {
        self.log_with(LogLevel::Trace, message, fields);
    }

    pub fn debug_with(&self, message: impl Into<String>, fields: Fields) {
        self.log_with(LogLevel::Debug, message, fields);
    }

    pub fn info_with(&self, message: impl Into<String>, fields: Fields) {
        self.log_with(LogLevel::Info, message, fields);
    }

    pub fn warn_with(&self, message: impl Into<String>, fields: Fields) {
        self.log_with(LogLevel::Warn, message, fields);
    }

    pub fn error_with(&self, message: impl Into<String>, fields: Fields) {
        self.log_with(LogLevel::Error, message, fields);
    }

    /// Log at fatal level, flush (bounded), then run the fatal handler.
    ///
    /// The default handler exits the process with status 1. A flush that
    /// times out does not prevent the handler from running.
    pub fn fatal(&self, message: impl Into<String>) {
        self.fatal_with(message, Fields::new());
    }

    pub fn fatal_with(&self, message: impl Into<String>, fields: Fields) {
        let message = message.into();
        self.try_log(LogLevel::Fatal, message.clone(), fields);

        if !self.inner.pipeline.flush(self.inner.fatal_flush_timeout) {
            eprintln!(
                "[SHIPPER WARNING] Flush before fatal exit did not finish within {:?}",
                self.inner.fatal_flush_timeout
            );
        }
        (self.inner.fatal_handler)(&message);
    }

    /// Wait until everything logged so far is delivered or given up on.
    ///
    /// Returns `true` iff the queue is empty and nothing is in flight.
    pub fn flush(&self, timeout: Duration) -> bool {
        self.inner.pipeline.flush(timeout)
    }

    /// Stop the shared pipeline; affects every facade derived from the same
    /// builder. Returns `true` if the shipper stopped within `timeout`.
    pub fn shutdown(&self, timeout: Duration) -> bool {
        self.inner.pipeline.shutdown(timeout)
    }

    pub fn set_min_level(&self, level: LogLevel) {
        *self.inner.min_level.write() = level;
    }

    pub fn min_level(&self) -> LogLevel {
        *self.inner.min_level.read()
    }

    pub fn ship_level(&self) -> LogLevel {
        self.inner.ship_level
    }

    /// Whether records are being shipped to a sink
    pub fn is_shipping(&self) -> bool {
        self.inner.pipeline.is_shipping()
    }

    /// Pipeline counters
    ///
    /// # Example
    ///
    /// ```
    /// use rust_log_shipper::Logger;
    ///
    /// let logger = Logger::disabled();
    /// logger.info("discarded");
    ///
    /// let metrics = logger.metrics();
    /// assert_eq!(metrics.discarded_disabled(), 1);
    /// assert_eq!(metrics.lost(), 0);
    /// ```
    pub fn metrics(&self) -> &PipelineMetrics {
        self.inner.pipeline.metrics()
    }

    /// Number of entries whose reserved level value was unusable
    pub fn invalid_level_count(&self) -> u64 {
        self.inner.normalizer.invalid_level_count()
    }

    /// Whether two handles share one pipeline
    pub fn same_pipeline(&self, other: &Logger) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for Logger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Logger")
            .field("min_level", &self.min_level())
            .field("ship_level", &self.inner.ship_level)
            .field("pipeline", &self.inner.pipeline)
            .field("scope_fields", &self.scope.fields.len())
            .finish()
    }
}

/// Builder for constructing a [`Logger`] with a fluent API
///
/// # Example
/// ```
/// use rust_log_shipper::prelude::*;
/// use rust_log_shipper::sinks::{MemoryFallback, MemorySink};
/// use std::sync::Arc;
/// use std::time::Duration;
///
/// let logger = Logger::builder()
///     .app_name("orders")
///     .environment("staging")
///     .min_level(LogLevel::Debug)
///     .sink(MemorySink::new())
///     .fallback(MemoryFallback::new())
///     .overflow_policy(OverflowPolicy::DropOldest)
///     .on_overflow(Arc::new(|count| {
///         eprintln!("ALERT: {} overflow events", count);
///     }))
///     .build();
///
/// logger.info("ready");
/// assert!(logger.flush(Duration::from_secs(1)));
/// ```
pub struct LoggerBuilder {
    app_name: String,
    environment: String,
    min_level: LogLevel,
    ship_level: LogLevel,
    static_fields: Fields,
    stages: Vec<Arc<dyn Transform>>,
    encoder: Arc<dyn Encoder>,
    fallback: Option<Arc<dyn FallbackSink>>,
    echo: Option<Arc<dyn FallbackSink>>,
    queue: QueueConfig,
    shipper: ShipperConfig,
    sink: Option<Box<dyn SinkClient>>,
    shipping: bool,
    on_overflow: Option<OverflowCallback>,
    fatal_handler: Option<FatalHandler>,
    fatal_flush_timeout: Duration,
}

impl LoggerBuilder {
    /// Create a new builder with default values
    pub fn new() -> Self {
        Self {
            app_name: String::new(),
            environment: String::new(),
            min_level: LogLevel::Info,
            ship_level: LogLevel::Info,
            static_fields: Fields::new(),
            stages: Vec::new(),
            encoder: Arc::new(EcsEncoder::new()),
            fallback: None,
            echo: None,
            queue: QueueConfig::default(),
            shipper: ShipperConfig::default(),
            sink: None,
            shipping: true,
            on_overflow: None,
            fatal_handler: None,
            fatal_flush_timeout: DEFAULT_FATAL_FLUSH_TIMEOUT,
        }
    }

    /// Builder preloaded from a configuration record.
    ///
    /// With `enable_log` set, an Elasticsearch sink is constructed for
    /// `host`; if that fails, shipping is disabled with a warning.
    pub fn from_config(config: &LoggerConfig) -> Self {
        let (min_level, invalid) = config.min_level();
        if invalid {
            eprintln!(
                "[SHIPPER WARNING] Invalid log level '{}', using '{}'",
                config.log_level, min_level
            );
        }
        let (ship_level, invalid) = config.ship_level();
        if invalid {
            eprintln!(
                "[SHIPPER WARNING] Invalid ship level '{}', using '{}'",
                config.ship_level, ship_level
            );
        }

        let mut builder = Self::new()
            .app_name(config.app_name.clone())
            .environment(config.environment.clone())
            .min_level(min_level)
            .ship_level(ship_level)
            .queue_config(config.queue_config())
            .shipper_config(config.shipper_config())
            .fatal_flush_timeout(config.fatal_flush_timeout())
            .shipping(config.enable_log);

        if config.echo {
            builder = builder.echo(ConsoleFallback::new());
        }

        if config.enable_log {
            #[cfg(feature = "elasticsearch")]
            {
                builder = builder.try_sink(crate::sinks::ElasticsearchSink::new(
                    config.elasticsearch_config(),
                ));
            }
            #[cfg(not(feature = "elasticsearch"))]
            {
                eprintln!(
                    "[SHIPPER WARNING] Built without the `elasticsearch` feature; shipping disabled"
                );
            }
        }
        builder
    }

    /// Service name, written as `app` (and `fields.service` when shipping)
    #[must_use = "builder methods return a new value"]
    pub fn app_name(mut self, name: impl Into<String>) -> Self {
        self.app_name = name.into();
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn environment(mut self, environment: impl Into<String>) -> Self {
        self.environment = environment.into();
        self
    }

    /// Set minimum log level
    #[must_use = "builder methods return a new value"]
    pub fn min_level(mut self, level: LogLevel) -> Self {
        self.min_level = level;
        self
    }

    /// Entries below this level are echoed locally but not shipped
    #[must_use = "builder methods return a new value"]
    pub fn ship_level(mut self, level: LogLevel) -> Self {
        self.ship_level = level;
        self
    }

    /// Add a field attached to every entry
    #[must_use = "builder methods return a new value"]
    pub fn static_field(mut self, key: impl Into<String>, value: impl Into<super::FieldValue>) -> Self {
        self.static_fields.insert(key, value);
        self
    }

    /// Append a transform stage; stages run in the order added
    #[must_use = "builder methods return a new value"]
    pub fn stage(mut self, stage: impl Transform + 'static) -> Self {
        self.stages.push(Arc::new(stage));
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn encoder(mut self, encoder: impl Encoder + 'static) -> Self {
        self.encoder = Arc::new(encoder);
        self
    }

    /// Where undeliverable records go (stderr by default)
    #[must_use = "builder methods return a new value"]
    pub fn fallback(mut self, fallback: impl FallbackSink + 'static) -> Self {
        self.fallback = Some(Arc::new(fallback));
        self
    }

    /// Also write every accepted record to `echo`
    #[must_use = "builder methods return a new value"]
    pub fn echo(mut self, echo: impl FallbackSink + 'static) -> Self {
        self.echo = Some(Arc::new(echo));
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn queue_config(mut self, config: QueueConfig) -> Self {
        self.queue = config;
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn queue_capacity(mut self, capacity: usize) -> Self {
        self.queue.capacity = capacity;
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn overflow_policy(mut self, policy: OverflowPolicy) -> Self {
        self.queue.overflow_policy = policy;
        self
    }

    /// Set callback for overflow notifications
    #[must_use = "builder methods return a new value"]
    pub fn on_overflow(mut self, callback: OverflowCallback) -> Self {
        self.on_overflow = Some(callback);
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn shipper_config(mut self, config: ShipperConfig) -> Self {
        self.shipper = config;
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn batch_size(mut self, batch_size: usize) -> Self {
        self.shipper.batch_size = batch_size;
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn linger(mut self, linger: Duration) -> Self {
        self.shipper.linger = linger;
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.shipper.retry = retry;
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn shutdown_grace(mut self, grace: Duration) -> Self {
        self.shipper.shutdown_grace = grace;
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn sink(mut self, sink: impl SinkClient + 'static) -> Self {
        self.sink = Some(Box::new(sink));
        self
    }

    /// Use the sink if it was constructed; otherwise warn once and build with
    /// shipping disabled.
    #[must_use = "builder methods return a new value"]
    pub fn try_sink<S: SinkClient + 'static>(mut self, sink: super::Result<S>) -> Self {
        match sink {
            Ok(sink) => self.sink = Some(Box::new(sink)),
            Err(e) => {
                eprintln!("[SHIPPER WARNING] {}; shipping disabled", e);
                self.sink = None;
            }
        }
        self
    }

    /// Turn shipping on or off (on by default, but only effective with a sink)
    #[must_use = "builder methods return a new value"]
    pub fn shipping(mut self, enabled: bool) -> Self {
        self.shipping = enabled;
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn fatal_handler(mut self, handler: FatalHandler) -> Self {
        self.fatal_handler = Some(handler);
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn fatal_flush_timeout(mut self, timeout: Duration) -> Self {
        self.fatal_flush_timeout = timeout;
        self
    }

    /// Replace invalid settings with safe values, warning once per setting.
    fn sanitize(&mut self) {
        if let Err(e) = self.queue.validate() {
            eprintln!("[SHIPPER WARNING] {}; using capacity 1", e);
            self.queue.capacity = 1;
        }
        if self.shipper.batch_size == 0 {
            eprintln!("[SHIPPER WARNING] batch_size 0 is invalid; using 1");
            self.shipper.batch_size = 1;
        }
        if self.shipper.idle_poll.is_zero() {
            self.shipper.idle_poll = ShipperConfig::default().idle_poll;
        }
        if let Err(e) = self.shipper.retry.validate() {
            eprintln!("[SHIPPER WARNING] {}; using base_delay as max_delay", e);
            self.shipper.retry.max_delay = self.shipper.retry.base_delay;
        }
    }

    pub fn build(mut self) -> Logger {
        self.sanitize();

        let app_name = if self.app_name.is_empty() {
            "-".to_string()
        } else {
            self.app_name
        };

        let fallback = self
            .fallback
            .unwrap_or_else(|| Arc::new(ConsoleFallback::new()));
        let sink = if self.shipping { self.sink } else { None };
        let pipeline = Pipeline::start(PipelineParts {
            queue: QueueConfig {
                enabled: self.shipping,
                ..self.queue
            },
            shipper: self.shipper,
            sink,
            encoder: Arc::clone(&self.encoder),
            fallback,
            on_overflow: self.on_overflow,
        });

        let mut static_fields = Fields::new()
            .with_field("app", app_name.clone())
            .with_field("environment", self.environment);
        if pipeline.is_shipping() {
            static_fields.insert("fields", Fields::new().with_field("service", app_name));
        }
        static_fields.extend(&self.static_fields);

        let inner = LoggerInner {
            pipeline,
            normalizer: Normalizer::new(static_fields).with_stages(self.stages),
            encoder: self.encoder,
            min_level: RwLock::new(self.min_level),
            ship_level: self.ship_level,
            echo: self.echo,
            fatal_handler: self
                .fatal_handler
                .unwrap_or_else(|| Arc::new(exit_process) as FatalHandler),
            fatal_flush_timeout: self.fatal_flush_timeout,
        };

        Logger {
            inner: Arc::new(inner),
            scope: Arc::new(Scope::default()),
        }
    }
}

impl Default for LoggerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::normalizer::RedactFields;
    use crate::sinks::{MemoryFallback, MemorySink};
    use parking_lot::Mutex;
    use serde_json::Value;

    fn shipping_logger(sink: &MemorySink) -> Logger {
        Logger::builder()
            .app_name("orders")
            .environment("test")
            .sink(sink.clone())
            .fallback(MemoryFallback::new())
            .linger(Duration::from_millis(10))
            .build()
    }

    fn docs(sink: &MemorySink) -> Vec<Value> {
        sink.delivered()
            .iter()
            .map(|p| serde_json::from_str(p).unwrap())
            .collect()
    }

    #[test]
    fn test_min_level_filters() {
        let sink = MemorySink::new();
        let logger = shipping_logger(&sink);
        logger.debug("hidden");
        logger.info("shown");
        assert!(logger.flush(Duration::from_secs(2)));

        assert_eq!(sink.delivered_count(), 1);
        assert_eq!(logger.metrics().filtered(), 1);
    }

    #[test]
    fn test_contextual_fields() {
        let sink = MemorySink::new();
        let logger = shipping_logger(&sink);
        logger.info_with("hello", Fields::new().with_field("path", "/"));
        assert!(logger.flush(Duration::from_secs(2)));

        let doc = &docs(&sink)[0];
        assert_eq!(doc["severity"], "info");
        assert_eq!(doc["service.name"], "orders");
        assert_eq!(doc["fields"]["app"], "orders");
        assert_eq!(doc["fields"]["environment"], "test");
        assert_eq!(doc["fields"]["service"], "orders");
        assert_eq!(doc["fields"]["path"], "/");
    }

    #[test]
    fn test_with_fields_does_not_affect_parent() {
        let sink = MemorySink::new();
        let logger = shipping_logger(&sink);
        let child = logger.with_field("request_id", "r-1");
        assert!(child.same_pipeline(&logger));

        logger.info("parent");
        child.info("child");
        assert!(logger.flush(Duration::from_secs(2)));

        let docs = docs(&sink);
        assert!(docs[0]["fields"].get("request_id").is_none());
        assert_eq!(docs[1]["fields"]["request_id"], "r-1");
    }

    #[test]
    fn test_with_tenant() {
        let sink = MemorySink::new();
        let logger = shipping_logger(&sink);
        let tenant = TenantContext {
            company_id: 7,
            shop_name: "Acme".into(),
            ..TenantContext::new("t-7")
        };
        logger
            .with_tenant("checkout", tenant)
            .info_with("paid", Fields::new().with_field("shop_name", "Override"));
        assert!(logger.flush(Duration::from_secs(2)));

        let doc = &docs(&sink)[0];
        assert_eq!(doc["fields"]["tenant_id"], "t-7");
        assert_eq!(doc["fields"]["company_id"], 7);
        assert_eq!(doc["fields"]["trace_name"], "checkout");
        assert_eq!(doc["fields"]["shop_name"], "Override");
        assert_eq!(doc["log.logger"], "checkout");
    }

    #[test]
    fn test_ship_level_and_echo() {
        let sink = MemorySink::new();
        let echo = MemoryFallback::new();
        let logger = Logger::builder()
            .min_level(LogLevel::Trace)
            .ship_level(LogLevel::Warn)
            .sink(sink.clone())
            .echo(echo.clone())
            .linger(Duration::from_millis(10))
            .build();

        assert_eq!(logger.try_log(LogLevel::Info, "local", Fields::new()), None);
        assert_eq!(
            logger.try_log(LogLevel::Error, "remote", Fields::new()),
            Some(EnqueueOutcome::Accepted)
        );
        assert!(logger.flush(Duration::from_secs(2)));

        assert_eq!(echo.len(), 2);
        assert_eq!(sink.delivered_count(), 1);
    }

    #[test]
    fn test_redact_stage() {
        let sink = MemorySink::new();
        let logger = Logger::builder()
            .sink(sink.clone())
            .stage(RedactFields::new(["password"]))
            .linger(Duration::from_millis(10))
            .build();
        logger.info_with("login", Fields::new().with_field("password", "hunter2"));
        assert!(logger.flush(Duration::from_secs(2)));

        assert_eq!(docs(&sink)[0]["fields"]["password"], "[REDACTED]");
    }

    #[test]
    fn test_without_sink_shipping_is_disabled() {
        let logger = Logger::builder().app_name("").build();
        assert!(!logger.is_shipping());
        logger.info("nowhere");
        assert!(logger.flush(Duration::ZERO));
        assert_eq!(logger.metrics().discarded_disabled(), 1);
    }

    #[test]
    fn test_fatal_flushes_then_calls_handler() {
        let sink = MemorySink::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = Arc::clone(&seen);
        let observer = sink.clone();
        let logger = Logger::builder()
            .sink(sink.clone())
            .linger(Duration::from_secs(10))
            .fatal_handler(Arc::new(move |message: &str| {
                seen_clone.lock().push((message.to_string(), observer.delivered_count()));
            }))
            .build();

        logger.fatal("boom");
        assert_eq!(*seen.lock(), vec![("boom".to_string(), 1)]);
    }

    #[test]
    fn test_invalid_config_values_are_clamped() {
        let logger = Logger::builder()
            .sink(MemorySink::new())
            .queue_capacity(0)
            .batch_size(0)
            .retry_policy(RetryPolicy {
                base_delay: Duration::from_secs(1),
                max_delay: Duration::from_millis(1),
                ..RetryPolicy::default()
            })
            .build();
        assert!(logger.is_shipping());
        logger.info("still works");
        assert!(logger.flush(Duration::from_secs(2)));
        assert_eq!(logger.metrics().delivered(), 1);
    }

    #[test]
    fn test_from_config_disabled() {
        let config = LoggerConfig {
            app_name: "svc".into(),
            log_level: "nonsense".into(),
            ..LoggerConfig::default()
        };
        let logger = Logger::from_config(&config);
        assert!(!logger.is_shipping());
        assert_eq!(logger.min_level(), LogLevel::Info);
    }

    #[cfg(feature = "elasticsearch")]
    #[test]
    fn test_from_config_bad_host_disables_shipping() {
        let config = LoggerConfig {
            enable_log: true,
            host: "::not a url::".into(),
            ..LoggerConfig::default()
        };
        let logger = Logger::from_config(&config);
        assert!(!logger.is_shipping());
        logger.error("kept local");
    }
}
