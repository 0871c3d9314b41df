//! # Rust Log Shipper
//!
//! A structured-logging facade that normalizes log records, enriches them
//! with service and tenant metadata, and ships them to a search backend
//! through an asynchronous, backpressure-aware pipeline.
//!
//! ## Features
//!
//! - **Non-blocking**: call sites only touch a bounded in-memory queue
//! - **Explicit backpressure**: drop-oldest or reject when the queue is full
//! - **Reliable delivery**: batching, retries with backoff, and a local
//!   fallback sink for anything that cannot be delivered
//! - **Observable**: every outcome is counted in [`PipelineMetrics`]
//!
//! ## Example
//!
//! ```
//! use rust_log_shipper::prelude::*;
//! use rust_log_shipper::sinks::MemorySink;
//! use std::time::Duration;
//!
//! let sink = MemorySink::new();
//! let logger = Logger::builder()
//!     .app_name("orders")
//!     .environment("production")
//!     .sink(sink.clone())
//!     .build();
//!
//! logger
//!     .with_field("request_id", "r-42")
//!     .info("order placed");
//!
//! assert!(logger.flush(Duration::from_secs(2)));
//! assert_eq!(sink.delivered_count(), 1);
//! ```

pub mod core;
pub mod global;
pub mod macros;
pub mod sinks;

pub mod prelude {
    pub use crate::core::{
        EcsEncoder, EnqueueOutcome, FallbackSink, FieldValue, Fields, FlatJsonEncoder, LogLevel,
        Logger, LoggerBuilder, LoggerConfig, OverflowCallback, OverflowPolicy, PipelineMetrics,
        RemainderPolicy, Result, RetryPolicy, ShipperError, SinkClient, TenantContext,
        TracingContext, DEFAULT_SHUTDOWN_TIMEOUT,
    };
    pub use crate::sinks::{ConsoleFallback, FileFallback};
}

pub use crate::core::{
    DispatchQueue, DropFields, EcsEncoder, EncodedRecord, Encoder, EnqueueOutcome, FallbackSink,
    FatalHandler, FieldValue, Fields, FlatJsonEncoder, ItemResult, LogEntry, LogLevel, Logger,
    LoggerBuilder, LoggerConfig, NormalizedRecord, Normalizer, OverflowCallback, OverflowPolicy,
    PipelineMetrics, QueueConfig, RedactFields, RemainderPolicy, RenameField, Result, RetryPolicy,
    ShipperConfig, ShipperError, SinkClient, TenantContext, TimestampFormat, TracingContext,
    Transform, DEFAULT_SHUTDOWN_TIMEOUT,
};
pub use crate::sinks::{ConsoleFallback, FileFallback, MemoryFallback, MemorySink};
