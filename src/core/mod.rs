//! Core pipeline types and traits

pub mod config;
pub mod encoder;
pub mod error;
pub mod fallback;
pub mod fields;
pub mod log_entry;
pub mod log_level;
pub mod logger;
pub mod metrics;
pub mod normalizer;
pub mod overflow_policy;
pub mod pipeline;
pub mod queue;
pub mod record;
pub mod retry;
pub mod shipper;
pub mod sink;
pub mod tenant;
pub mod timestamp;

pub use config::LoggerConfig;
pub use encoder::{EcsEncoder, EncodedRecord, Encoder, FlatJsonEncoder, DEGRADED_TAG, ECS_VERSION};
pub use error::{Result, ShipperError};
pub use fallback::FallbackSink;
pub use fields::{FieldEncodeError, FieldValue, Fields};
pub use log_entry::{LogEntry, TracingContext};
pub use log_level::LogLevel;
pub use logger::{
    FatalHandler, Logger, LoggerBuilder, DEFAULT_FATAL_FLUSH_TIMEOUT, DEFAULT_SHUTDOWN_TIMEOUT,
};
pub use metrics::PipelineMetrics;
pub use normalizer::{DropFields, Normalizer, RedactFields, RenameField, Transform};
pub use overflow_policy::{OverflowCallback, OverflowPolicy};
pub use pipeline::{Pipeline, PipelineParts};
pub use queue::{DispatchQueue, EnqueueOutcome, QueueConfig, DEFAULT_QUEUE_CAPACITY};
pub use record::{NormalizedRecord, INTERNAL_LEVEL_KEY, SEVERITY_KEY};
pub use retry::{Backoff, RetryPolicy};
pub use shipper::{RemainderPolicy, ShipperConfig};
pub use sink::{ItemResult, SinkClient};
pub use tenant::{TenantContext, TRACE_NAME_FIELD};
pub use timestamp::TimestampFormat;
