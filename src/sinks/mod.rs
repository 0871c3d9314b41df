//! Sink client and fallback implementations

pub mod console;
pub mod file;
pub mod memory;

#[cfg(feature = "elasticsearch")]
pub mod elasticsearch;

pub use console::{ConsoleFallback, ConsoleTarget};
pub use file::FileFallback;
pub use memory::{MemoryFallback, MemorySink, SinkOutcome, Submission};

#[cfg(feature = "elasticsearch")]
pub use elasticsearch::{ElasticsearchConfig, ElasticsearchSink, DEFAULT_INDEX};

pub use crate::core::{FallbackSink, SinkClient};
