//! In-memory sink and fallback for tests and local development
//!
//! Both types are cheap to clone; clones share state, so a test keeps one
//! handle while the pipeline owns the other.

use crate::core::{
    EncodedRecord, FallbackSink, ItemResult, LogLevel, Result, ShipperError, SinkClient,
};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::io;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// Scripted response of a [`MemorySink`] to one `submit_batch` call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SinkOutcome {
    /// Every record accepted
    AllOk,
    /// Every record failed transiently
    AllTransient,
    /// Every record rejected permanently
    AllPermanent,
    /// The whole call fails (backend unreachable)
    Unavailable,
    /// Explicit per-record results; a short list leaves the tail unanswered
    Items(Vec<ItemResult>),
}

/// One recorded `submit_batch` call
#[derive(Debug, Clone)]
pub struct Submission {
    pub payloads: Vec<String>,
    pub at: Instant,
}

impl Submission {
    pub fn len(&self) -> usize {
        self.payloads.len()
    }

    pub fn is_empty(&self) -> bool {
        self.payloads.is_empty()
    }
}

#[derive(Debug)]
struct MemorySinkState {
    script: VecDeque<SinkOutcome>,
    default_outcome: SinkOutcome,
    latency: Duration,
    submissions: Vec<Submission>,
    delivered: Vec<String>,
}

/// Sink that records every submission and answers from a script
///
/// # Example
///
/// ```
/// use rust_log_shipper::sinks::{MemorySink, SinkOutcome};
///
/// let sink = MemorySink::new();
/// sink.push_outcome(SinkOutcome::Unavailable);
/// // First call fails, later calls succeed.
/// assert_eq!(sink.submission_count(), 0);
/// ```
#[derive(Debug, Clone)]
pub struct MemorySink {
    state: Arc<Mutex<MemorySinkState>>,
}

impl MemorySink {
    /// A sink that accepts everything
    pub fn new() -> Self {
        Self::with_default(SinkOutcome::AllOk)
    }

    /// A sink that is never reachable
    pub fn failing() -> Self {
        Self::with_default(SinkOutcome::Unavailable)
    }

    /// A sink answering `outcome` once its script is exhausted
    pub fn with_default(outcome: SinkOutcome) -> Self {
        Self {
            state: Arc::new(Mutex::new(MemorySinkState {
                script: VecDeque::new(),
                default_outcome: outcome,
                latency: Duration::ZERO,
                submissions: Vec::new(),
                delivered: Vec::new(),
            })),
        }
    }

    /// Sleep this long inside every `submit_batch`
    #[must_use]
    pub fn with_latency(self, latency: Duration) -> Self {
        self.state.lock().latency = latency;
        self
    }

    /// Queue an outcome for the next unanswered call
    pub fn push_outcome(&self, outcome: SinkOutcome) {
        self.state.lock().script.push_back(outcome);
    }

    pub fn submissions(&self) -> Vec<Submission> {
        self.state.lock().submissions.clone()
    }

    pub fn submission_count(&self) -> usize {
        self.state.lock().submissions.len()
    }

    /// Payloads the sink acknowledged, in acknowledgement order
    pub fn delivered(&self) -> Vec<String> {
        self.state.lock().delivered.clone()
    }

    pub fn delivered_count(&self) -> usize {
        self.state.lock().delivered.len()
    }
}

impl Default for MemorySink {
    fn default() -> Self {
        Self::new()
    }
}

impl SinkClient for MemorySink {
    fn submit_batch(&mut self, batch: &[EncodedRecord]) -> Result<Vec<ItemResult>> {
        let latency = self.state.lock().latency;
        if !latency.is_zero() {
            thread::sleep(latency);
        }

        let mut state = self.state.lock();
        let payloads: Vec<String> = batch.iter().map(|r| r.payload().to_string()).collect();
        state.submissions.push(Submission {
            payloads: payloads.clone(),
            at: Instant::now(),
        });

        let outcome = match state.script.pop_front() {
            Some(outcome) => outcome,
            None => state.default_outcome.clone(),
        };
        let results = match outcome {
            SinkOutcome::Unavailable => {
                return Err(ShipperError::sink_unavailable("memory sink scripted outage"));
            }
            SinkOutcome::AllOk => vec![ItemResult::Ok; batch.len()],
            SinkOutcome::AllTransient => vec![ItemResult::transient("scripted"); batch.len()],
            SinkOutcome::AllPermanent => vec![ItemResult::permanent("scripted"); batch.len()],
            SinkOutcome::Items(items) => items,
        };

        for (payload, result) in payloads.into_iter().zip(&results) {
            if result.is_ok() {
                state.delivered.push(payload);
            }
        }
        Ok(results)
    }

    fn name(&self) -> &str {
        "memory"
    }
}

/// Fallback capturing every line with its level
#[derive(Debug, Clone, Default)]
pub struct MemoryFallback {
    lines: Arc<Mutex<Vec<(LogLevel, String)>>>,
}

impl MemoryFallback {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().iter().map(|(_, l)| l.clone()).collect()
    }

    pub fn entries(&self) -> Vec<(LogLevel, String)> {
        self.lines.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.lines.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.lock().is_empty()
    }

    pub fn clear(&self) {
        self.lines.lock().clear();
    }
}

impl FallbackSink for MemoryFallback {
    fn write_line(&self, level: LogLevel, line: &str) -> io::Result<()> {
        self.lines.lock().push((level, line.to_string()));
        Ok(())
    }

    fn name(&self) -> &str {
        "memory"
    }
}
