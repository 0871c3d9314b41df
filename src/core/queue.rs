//! Bounded dispatch queue between log call sites and the batch shipper
//!
//! Producers call [`DispatchQueue::enqueue`], which only takes a short lock and
//! never waits for the consumer. The shipper calls
//! [`DispatchQueue::drain_batch`], which may block up to a caller-given bound.
//!
//! Records handed out by `drain_batch` are tracked as in-flight until the
//! shipper reports them finished with [`DispatchQueue::complete`]; this is
//! what lets [`DispatchQueue::wait_idle`] answer "is everything delivered?".

use super::error::{Result, ShipperError};
use super::metrics::PipelineMetrics;
use super::overflow_policy::{OverflowCallback, OverflowPolicy};
use super::record::NormalizedRecord;
use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Default queue capacity
pub const DEFAULT_QUEUE_CAPACITY: usize = 10_000;

/// Result of offering a record to the queue
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnqueueOutcome {
    /// The record was admitted (or discarded because shipping is disabled)
    Accepted,
    /// The record was admitted and the oldest buffered record was evicted
    DroppedOldest,
    /// The record was refused
    Rejected,
}

#[derive(Debug, Clone)]
pub struct QueueConfig {
    /// Maximum number of buffered records
    pub capacity: usize,
    pub overflow_policy: OverflowPolicy,
    /// When false, `enqueue` discards everything and reports `Accepted`
    pub enabled: bool,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_QUEUE_CAPACITY,
            overflow_policy: OverflowPolicy::default(),
            enabled: true,
        }
    }
}

impl QueueConfig {
    pub fn validate(&self) -> Result<()> {
        if self.capacity == 0 {
            return Err(ShipperError::config("QueueConfig", "capacity must be at least 1"));
        }
        Ok(())
    }
}

struct QueueState {
    items: VecDeque<NormalizedRecord>,
    in_flight: usize,
    closed: bool,
    generation: u64,
}

impl QueueState {
    fn is_idle(&self) -> bool {
        self.items.is_empty() && self.in_flight == 0
    }
}

pub struct DispatchQueue {
    state: Mutex<QueueState>,
    not_empty: Condvar,
    idle: Condvar,
    capacity: usize,
    policy: OverflowPolicy,
    enabled: bool,
    metrics: Arc<PipelineMetrics>,
    on_overflow: Option<OverflowCallback>,
}

impl DispatchQueue {
    pub fn new(config: QueueConfig) -> Self {
        Self::with_metrics(config, Arc::new(PipelineMetrics::new()), None)
    }

    /// Create a queue sharing a metrics instance with the rest of the pipeline.
    ///
    /// A zero capacity is raised to 1.
    pub fn with_metrics(
        config: QueueConfig,
        metrics: Arc<PipelineMetrics>,
        on_overflow: Option<OverflowCallback>,
    ) -> Self {
        let capacity = config.capacity.max(1);
        Self {
            state: Mutex::new(QueueState {
                items: VecDeque::with_capacity(capacity.min(DEFAULT_QUEUE_CAPACITY)),
                in_flight: 0,
                closed: false,
                generation: 0,
            }),
            not_empty: Condvar::new(),
            idle: Condvar::new(),
            capacity,
            policy: config.overflow_policy,
            enabled: config.enabled,
            metrics,
            on_overflow,
        }
    }

    /// Offer a record. Never blocks beyond the internal lock.
    pub fn enqueue(&self, record: NormalizedRecord) -> EnqueueOutcome {
        if !self.enabled {
            self.metrics.record_discarded_disabled();
            return EnqueueOutcome::Accepted;
        }

        let outcome = {
            let mut state = self.state.lock();
            if state.closed {
                EnqueueOutcome::Rejected
            } else if state.items.len() < self.capacity {
                state.items.push_back(record);
                EnqueueOutcome::Accepted
            } else {
                match self.policy {
                    OverflowPolicy::DropOldest => {
                        state.items.pop_front();
                        state.items.push_back(record);
                        EnqueueOutcome::DroppedOldest
                    }
                    OverflowPolicy::Reject => EnqueueOutcome::Rejected,
                }
            }
        };

        match outcome {
            EnqueueOutcome::Accepted => {
                self.metrics.record_enqueued();
                self.not_empty.notify_one();
            }
            EnqueueOutcome::DroppedOldest => {
                self.metrics.record_enqueued();
                let previous = self.metrics.record_evicted();
                self.not_empty.notify_one();
                self.alert_overflow(previous);
            }
            EnqueueOutcome::Rejected => {
                let previous = self.metrics.record_rejected();
                if !self.is_closed() {
                    self.alert_overflow(previous);
                }
            }
        }
        outcome
    }

    /// Alert on first overflow and periodically thereafter
    fn alert_overflow(&self, previous: u64) {
        let count = previous + 1;
        if previous == 0 || count % 1000 == 0 {
            eprintln!(
                "[SHIPPER WARNING] Dispatch queue full ({} records, policy {}), {} overflow events so far",
                self.capacity, self.policy, count
            );
            if let Some(ref callback) = self.on_overflow {
                callback(count);
            }
        }
    }

    /// Take up to `max_count` records in FIFO order.
    ///
    /// If the queue is empty, waits up to `max_wait` for a record to arrive,
    /// then returns whatever is available (possibly nothing). Returns early
    /// when the queue is closed or [`interrupt`](Self::interrupt) is called.
    pub fn drain_batch(&self, max_count: usize, max_wait: Duration) -> Vec<NormalizedRecord> {
        if max_count == 0 {
            return Vec::new();
        }

        let deadline = Instant::now() + max_wait;
        let mut state = self.state.lock();
        let generation = state.generation;
        while state.items.is_empty() && !state.closed && state.generation == generation {
            if self.not_empty.wait_until(&mut state, deadline).timed_out() {
                break;
            }
        }

        let count = max_count.min(state.items.len());
        let batch: Vec<_> = state.items.drain(..count).collect();
        state.in_flight += batch.len();
        batch
    }

    /// Mark `count` previously drained records as finished (delivered,
    /// written to the fallback sink, or dropped).
    pub fn complete(&self, count: usize) {
        let mut state = self.state.lock();
        state.in_flight = state.in_flight.saturating_sub(count);
        if state.is_idle() {
            self.idle.notify_all();
        }
    }

    /// Wait until the queue is empty and nothing is in flight.
    ///
    /// Returns `true` if that state was reached within `timeout`.
    pub fn wait_idle(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut state = self.state.lock();
        while !state.is_idle() {
            if self.idle.wait_until(&mut state, deadline).timed_out() {
                return state.is_idle();
            }
        }
        true
    }

    /// Wake any consumer blocked in `drain_batch`
    pub fn interrupt(&self) {
        self.state.lock().generation += 1;
        self.not_empty.notify_all();
    }

    /// Stop admitting records; buffered records can still be drained.
    pub fn close(&self) {
        self.state.lock().closed = true;
        self.not_empty.notify_all();
    }

    /// Remove every buffered record without marking it in flight.
    pub fn clear(&self) -> Vec<NormalizedRecord> {
        let mut state = self.state.lock();
        let remaining: Vec<_> = state.items.drain(..).collect();
        if state.is_idle() {
            self.idle.notify_all();
        }
        remaining
    }

    /// Close the queue and forget everything buffered or in flight.
    ///
    /// Used when no consumer is left. Returns how many records were dropped.
    pub fn abandon(&self) -> usize {
        let mut state = self.state.lock();
        state.closed = true;
        let dropped = state.items.len() + state.in_flight;
        state.items.clear();
        state.in_flight = 0;
        self.not_empty.notify_all();
        self.idle.notify_all();
        dropped
    }

    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }

    pub fn len(&self) -> usize {
        self.state.lock().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.lock().items.is_empty()
    }

    pub fn in_flight(&self) -> usize {
        self.state.lock().in_flight
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn policy(&self) -> OverflowPolicy {
        self.policy
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Number of records evicted under the drop-oldest policy
    pub fn evicted_count(&self) -> u64 {
        self.metrics.evicted()
    }

    pub fn metrics(&self) -> &Arc<PipelineMetrics> {
        &self.metrics
    }
}

impl fmt::Debug for DispatchQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("DispatchQueue")
            .field("len", &state.items.len())
            .field("in_flight", &state.in_flight)
            .field("closed", &state.closed)
            .field("capacity", &self.capacity)
            .field("policy", &self.policy)
            .field("enabled", &self.enabled)
            .finish()
    }
}
