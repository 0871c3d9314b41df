//! Batch shipper: the background worker draining the dispatch queue
//!
//! A batch is shipped when it reaches `batch_size` records or when `linger`
//! has elapsed since its first record was drained, whichever comes first.
//! Failed records are retried with exponential backoff; records that exhaust
//! their retries, or that the sink rejects permanently, go to the fallback
//! sink. While the shipper backs off it does not drain, and the queue keeps
//! admitting (or evicting) on its own.

use super::encoder::{minimal_document, EncodedRecord, Encoder};
use super::error::{Result, ShipperError};
use super::fallback::FallbackSink;
use super::metrics::PipelineMetrics;
use super::queue::DispatchQueue;
use super::record::NormalizedRecord;
use super::retry::RetryPolicy;
use super::sink::{ItemResult, SinkClient};
use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender, TryRecvError};
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// What happens to records still undelivered when the shutdown grace ends
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RemainderPolicy {
    /// Write them to the fallback sink
    #[default]
    Fallback,
    /// Drop them and count them as lost
    Drop,
}

#[derive(Debug, Clone)]
pub struct ShipperConfig {
    /// Maximum records per batch
    pub batch_size: usize,
    /// Maximum time a partial batch waits for more records
    pub linger: Duration,
    pub retry: RetryPolicy,
    /// How long an idle drain waits before re-checking control messages
    pub idle_poll: Duration,
    /// Time allowed for the final drain-and-deliver on shutdown
    pub shutdown_grace: Duration,
    pub remainder: RemainderPolicy,
}

impl Default for ShipperConfig {
    fn default() -> Self {
        Self {
            batch_size: 100,
            linger: Duration::from_millis(200),
            retry: RetryPolicy::default(),
            idle_poll: Duration::from_millis(100),
            shutdown_grace: Duration::from_secs(5),
            remainder: RemainderPolicy::default(),
        }
    }
}

impl ShipperConfig {
    pub fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            return Err(ShipperError::config("ShipperConfig", "batch_size must be at least 1"));
        }
        if self.idle_poll.is_zero() {
            return Err(ShipperError::config("ShipperConfig", "idle_poll must be positive"));
        }
        self.retry.validate()
    }
}

#[derive(Debug, Clone, Copy)]
pub(crate) enum Control {
    /// Stop draining new cycles; finish what is buffered before `deadline`
    Shutdown { deadline: Instant },
    /// Give up immediately
    Abort,
}

/// How the shipper thread ended, as seen by [`ShipperHandle::wait`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ShipperExit {
    /// The loop returned after a shutdown or abort
    Clean,
    /// The thread panicked; its records were counted as lost
    Panicked,
    /// Still running when the wait timed out
    TimedOut,
}

/// Handle held by the pipeline to steer a running shipper
pub(crate) struct ShipperHandle {
    control: Sender<Control>,
    done: Receiver<bool>,
    // Dropping the handle detaches the thread.
    _thread: thread::JoinHandle<()>,
}

impl ShipperHandle {
    pub(crate) fn send(&self, control: Control) {
        let _ = self.control.send(control);
    }

    /// Wait up to `timeout` for the shipper thread to exit.
    pub(crate) fn wait(&self, timeout: Duration) -> ShipperExit {
        match self.done.recv_timeout(timeout) {
            Ok(true) => ShipperExit::Clean,
            // No completion message means the thread died on its way out.
            Ok(false) | Err(RecvTimeoutError::Disconnected) => ShipperExit::Panicked,
            Err(RecvTimeoutError::Timeout) => ShipperExit::TimedOut,
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("unknown panic")
}

pub(crate) struct BatchShipper {
    queue: Arc<DispatchQueue>,
    sink: Box<dyn SinkClient>,
    encoder: Arc<dyn Encoder>,
    fallback: Arc<dyn FallbackSink>,
    metrics: Arc<PipelineMetrics>,
    config: ShipperConfig,
    flush_requests: Arc<AtomicUsize>,
    control: Receiver<Control>,
    shutdown_deadline: Option<Instant>,
    aborted: bool,
}

impl BatchShipper {
    /// Spawn the shipper on a dedicated thread.
    ///
    /// `flush_requests` is non-zero while some caller waits in a flush; the
    /// shipper then stops lingering and ships partial batches immediately.
    pub(crate) fn spawn(
        queue: Arc<DispatchQueue>,
        sink: Box<dyn SinkClient>,
        encoder: Arc<dyn Encoder>,
        fallback: Arc<dyn FallbackSink>,
        config: ShipperConfig,
        flush_requests: Arc<AtomicUsize>,
    ) -> Result<ShipperHandle> {
        let (control_tx, control_rx) = unbounded();
        let (done_tx, done_rx) = crossbeam_channel::bounded(1);
        let metrics = Arc::clone(queue.metrics());

        let shipper = BatchShipper {
            queue,
            sink,
            encoder,
            fallback,
            metrics,
            config,
            flush_requests,
            control: control_rx,
            shutdown_deadline: None,
            aborted: false,
        };

        let thread = thread::Builder::new()
            .name("log-shipper".into())
            .spawn(move || {
                let queue = Arc::clone(&shipper.queue);
                let metrics = Arc::clone(&shipper.metrics);
                let clean = match panic::catch_unwind(AssertUnwindSafe(|| shipper.run())) {
                    Ok(()) => true,
                    Err(payload) => {
                        // Nothing drains the queue any more; account for what it held.
                        let dropped = queue.abandon();
                        metrics.record_lost(dropped as u64);
                        eprintln!(
                            "[SHIPPER ERROR] Shipper thread panicked ({}); {} records lost, shipping stopped",
                            panic_message(payload.as_ref()),
                            dropped
                        );
                        false
                    }
                };
                let _ = done_tx.send(clean);
            })
            .map_err(|e| ShipperError::io_operation("spawning shipper thread", "spawn failed", e))?;

        Ok(ShipperHandle {
            control: control_tx,
            done: done_rx,
            _thread: thread,
        })
    }

    fn run(mut self) {
        loop {
            self.poll_control();
            if self.aborted {
                return;
            }
            if self.shutdown_deadline.is_some() {
                self.final_flush();
                return;
            }

            let mut batch = self
                .queue
                .drain_batch(self.config.batch_size, self.config.idle_poll);
            if batch.is_empty() {
                if self.queue.is_closed() {
                    // Closed but no shutdown message yet: wait for it instead of spinning.
                    self.pause(self.config.idle_poll);
                }
                continue;
            }

            self.linger(&mut batch);
            self.deliver(batch);
        }
    }

    fn apply(&mut self, control: Control) {
        match control {
            Control::Shutdown { deadline } => {
                self.shutdown_deadline.get_or_insert(deadline);
            }
            Control::Abort => self.aborted = true,
        }
    }

    fn poll_control(&mut self) {
        loop {
            match self.control.try_recv() {
                Ok(control) => self.apply(control),
                Err(TryRecvError::Empty) => return,
                Err(TryRecvError::Disconnected) => {
                    // Pipeline handle is gone; behave as a shutdown.
                    let grace = self.config.shutdown_grace;
                    self.shutdown_deadline.get_or_insert_with(|| Instant::now() + grace);
                    return;
                }
            }
        }
    }

    /// Sleep for `delay`, waking early for control messages.
    ///
    /// Returns `false` if the pause cannot complete: the pipeline was aborted
    /// or the pause would overrun the shutdown deadline.
    fn pause(&mut self, delay: Duration) -> bool {
        let until = Instant::now() + delay;
        loop {
            if self.aborted {
                return false;
            }
            if let Some(deadline) = self.shutdown_deadline {
                if until > deadline {
                    return false;
                }
            }
            let now = Instant::now();
            if now >= until {
                return true;
            }
            match self.control.recv_timeout(until - now) {
                Ok(control) => self.apply(control),
                Err(RecvTimeoutError::Timeout) => return true,
                Err(RecvTimeoutError::Disconnected) => {
                    thread::sleep(until.saturating_duration_since(Instant::now()));
                    return true;
                }
            }
        }
    }

    /// Keep filling a partial batch until it is full or the linger expires.
    fn linger(&mut self, batch: &mut Vec<NormalizedRecord>) {
        let deadline = Instant::now() + self.config.linger;
        while batch.len() < self.config.batch_size
            && self.flush_requests.load(Ordering::Acquire) == 0
            && !self.queue.is_closed()
        {
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            // Wait in slices so a flush request raised mid-wait is seen promptly.
            let wait = (deadline - now).min(self.config.idle_poll);
            let more = self
                .queue
                .drain_batch(self.config.batch_size - batch.len(), wait);
            batch.extend(more);
        }
    }

    fn encode(&self, batch: &[NormalizedRecord]) -> Vec<EncodedRecord> {
        batch
            .iter()
            .map(|record| {
                let encoded = panic::catch_unwind(AssertUnwindSafe(|| self.encoder.encode(record)))
                    .unwrap_or_else(|payload| {
                        let reason = format!(
                            "encoder '{}' panicked: {}",
                            self.encoder.name(),
                            panic_message(payload.as_ref())
                        );
                        minimal_document(record, &reason)
                    });
                if encoded.is_degraded() {
                    self.metrics.record_degraded();
                }
                encoded
            })
            .collect()
    }

    /// Deliver one batch with retries, then release it from the in-flight count.
    fn deliver(&mut self, batch: Vec<NormalizedRecord>) {
        let count = batch.len();
        let mut pending = self.encode(&batch);
        drop(batch);

        let mut backoff = self.config.retry.backoff();
        let mut retries = 0;
        loop {
            if self.aborted {
                break;
            }

            self.metrics.record_batch_submitted();
            let submitted = panic::catch_unwind(AssertUnwindSafe(|| self.sink.submit_batch(&pending)))
                .unwrap_or_else(|payload| {
                    Err(ShipperError::sink_unavailable(format!(
                        "sink panicked: {}",
                        panic_message(payload.as_ref())
                    )))
                });
            let failed = match submitted {
                Ok(results) => self.settle(pending, results),
                Err(e) => {
                    let previous = self.metrics.record_sink_unavailable();
                    if previous % 100 == 0 {
                        eprintln!(
                            "[SHIPPER WARNING] Sink '{}' unavailable ({} records pending): {}",
                            self.sink.name(),
                            pending.len(),
                            e
                        );
                    }
                    pending
                }
            };

            if failed.is_empty() {
                break;
            }
            if retries >= self.config.retry.max_retries {
                self.to_fallback(failed, "retries exhausted");
                break;
            }
            if !self.pause(backoff.next_delay()) {
                if !self.aborted {
                    self.handle_remainder(failed);
                }
                break;
            }

            retries += 1;
            self.metrics.record_retried(failed.len() as u64);
            pending = failed;
        }

        self.queue.complete(count);
    }

    /// Split a batch by per-item result; returns the records worth retrying.
    fn settle(&self, batch: Vec<EncodedRecord>, results: Vec<ItemResult>) -> Vec<EncodedRecord> {
        let mut delivered = 0u64;
        let mut retry = Vec::new();
        let mut rejected = Vec::new();
        let mut results = results.into_iter();

        for record in batch {
            match results.next() {
                Some(ItemResult::Ok) => delivered += 1,
                Some(ItemResult::Failed { retryable: true, .. }) => retry.push(record),
                Some(ItemResult::Failed {
                    retryable: false,
                    reason,
                }) => rejected.push((record, reason)),
                // The sink said nothing about this record; assume it did not land.
                None => retry.push(record),
            }
        }

        self.metrics.record_delivered(delivered);
        if !rejected.is_empty() {
            self.metrics.record_failed_permanent(rejected.len() as u64);
            let reason = format!("rejected by sink: {}", rejected[0].1);
            self.to_fallback(rejected.into_iter().map(|(r, _)| r).collect(), &reason);
        }
        retry
    }

    fn to_fallback(&self, records: Vec<EncodedRecord>, reason: &str) {
        if records.is_empty() {
            return;
        }

        let mut written = 0u64;
        for record in &records {
            match self.fallback.write_line(record.level(), record.payload()) {
                Ok(()) => written += 1,
                Err(e) => {
                    eprintln!(
                        "[SHIPPER ERROR] Fallback sink '{}' failed: {}",
                        self.fallback.name(),
                        e
                    );
                }
            }
        }
        if let Err(e) = self.fallback.flush() {
            eprintln!("[SHIPPER ERROR] Fallback sink '{}' flush failed: {}", self.fallback.name(), e);
        }

        self.metrics.record_fallback_written(written);
        let failed = records.len() as u64 - written;
        if failed > 0 {
            self.metrics.record_lost(failed);
        }
        eprintln!(
            "[SHIPPER ERROR] {} records routed to fallback sink '{}': {}",
            records.len(),
            self.fallback.name(),
            reason
        );
    }

    fn handle_remainder(&self, records: Vec<EncodedRecord>) {
        match self.config.remainder {
            RemainderPolicy::Fallback => self.to_fallback(records, "shutdown grace period elapsed"),
            RemainderPolicy::Drop => {
                self.metrics.record_lost(records.len() as u64);
                eprintln!(
                    "[SHIPPER WARNING] Dropped {} undelivered records at shutdown",
                    records.len()
                );
            }
        }
    }

    /// Drain and deliver everything buffered, bounded by the shutdown deadline.
    fn final_flush(&mut self) {
        let deadline = self.shutdown_deadline.unwrap_or_else(Instant::now);
        loop {
            if self.aborted {
                return;
            }
            if Instant::now() >= deadline {
                let remaining = self.queue.clear();
                if !remaining.is_empty() {
                    let encoded = self.encode(&remaining);
                    self.handle_remainder(encoded);
                }
                return;
            }

            let batch = self.queue.drain_batch(self.config.batch_size, Duration::ZERO);
            if batch.is_empty() {
                return;
            }
            self.deliver(batch);
        }
    }
}
