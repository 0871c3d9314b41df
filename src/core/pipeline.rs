//! Queue plus shipper thread, with flush and shutdown lifecycle

use super::encoder::Encoder;
use super::fallback::FallbackSink;
use super::metrics::PipelineMetrics;
use super::overflow_policy::OverflowCallback;
use super::queue::{DispatchQueue, EnqueueOutcome, QueueConfig};
use super::record::NormalizedRecord;
use super::shipper::{BatchShipper, Control, ShipperConfig, ShipperExit, ShipperHandle};
use super::sink::SinkClient;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Default shutdown timeout used when a pipeline is dropped without an
/// explicit [`Pipeline::shutdown`] (5 seconds)
pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// Everything needed to start a shipping pipeline
pub struct PipelineParts {
    pub queue: QueueConfig,
    pub shipper: ShipperConfig,
    /// `None` runs the pipeline with shipping disabled
    pub sink: Option<Box<dyn SinkClient>>,
    pub encoder: Arc<dyn Encoder>,
    pub fallback: Arc<dyn FallbackSink>,
    pub on_overflow: Option<OverflowCallback>,
}

pub struct Pipeline {
    queue: Arc<DispatchQueue>,
    metrics: Arc<PipelineMetrics>,
    shipper: Mutex<Option<ShipperHandle>>,
    flush_requests: Arc<AtomicUsize>,
    shutdown_grace: Duration,
    /// Outcome of the first shutdown, reported again by later calls
    clean_stop: AtomicBool,
}

impl Pipeline {
    /// Start the pipeline and its shipper thread.
    ///
    /// Without a sink, or if the shipper thread cannot be spawned, the
    /// pipeline runs disabled: every enqueue is accepted and discarded.
    pub fn start(parts: PipelineParts) -> Self {
        let metrics = Arc::new(PipelineMetrics::new());
        let flush_requests = Arc::new(AtomicUsize::new(0));
        let shutdown_grace = parts.shipper.shutdown_grace;

        let disabled = |metrics: Arc<PipelineMetrics>, on_overflow| {
            let config = QueueConfig {
                enabled: false,
                ..parts.queue.clone()
            };
            Arc::new(DispatchQueue::with_metrics(config, metrics, on_overflow))
        };

        let Some(sink) = parts.sink.filter(|_| parts.queue.enabled) else {
            return Self {
                queue: disabled(metrics.clone(), parts.on_overflow),
                metrics,
                shipper: Mutex::new(None),
                flush_requests,
                shutdown_grace,
                clean_stop: AtomicBool::new(true),
            };
        };

        let queue = Arc::new(DispatchQueue::with_metrics(
            parts.queue.clone(),
            Arc::clone(&metrics),
            parts.on_overflow.clone(),
        ));
        match BatchShipper::spawn(
            Arc::clone(&queue),
            sink,
            parts.encoder,
            parts.fallback,
            parts.shipper,
            Arc::clone(&flush_requests),
        ) {
            Ok(handle) => Self {
                queue,
                metrics,
                shipper: Mutex::new(Some(handle)),
                flush_requests,
                shutdown_grace,
                clean_stop: AtomicBool::new(true),
            },
            Err(e) => {
                eprintln!("[SHIPPER WARNING] {}; shipping disabled", e);
                Self {
                    queue: disabled(metrics.clone(), parts.on_overflow),
                    metrics,
                    shipper: Mutex::new(None),
                    flush_requests,
                    shutdown_grace,
                    clean_stop: AtomicBool::new(true),
                }
            }
        }
    }

    /// A pipeline that accepts and discards everything
    pub fn disabled() -> Self {
        let metrics = Arc::new(PipelineMetrics::new());
        let config = QueueConfig {
            enabled: false,
            ..QueueConfig::default()
        };
        Self {
            queue: Arc::new(DispatchQueue::with_metrics(config, Arc::clone(&metrics), None)),
            metrics,
            shipper: Mutex::new(None),
            flush_requests: Arc::new(AtomicUsize::new(0)),
            shutdown_grace: Duration::ZERO,
            clean_stop: AtomicBool::new(true),
        }
    }

    pub fn enqueue(&self, record: NormalizedRecord) -> EnqueueOutcome {
        self.queue.enqueue(record)
    }

    /// Wait until every accepted record has been delivered or given up on.
    ///
    /// Partial batches are shipped without waiting for their linger.
    /// Returns `true` iff the queue is empty and no batch is in flight.
    pub fn flush(&self, timeout: Duration) -> bool {
        if !self.queue.is_enabled() {
            return true;
        }

        self.flush_requests.fetch_add(1, Ordering::AcqRel);
        self.queue.interrupt();
        let idle = self.queue.wait_idle(timeout);
        self.flush_requests.fetch_sub(1, Ordering::AcqRel);
        idle
    }

    /// Stop accepting records, deliver what is buffered, and stop the shipper.
    ///
    /// The final drain gets `min(shutdown_grace, timeout)`; if the shipper
    /// has not finished by `timeout`, in-flight delivery is abandoned and the
    /// abandoned records are counted as lost. Returns `true` on a clean stop,
    /// `false` after a timeout or if the shipper thread had died.
    ///
    /// Later calls wait for the first one and return its outcome.
    pub fn shutdown(&self, timeout: Duration) -> bool {
        self.queue.close();

        // Held for the whole stop so concurrent callers see the final outcome.
        let mut shipper = self.shipper.lock();
        let Some(handle) = shipper.take() else {
            return self.clean_stop.load(Ordering::Acquire);
        };

        let clean = self.stop(handle, timeout);
        self.clean_stop.store(clean, Ordering::Release);
        clean
    }

    fn stop(&self, handle: ShipperHandle, timeout: Duration) -> bool {
        handle.send(Control::Shutdown {
            deadline: Instant::now() + self.shutdown_grace.min(timeout),
        });

        match handle.wait(timeout) {
            ShipperExit::Clean => true,
            // The shipper thread already counted what it dropped.
            ShipperExit::Panicked => false,
            ShipperExit::TimedOut => {
                handle.send(Control::Abort);
                let abandoned = self.queue.len() + self.queue.in_flight();
                self.queue.clear();
                if abandoned > 0 {
                    self.metrics.record_lost(abandoned as u64);
                }
                eprintln!(
                    "[SHIPPER WARNING] Shipper did not finish within {:?}; {} records abandoned",
                    timeout, abandoned
                );
                false
            }
        }
    }

    pub fn is_shipping(&self) -> bool {
        self.queue.is_enabled()
    }

    pub fn is_stopped(&self) -> bool {
        self.queue.is_closed()
    }

    pub fn metrics(&self) -> &Arc<PipelineMetrics> {
        &self.metrics
    }

    pub fn queue(&self) -> &Arc<DispatchQueue> {
        &self.queue
    }
}

impl Drop for Pipeline {
    fn drop(&mut self) {
        if self.shipper.lock().is_some() {
            self.shutdown(DEFAULT_SHUTDOWN_TIMEOUT);
        }

        let lost = self.metrics.lost();
        if lost > 0 {
            eprintln!(
                "[SHIPPER WARNING] Pipeline shutting down with {} lost records (loss rate: {:.2}%)",
                lost,
                self.metrics.loss_rate()
            );
        }
    }
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("queue", &self.queue)
            .field("shipping", &self.shipper.lock().is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::encoder::{EcsEncoder, EncodedRecord};
    use crate::core::error::{Result, ShipperError};
    use crate::core::log_level::LogLevel;
    use crate::core::retry::RetryPolicy;
    use crate::core::sink::ItemResult;
    use crate::core::{LogEntry, Normalizer};
    use std::io;

    struct CountingSink {
        submitted: Arc<Mutex<Vec<usize>>>,
        fail: bool,
    }

    impl SinkClient for CountingSink {
        fn submit_batch(&mut self, batch: &[EncodedRecord]) -> Result<Vec<ItemResult>> {
            self.submitted.lock().push(batch.len());
            if self.fail {
                return Err(ShipperError::sink_unavailable("down"));
            }
            Ok(vec![ItemResult::Ok; batch.len()])
        }

        fn name(&self) -> &str {
            "counting"
        }
    }

    #[derive(Default)]
    struct Lines(Mutex<Vec<String>>);

    impl FallbackSink for Lines {
        fn write_line(&self, _level: LogLevel, line: &str) -> io::Result<()> {
            self.0.lock().push(line.to_string());
            Ok(())
        }

        fn name(&self) -> &str {
            "lines"
        }
    }

    fn pipeline(fail: bool, retry: RetryPolicy) -> (Pipeline, Arc<Mutex<Vec<usize>>>, Arc<Lines>) {
        let submitted = Arc::new(Mutex::new(Vec::new()));
        let fallback = Arc::new(Lines::default());
        let pipeline = Pipeline::start(PipelineParts {
            queue: QueueConfig::default(),
            shipper: ShipperConfig {
                batch_size: 10,
                linger: Duration::from_secs(10),
                retry,
                ..ShipperConfig::default()
            },
            sink: Some(Box::new(CountingSink {
                submitted: Arc::clone(&submitted),
                fail,
            })),
            encoder: Arc::new(EcsEncoder::new()),
            fallback: fallback.clone(),
            on_overflow: None,
        });
        (pipeline, submitted, fallback)
    }

    fn record(message: &str) -> NormalizedRecord {
        Normalizer::default().normalize(LogEntry::new(LogLevel::Info, message))
    }

    #[test]
    fn test_flush_ships_partial_batch_before_linger() {
        let (pipeline, submitted, _) = pipeline(false, RetryPolicy::none());
        for i in 0..3 {
            pipeline.enqueue(record(&format!("m{}", i)));
        }

        assert!(pipeline.flush(Duration::from_secs(2)));
        assert_eq!(*submitted.lock(), vec![3]);
        assert_eq!(pipeline.metrics().delivered(), 3);
    }

    #[test]
    fn test_shutdown_is_idempotent_and_rejects_later_records() {
        let (pipeline, _, _) = pipeline(false, RetryPolicy::none());
        pipeline.enqueue(record("before"));

        assert!(pipeline.shutdown(Duration::from_secs(2)));
        assert!(pipeline.shutdown(Duration::from_secs(2)));
        assert_eq!(pipeline.metrics().delivered(), 1);
        assert_eq!(pipeline.enqueue(record("after")), EnqueueOutcome::Rejected);
    }

    #[test]
    fn test_shutdown_sends_undeliverable_remainder_to_fallback() {
        let retry = RetryPolicy {
            max_retries: 50,
            base_delay: Duration::from_millis(200),
            max_delay: Duration::from_secs(1),
            jitter: false,
        };
        let (pipeline, _, fallback) = pipeline(true, retry);
        pipeline.enqueue(record("stuck"));
        assert!(!pipeline.flush(Duration::from_millis(100)));

        assert!(pipeline.shutdown(Duration::from_secs(2)));
        assert_eq!(fallback.0.lock().len(), 1);
        assert_eq!(pipeline.metrics().lost(), 0);
    }

    struct PanickingFallback;

    impl FallbackSink for PanickingFallback {
        fn write_line(&self, _level: LogLevel, _line: &str) -> io::Result<()> {
            panic!("fallback exploded");
        }

        fn name(&self) -> &str {
            "panicking"
        }
    }

    #[test]
    fn test_dead_shipper_counts_records_as_lost() {
        let pipeline = Pipeline::start(PipelineParts {
            queue: QueueConfig::default(),
            shipper: ShipperConfig {
                batch_size: 10,
                linger: Duration::from_millis(200),
                retry: RetryPolicy::none(),
                ..ShipperConfig::default()
            },
            sink: Some(Box::new(CountingSink {
                submitted: Arc::new(Mutex::new(Vec::new())),
                fail: true,
            })),
            encoder: Arc::new(EcsEncoder::new()),
            fallback: Arc::new(PanickingFallback),
            on_overflow: None,
        });
        pipeline.enqueue(record("a"));
        pipeline.enqueue(record("b"));

        // Flush returns once the dead shipper's records have been written off.
        assert!(pipeline.flush(Duration::from_secs(2)));
        assert_eq!(pipeline.metrics().lost(), 2);
        assert!(pipeline.is_stopped());
        assert_eq!(pipeline.enqueue(record("late")), EnqueueOutcome::Rejected);

        assert!(!pipeline.shutdown(Duration::from_secs(1)));
        assert!(!pipeline.shutdown(Duration::from_secs(1)));
    }

    #[test]
    fn test_repeated_shutdown_reports_first_outcome() {
        struct SlowSink;

        impl SinkClient for SlowSink {
            fn submit_batch(&mut self, batch: &[EncodedRecord]) -> Result<Vec<ItemResult>> {
                std::thread::sleep(Duration::from_millis(500));
                Ok(vec![ItemResult::Ok; batch.len()])
            }

            fn name(&self) -> &str {
                "slow"
            }
        }

        let pipeline = Pipeline::start(PipelineParts {
            queue: QueueConfig::default(),
            shipper: ShipperConfig {
                batch_size: 1,
                ..ShipperConfig::default()
            },
            sink: Some(Box::new(SlowSink)),
            encoder: Arc::new(EcsEncoder::new()),
            fallback: Arc::new(Lines::default()),
            on_overflow: None,
        });
        pipeline.enqueue(record("slow"));
        std::thread::sleep(Duration::from_millis(100));

        assert!(!pipeline.shutdown(Duration::from_millis(50)));
        assert!(!pipeline.shutdown(Duration::from_secs(1)));
        assert!(pipeline.metrics().lost() >= 1);
    }

    #[test]
    fn test_disabled_pipeline() {
        let pipeline = Pipeline::disabled();
        assert!(!pipeline.is_shipping());
        assert_eq!(pipeline.enqueue(record("x")), EnqueueOutcome::Accepted);
        assert_eq!(pipeline.metrics().discarded_disabled(), 1);
        assert!(pipeline.flush(Duration::ZERO));
        assert!(pipeline.shutdown(Duration::ZERO));
    }
}
