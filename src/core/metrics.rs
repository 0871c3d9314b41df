//! Pipeline metrics for observability
//!
//! Failures inside the pipeline are never raised to the code that logs;
//! these counters (and the fallback sink) are how they become visible.

use std::sync::atomic::{AtomicU64, Ordering};

/// Counters describing what happened to every record handed to the pipeline
///
/// # Example
///
/// ```
/// use rust_log_shipper::PipelineMetrics;
///
/// let metrics = PipelineMetrics::new();
/// metrics.record_enqueued();
/// metrics.record_delivered(1);
///
/// assert_eq!(metrics.enqueued(), 1);
/// assert_eq!(metrics.delivered(), 1);
/// ```
#[derive(Debug)]
pub struct PipelineMetrics {
    /// Records accepted into the dispatch queue
    enqueued: AtomicU64,

    /// Records accepted (and discarded) while shipping is disabled
    discarded_disabled: AtomicU64,

    /// Records evicted under the drop-oldest policy
    evicted: AtomicU64,

    /// Records refused under the reject policy or after shutdown
    rejected: AtomicU64,

    /// Entries below the minimum level
    filtered: AtomicU64,

    /// Records the sink acknowledged
    delivered: AtomicU64,

    /// Submit calls made to the sink
    batches_submitted: AtomicU64,

    /// Records resubmitted after a transient failure
    retried: AtomicU64,

    /// Records the sink rejected permanently
    failed_permanent: AtomicU64,

    /// Records written to the fallback sink
    fallback_written: AtomicU64,

    /// Records whose encoding substituted a value
    degraded: AtomicU64,

    /// Submit calls that failed as a whole
    sink_unavailable: AtomicU64,

    /// Records abandoned without delivery or fallback
    lost: AtomicU64,
}

macro_rules! counter {
    ($get:ident, $field:ident) => {
        #[inline]
        pub fn $get(&self) -> u64 {
            self.$field.load(Ordering::Relaxed)
        }
    };
}

impl PipelineMetrics {
    /// Create a new metrics instance with all counters at zero
    pub const fn new() -> Self {
        Self {
            enqueued: AtomicU64::new(0),
            discarded_disabled: AtomicU64::new(0),
            evicted: AtomicU64::new(0),
            rejected: AtomicU64::new(0),
            filtered: AtomicU64::new(0),
            delivered: AtomicU64::new(0),
            batches_submitted: AtomicU64::new(0),
            retried: AtomicU64::new(0),
            failed_permanent: AtomicU64::new(0),
            fallback_written: AtomicU64::new(0),
            degraded: AtomicU64::new(0),
            sink_unavailable: AtomicU64::new(0),
            lost: AtomicU64::new(0),
        }
    }

    counter!(enqueued, enqueued);
    counter!(discarded_disabled, discarded_disabled);
    counter!(evicted, evicted);
    counter!(rejected, rejected);
    counter!(filtered, filtered);
    counter!(delivered, delivered);
    counter!(batches_submitted, batches_submitted);
    counter!(retried, retried);
    counter!(failed_permanent, failed_permanent);
    counter!(fallback_written, fallback_written);
    counter!(degraded, degraded);
    counter!(sink_unavailable, sink_unavailable);
    counter!(lost, lost);

    /// Record an enqueued record; returns the previous count
    #[inline]
    pub fn record_enqueued(&self) -> u64 {
        self.enqueued.fetch_add(1, Ordering::Relaxed)
    }

    #[inline]
    pub fn record_discarded_disabled(&self) -> u64 {
        self.discarded_disabled.fetch_add(1, Ordering::Relaxed)
    }

    #[inline]
    pub fn record_evicted(&self) -> u64 {
        self.evicted.fetch_add(1, Ordering::Relaxed)
    }

    #[inline]
    pub fn record_rejected(&self) -> u64 {
        self.rejected.fetch_add(1, Ordering::Relaxed)
    }

    #[inline]
    pub fn record_filtered(&self) -> u64 {
        self.filtered.fetch_add(1, Ordering::Relaxed)
    }

    #[inline]
    pub fn record_delivered(&self, count: u64) -> u64 {
        self.delivered.fetch_add(count, Ordering::Relaxed)
    }

    #[inline]
    pub fn record_batch_submitted(&self) -> u64 {
        self.batches_submitted.fetch_add(1, Ordering::Relaxed)
    }

    #[inline]
    pub fn record_retried(&self, count: u64) -> u64 {
        self.retried.fetch_add(count, Ordering::Relaxed)
    }

    #[inline]
    pub fn record_failed_permanent(&self, count: u64) -> u64 {
        self.failed_permanent.fetch_add(count, Ordering::Relaxed)
    }

    #[inline]
    pub fn record_fallback_written(&self, count: u64) -> u64 {
        self.fallback_written.fetch_add(count, Ordering::Relaxed)
    }

    #[inline]
    pub fn record_degraded(&self) -> u64 {
        self.degraded.fetch_add(1, Ordering::Relaxed)
    }

    #[inline]
    pub fn record_sink_unavailable(&self) -> u64 {
        self.sink_unavailable.fetch_add(1, Ordering::Relaxed)
    }

    #[inline]
    pub fn record_lost(&self, count: u64) -> u64 {
        self.lost.fetch_add(count, Ordering::Relaxed)
    }

    /// Share of offered records that never reached the sink nor the
    /// fallback sink, as a percentage (0.0 - 100.0).
    ///
    /// Returns 0.0 if nothing has been offered.
    pub fn loss_rate(&self) -> f64 {
        let lost = (self.evicted() + self.rejected() + self.lost()) as f64;
        let offered = (self.enqueued() + self.rejected()) as f64;
        if offered == 0.0 {
            0.0
        } else {
            (lost / offered) * 100.0
        }
    }

    /// Reset all metrics to zero
    pub fn reset(&self) {
        for counter in [
            &self.enqueued,
            &self.discarded_disabled,
            &self.evicted,
            &self.rejected,
            &self.filtered,
            &self.delivered,
            &self.batches_submitted,
            &self.retried,
            &self.failed_permanent,
            &self.fallback_written,
            &self.degraded,
            &self.sink_unavailable,
            &self.lost,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
    }
}

impl Default for PipelineMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for PipelineMetrics {
    /// Create a snapshot of the current metrics values
    fn clone(&self) -> Self {
        Self {
            enqueued: AtomicU64::new(self.enqueued()),
            discarded_disabled: AtomicU64::new(self.discarded_disabled()),
            evicted: AtomicU64::new(self.evicted()),
            rejected: AtomicU64::new(self.rejected()),
            filtered: AtomicU64::new(self.filtered()),
            delivered: AtomicU64::new(self.delivered()),
            batches_submitted: AtomicU64::new(self.batches_submitted()),
            retried: AtomicU64::new(self.retried()),
            failed_permanent: AtomicU64::new(self.failed_permanent()),
            fallback_written: AtomicU64::new(self.fallback_written()),
            degraded: AtomicU64::new(self.degraded()),
            sink_unavailable: AtomicU64::new(self.sink_unavailable()),
            lost: AtomicU64::new(self.lost()),
        }
    }
}
