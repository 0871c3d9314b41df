//! End-to-end tests for the shipping pipeline
//!
//! These tests drive a [`Logger`] against in-memory sinks and verify:
//! - Batching by size and by linger
//! - Retry, permanent rejection and fallback routing
//! - Flush and shutdown semantics

use rust_log_shipper::prelude::*;
use rust_log_shipper::sinks::{MemoryFallback, MemorySink, SinkOutcome};
use rust_log_shipper::{ItemResult, ShipperConfig, TimestampFormat};
use serde_json::Value;
use std::collections::HashSet;
use std::thread;
use std::time::{Duration, Instant};
use tempfile::TempDir;

fn message(payload: &str) -> String {
    let doc: Value = serde_json::from_str(payload).expect("payload is JSON");
    doc["message"].as_str().unwrap_or_default().to_string()
}

/// Poll `condition` until it holds or `timeout` passes
fn wait_for(timeout: Duration, condition: impl Fn() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(5));
    }
    condition()
}

fn fast_retry(max_retries: u32) -> RetryPolicy {
    RetryPolicy {
        max_retries,
        base_delay: Duration::from_millis(1),
        max_delay: Duration::from_millis(5),
        jitter: false,
    }
}

#[test]
fn test_batch_by_size_then_linger() {
    let sink = MemorySink::new();
    let logger = Logger::builder()
        .sink(sink.clone())
        .queue_capacity(5)
        .batch_size(2)
        .linger(Duration::from_millis(50))
        .build();

    for i in 0..3 {
        logger.info(format!("record {}", i));
    }

    assert!(wait_for(Duration::from_secs(2), || sink.delivered_count() == 3));

    let submissions = sink.submissions();
    assert_eq!(submissions.len(), 2);
    assert_eq!(submissions[0].len(), 2);
    assert_eq!(submissions[1].len(), 1);
    // The partial batch waits out its linger before it is shipped.
    assert!(submissions[1].at.duration_since(submissions[0].at) >= Duration::from_millis(45));

    let messages: Vec<_> = sink.delivered().iter().map(|p| message(p)).collect();
    assert_eq!(messages, vec!["record 0", "record 1", "record 2"]);
}

#[test]
fn test_always_failing_sink_lands_in_fallback_once() {
    let sink = MemorySink::failing();
    let fallback = MemoryFallback::new();
    let logger = Logger::builder()
        .sink(sink.clone())
        .fallback(fallback.clone())
        .retry_policy(fast_retry(3))
        .build();

    for i in 0..5 {
        logger.error(format!("undeliverable {}", i));
    }
    assert!(logger.flush(Duration::from_secs(5)));

    // 1 + R submissions per batch.
    assert!(sink.submission_count() > 0);
    assert_eq!(sink.submission_count() % 4, 0);

    let lines = fallback.lines();
    assert_eq!(lines.len(), 5);
    let unique: HashSet<_> = lines.iter().map(|l| message(l)).collect();
    assert_eq!(unique.len(), 5);

    let metrics = logger.metrics();
    assert_eq!(metrics.fallback_written(), 5);
    assert_eq!(metrics.retried(), 15);
    assert_eq!(metrics.lost(), 0);
    assert_eq!(metrics.delivered(), 0);
    assert!(metrics.sink_unavailable() >= 4);
}

#[test]
fn test_backoff_delays_do_not_shrink() {
    let sink = MemorySink::failing();
    let logger = Logger::builder()
        .sink(sink.clone())
        .fallback(MemoryFallback::new())
        .retry_policy(RetryPolicy {
            max_retries: 3,
            base_delay: Duration::from_millis(20),
            max_delay: Duration::from_millis(80),
            jitter: false,
        })
        .build();

    logger.warn("flaky");
    assert!(logger.flush(Duration::from_secs(5)));

    let submissions = sink.submissions();
    assert_eq!(submissions.len(), 4);
    let expected = [20, 40, 80];
    for (pair, min_gap) in submissions.windows(2).zip(expected) {
        let gap = pair[1].at.duration_since(pair[0].at);
        assert!(gap >= Duration::from_millis(min_gap), "gap {:?} < {}ms", gap, min_gap);
    }
}

#[test]
fn test_partial_failure_retries_only_failed_items() {
    let sink = MemorySink::new();
    sink.push_outcome(SinkOutcome::Items(vec![
        ItemResult::Ok,
        ItemResult::transient("throttled"),
        ItemResult::permanent("mapping conflict"),
    ]));
    let fallback = MemoryFallback::new();
    let logger = Logger::builder()
        .sink(sink.clone())
        .fallback(fallback.clone())
        .batch_size(3)
        .linger(Duration::from_secs(2))
        .retry_policy(fast_retry(3))
        .build();

    logger.info("first");
    logger.info("second");
    logger.info("third");

    assert!(wait_for(Duration::from_secs(3), || {
        sink.delivered_count() == 2 && fallback.len() == 1
    }));
    assert!(logger.flush(Duration::from_secs(1)));

    let submissions = sink.submissions();
    assert_eq!(submissions.len(), 2);
    assert_eq!(submissions[0].len(), 3);
    assert_eq!(message(&submissions[1].payloads[0]), "second");

    assert_eq!(message(&fallback.lines()[0]), "third");
    let metrics = logger.metrics();
    assert_eq!(metrics.failed_permanent(), 1);
    assert_eq!(metrics.retried(), 1);
    assert_eq!(metrics.delivered(), 2);
}

#[test]
fn test_flush_true_only_when_idle() {
    let sink = MemorySink::new().with_latency(Duration::from_millis(300));
    let logger = Logger::builder().sink(sink.clone()).build();

    logger.info("slow");
    assert!(!logger.flush(Duration::from_millis(50)));
    assert_eq!(sink.delivered_count(), 0);

    assert!(logger.flush(Duration::from_secs(3)));
    assert_eq!(sink.delivered_count(), 1);
    assert_eq!(logger.metrics().delivered(), 1);
}

#[test]
fn test_flush_on_idle_pipeline() {
    let logger = Logger::builder().sink(MemorySink::new()).build();
    assert!(logger.flush(Duration::ZERO));
}

#[test]
fn test_outage_keeps_producers_unblocked_and_drops_oldest() {
    let sink = MemorySink::failing();
    let logger = Logger::builder()
        .sink(sink.clone())
        .fallback(MemoryFallback::new())
        .queue_capacity(5)
        .batch_size(1)
        .retry_policy(RetryPolicy {
            max_retries: 10,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(1),
            jitter: false,
        })
        .build();

    logger.info("first");
    // Give the shipper time to take the first record and start backing off.
    assert!(wait_for(Duration::from_secs(1), || sink.submission_count() >= 1));

    let started = Instant::now();
    for i in 0..50 {
        assert_ne!(
            logger.try_log(LogLevel::Info, format!("burst {}", i), Fields::new()),
            Some(EnqueueOutcome::Rejected)
        );
    }
    assert!(started.elapsed() < Duration::from_millis(250));

    let metrics = logger.metrics();
    assert_eq!(metrics.evicted(), 45);
    assert_eq!(metrics.enqueued(), 51);

    // Short grace: the stuck batch and the buffered tail go to the fallback.
    assert!(logger.shutdown(Duration::from_millis(200)));
    assert_eq!(logger.metrics().fallback_written(), 6);
}

#[test]
fn test_reject_policy_is_caller_visible() {
    let sink = MemorySink::new().with_latency(Duration::from_millis(500));
    let logger = Logger::builder()
        .sink(sink)
        .queue_capacity(2)
        .batch_size(1)
        .overflow_policy(OverflowPolicy::Reject)
        .build();

    let outcomes: Vec<_> = (0..10)
        .map(|i| logger.try_log(LogLevel::Info, format!("r{}", i), Fields::new()))
        .collect();
    assert!(outcomes.contains(&Some(EnqueueOutcome::Rejected)));
    assert!(logger.metrics().rejected() > 0);
    assert_eq!(logger.metrics().evicted(), 0);
}

#[test]
fn test_shutdown_delivers_buffered_records() {
    let sink = MemorySink::new();
    let logger = Logger::builder()
        .sink(sink.clone())
        .linger(Duration::from_secs(10))
        .build();

    for i in 0..20 {
        logger.info(format!("pending {}", i));
    }
    assert!(logger.shutdown(Duration::from_secs(3)));
    assert_eq!(sink.delivered_count(), 20);

    assert_eq!(
        logger.try_log(LogLevel::Error, "too late", Fields::new()),
        Some(EnqueueOutcome::Rejected)
    );
    assert!(logger.shutdown(Duration::from_secs(1)));
}

#[test]
fn test_shutdown_remainder_dropped_when_configured() {
    let fallback = MemoryFallback::new();
    let logger = Logger::builder()
        .sink(MemorySink::failing())
        .fallback(fallback.clone())
        .shipper_config(ShipperConfig {
            batch_size: 100,
            linger: Duration::from_millis(10),
            retry: RetryPolicy {
                max_retries: 100,
                base_delay: Duration::from_millis(100),
                max_delay: Duration::from_millis(100),
                jitter: false,
            },
            shutdown_grace: Duration::from_millis(300),
            remainder: RemainderPolicy::Drop,
            ..ShipperConfig::default()
        })
        .build();

    for i in 0..4 {
        logger.info(format!("doomed {}", i));
    }
    assert!(logger.shutdown(Duration::from_secs(3)));

    assert!(fallback.is_empty());
    assert_eq!(logger.metrics().lost(), 4);
}

#[test]
fn test_shutdown_timeout_abandons_in_flight() {
    let sink = MemorySink::new().with_latency(Duration::from_secs(1));
    let logger = Logger::builder().sink(sink.clone()).batch_size(1).build();

    logger.info("stuck in flight");
    logger.info("still queued");
    assert!(wait_for(Duration::from_secs(1), || logger.metrics().batches_submitted() >= 1));

    assert!(!logger.shutdown(Duration::from_millis(100)));
    assert!(logger.metrics().lost() >= 1);
}

#[test]
fn test_file_fallback_receives_documents() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let path = temp_dir.path().join("undelivered.jsonl");

    let logger = Logger::builder()
        .sink(MemorySink::with_default(SinkOutcome::AllPermanent))
        .fallback(FileFallback::new(&path).expect("Failed to open fallback file"))
        .retry_policy(RetryPolicy::none())
        .build();

    logger.error_with("rejected", Fields::new().with_field("code", 400));
    assert!(logger.flush(Duration::from_secs(2)));

    let content = std::fs::read_to_string(&path).expect("Failed to read fallback file");
    let doc: Value = serde_json::from_str(content.trim()).expect("fallback line is JSON");
    assert_eq!(doc["message"], "rejected");
    assert_eq!(doc["severity"], "error");
    assert_eq!(doc["fields"]["code"], 400);
    assert_eq!(logger.metrics().failed_permanent(), 1);
}

#[test]
fn test_degraded_record_still_delivered() {
    let sink = MemorySink::new();
    let logger = Logger::builder().sink(sink.clone()).build();

    logger.info_with("odd value", Fields::new().with_field("ratio", f64::INFINITY));
    assert!(logger.flush(Duration::from_secs(2)));

    let doc: Value = serde_json::from_str(&sink.delivered()[0]).unwrap();
    assert_eq!(doc["tags"][0], "degraded");
    assert_eq!(doc["fields"]["ratio"], "inf");
    assert_eq!(logger.metrics().degraded(), 1);
}

#[test]
fn test_reserved_level_key_becomes_severity() {
    let sink = MemorySink::new();
    let logger = Logger::builder().sink(sink.clone()).build();

    logger.info_with("custom", Fields::new().with_field("log.level", "notice"));
    logger.info_with("broken", Fields::new().with_field("log.level", 5));
    assert!(logger.flush(Duration::from_secs(2)));

    let docs: Vec<Value> = sink
        .delivered()
        .iter()
        .map(|p| serde_json::from_str(p).unwrap())
        .collect();
    assert_eq!(docs[0]["severity"], "notice");
    assert!(docs[0]["fields"].get("log.level").is_none());
    assert_eq!(docs[1]["severity"], "info");
    assert_eq!(logger.invalid_level_count(), 1);
}

#[test]
fn test_invalid_timestamp_format_keeps_shipping() {
    let sink = MemorySink::new();
    let logger = Logger::builder()
        .encoder(EcsEncoder::new().with_timestamp_format(TimestampFormat::Custom("%Q".into())))
        .sink(sink.clone())
        .build();

    logger.info("first");
    assert!(logger.flush(Duration::from_secs(2)));
    logger.info("second");
    assert!(logger.flush(Duration::from_secs(2)));

    assert_eq!(sink.delivered_count(), 2);
    for payload in sink.delivered() {
        let doc: Value = serde_json::from_str(&payload).expect("payload is JSON");
        assert!(doc["@timestamp"].as_str().unwrap().ends_with('Z'));
        assert_eq!(doc["tags"][0], "degraded");
    }

    let metrics = logger.metrics();
    assert_eq!(metrics.degraded(), 2);
    assert_eq!(metrics.lost(), 0);
    assert!(logger.shutdown(Duration::from_secs(2)));
}
