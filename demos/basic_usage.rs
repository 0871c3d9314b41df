//! Basic logger usage example
//!
//! Demonstrates levels, structured fields, tenant scoping and shutdown.
//! Records are echoed to stderr; set `ES_HOST` (e.g. http://localhost:9200)
//! to also ship them to Elasticsearch.
//!
//! Run with: cargo run --example basic_usage

use rust_log_shipper::prelude::*;
use rust_log_shipper::{info, warn};
use std::time::Duration;

fn main() -> Result<()> {
    println!("=== Rust Log Shipper - Basic Usage Example ===\n");

    let host = std::env::var("ES_HOST").unwrap_or_default();
    let config = LoggerConfig {
        app_name: "basic-usage".into(),
        environment: "development".into(),
        enable_log: !host.is_empty(),
        host,
        log_level: "debug".into(),
        echo: true,
        ..LoggerConfig::default()
    };
    let logger = Logger::from_config(&config);
    println!("Shipping enabled: {}\n", logger.is_shipping());

    println!("1. Logging at different levels:");
    logger.trace("This is a trace message (hidden, below debug)");
    logger.debug("This is a debug message");
    logger.info("This is an info message");
    logger.warn("This is a warning message");
    logger.error("This is an error message");

    println!("\n2. Structured fields:");
    let request = logger.with_field("request_id", "r-1001");
    request.info_with(
        "Order placed",
        Fields::new().with_field("order_id", 77).with_field("total", 19.99),
    );
    info!(request, "Processed {} items", 3);

    println!("\n3. Tenant scoping:");
    let tenant = TenantContext {
        company_id: 42,
        shop_name: "Corner Shop".into(),
        ..TenantContext::new("tenant-42")
    };
    let checkout = logger.with_tenant("checkout", tenant);
    warn!(checkout, Fields::new().with_field("attempt", 2); "Payment retry");

    println!("\n4. Custom severity via the reserved level key:");
    logger.info_with("Audit trail", Fields::new().with_field("log.level", "notice"));

    println!("\n5. Changing the minimum level:");
    logger.set_min_level(LogLevel::Warn);
    logger.info("Info message (hidden)");
    logger.warn("Warning message (visible)");

    let delivered = logger.shutdown(Duration::from_secs(5));
    let metrics = logger.metrics();
    println!(
        "\nShutdown clean: {} (delivered {}, fallback {}, lost {})",
        delivered,
        metrics.delivered(),
        metrics.fallback_written(),
        metrics.lost()
    );

    println!("\n=== Example completed successfully! ===");
    Ok(())
}
