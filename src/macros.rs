//! Logging macros for ergonomic log message formatting.
//!
//! These macros provide a convenient interface for logging with automatic
//! string formatting, similar to `println!` and `format!`. Each one also has
//! a fields form, `info!(logger, fields; "fmt", args)`.
//!
//! # Examples
//!
//! ```
//! use rust_log_shipper::prelude::*;
//! use rust_log_shipper::info;
//!
//! let logger = Logger::disabled();
//!
//! // Basic logging
//! info!(logger, "Server started");
//!
//! // With format arguments
//! let port = 8080;
//! info!(logger, "Server listening on port {}", port);
//!
//! // With structured fields
//! let fields = Fields::new().with_field("method", "GET").with_field("path", "/");
//! info!(logger, fields; "Request received in {}ms", 3);
//! ```

/// Log a message with automatic formatting.
///
/// # Examples
///
/// ```
/// # use rust_log_shipper::prelude::*;
/// # let logger = Logger::disabled();
/// use rust_log_shipper::log;
/// log!(logger, LogLevel::Info, "Simple message");
/// log!(logger, LogLevel::Error, "Error code: {}", 500);
/// log!(logger, LogLevel::Warn, Fields::new().with_field("code", 429); "Throttled");
/// ```
#[macro_export]
macro_rules! log {
    ($logger:expr, $level:expr, $fields:expr; $($arg:tt)+) => {
        $logger.log_with($level, format!($($arg)+), $fields)
    };
    ($logger:expr, $level:expr, $($arg:tt)+) => {
        $logger.log($level, format!($($arg)+))
    };
}

/// Log a trace-level message.
///
/// # Examples
///
/// ```
/// # use rust_log_shipper::prelude::*;
/// # let logger = Logger::disabled();
/// # logger.set_min_level(LogLevel::Trace);
/// use rust_log_shipper::trace;
/// trace!(logger, "Entering function: calculate()");
/// trace!(logger, "Variable value: {}", 42);
/// ```
#[macro_export]
macro_rules! trace {
    ($logger:expr, $fields:expr; $($arg:tt)+) => {
        $crate::log!($logger, $crate::LogLevel::Trace, $fields; $($arg)+)
    };
    ($logger:expr, $($arg:tt)+) => {
        $crate::log!($logger, $crate::LogLevel::Trace, $($arg)+)
    };
}

/// Log a debug-level message.
#[macro_export]
macro_rules! debug {
    ($logger:expr, $fields:expr; $($arg:tt)+) => {
        $crate::log!($logger, $crate::LogLevel::Debug, $fields; $($arg)+)
    };
    ($logger:expr, $($arg:tt)+) => {
        $crate::log!($logger, $crate::LogLevel::Debug, $($arg)+)
    };
}

/// Log an info-level message.
///
/// # Examples
///
/// ```
/// # use rust_log_shipper::prelude::*;
/// # let logger = Logger::disabled();
/// use rust_log_shipper::info;
/// info!(logger, "Application started");
/// info!(logger, "Processing {} items", 100);
/// ```
#[macro_export]
macro_rules! info {
    ($logger:expr, $fields:expr; $($arg:tt)+) => {
        $crate::log!($logger, $crate::LogLevel::Info, $fields; $($arg)+)
    };
    ($logger:expr, $($arg:tt)+) => {
        $crate::log!($logger, $crate::LogLevel::Info, $($arg)+)
    };
}

/// Log a warning-level message.
#[macro_export]
macro_rules! warn {
    ($logger:expr, $fields:expr; $($arg:tt)+) => {
        $crate::log!($logger, $crate::LogLevel::Warn, $fields; $($arg)+)
    };
    ($logger:expr, $($arg:tt)+) => {
        $crate::log!($logger, $crate::LogLevel::Warn, $($arg)+)
    };
}

/// Log an error-level message.
///
/// # Examples
///
/// ```
/// # use rust_log_shipper::prelude::*;
/// # let logger = Logger::disabled();
/// use rust_log_shipper::error;
/// error!(logger, "Failed to connect to database");
/// error!(logger, "Error code: {}, message: {}", 500, "Internal error");
/// ```
#[macro_export]
macro_rules! error {
    ($logger:expr, $fields:expr; $($arg:tt)+) => {
        $crate::log!($logger, $crate::LogLevel::Error, $fields; $($arg)+)
    };
    ($logger:expr, $($arg:tt)+) => {
        $crate::log!($logger, $crate::LogLevel::Error, $($arg)+)
    };
}

/// Log a fatal-level message, flush, and run the fatal handler.
///
/// With the default handler this exits the process.
///
/// # Examples
///
/// ```no_run
/// # use rust_log_shipper::prelude::*;
/// # let logger = Logger::disabled();
/// use rust_log_shipper::fatal;
/// fatal!(logger, "Unable to recover from error: {}", "disk full");
/// ```
#[macro_export]
macro_rules! fatal {
    ($logger:expr, $fields:expr; $($arg:tt)+) => {
        $logger.fatal_with(format!($($arg)+), $fields)
    };
    ($logger:expr, $($arg:tt)+) => {
        $logger.fatal(format!($($arg)+))
    };
}

#[cfg(test)]
mod tests {
    use crate::core::{Fields, LogLevel, Logger};
    use crate::sinks::MemoryFallback;
    use parking_lot::Mutex;
    use std::sync::Arc;

    fn echo_logger() -> (Logger, MemoryFallback) {
        let echo = MemoryFallback::new();
        let logger = Logger::builder()
            .min_level(LogLevel::Trace)
            .shipping(false)
            .echo(echo.clone())
            .build();
        (logger, echo)
    }

    #[test]
    fn test_format_args() {
        let (logger, echo) = echo_logger();
        info!(logger, "port {}", 8080);
        warn!(logger, "plain");
        trace!(logger, "{}-{}", 1, 2);

        let lines = echo.lines();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].contains("port 8080"));
        assert!(lines[2].contains("1-2"));
    }

    #[test]
    fn test_fields_form() {
        let (logger, echo) = echo_logger();
        let fields = Fields::new().with_field("user_id", 42);
        error!(logger, fields; "login failed for {}", "bob");

        let doc: serde_json::Value = serde_json::from_str(&echo.lines()[0]).unwrap();
        assert_eq!(doc["message"], "login failed for bob");
        assert_eq!(doc["severity"], "error");
        assert_eq!(doc["fields"]["user_id"], 42);
    }

    #[test]
    fn test_fatal_macro_runs_handler() {
        let called = Arc::new(Mutex::new(None));
        let called_clone = Arc::clone(&called);
        let logger = Logger::builder()
            .shipping(false)
            .fatal_handler(Arc::new(move |message: &str| {
                *called_clone.lock() = Some(message.to_string());
            }))
            .build();

        fatal!(logger, "disk {}", "full");
        assert_eq!(called.lock().as_deref(), Some("disk full"));
    }
}
