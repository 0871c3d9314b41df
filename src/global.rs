//! Process-wide logger instance
//!
//! Explicit [`Logger`] handles are the primary API; this module exists for
//! code that cannot thread a handle through. The global is installed once.

use crate::core::{Logger, LoggerConfig};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::OnceLock;

static GLOBAL: GlobalSlot = GlobalSlot::new();

struct GlobalSlot {
    logger: OnceLock<Logger>,
    /// Set when [`GlobalSlot::logger`] installed the disabled stand-in
    fallback_installed: AtomicBool,
}

impl GlobalSlot {
    const fn new() -> Self {
        Self {
            logger: OnceLock::new(),
            fallback_installed: AtomicBool::new(false),
        }
    }

    fn init(&self, config: &LoggerConfig) -> &Logger {
        let mut built = false;
        let instance = self.logger.get_or_init(|| {
            built = true;
            Logger::from_config(config)
        });
        if !built && self.fallback_installed.load(Ordering::Acquire) {
            eprintln!(
                "[SHIPPER WARNING] Global logger was used before init; config for '{}' ignored, shipping stays disabled",
                config.app_name
            );
        }
        instance
    }

    fn logger(&self) -> &Logger {
        self.logger.get_or_init(|| {
            self.fallback_installed.store(true, Ordering::Release);
            eprintln!("[SHIPPER WARNING] Global logger used before init; shipping disabled");
            Logger::disabled()
        })
    }
}

/// Install the global logger built from `config`.
///
/// Idempotent: once a logger is installed, later calls return it without
/// building another pipeline or sink connection. If [`logger`] already
/// installed the disabled stand-in, `config` is ignored with a warning.
pub fn init(config: &LoggerConfig) -> &'static Logger {
    GLOBAL.init(config)
}

/// Install an already built logger. Returns it back if one was installed first.
pub fn set(instance: Logger) -> Result<&'static Logger, Logger> {
    GLOBAL.logger.set(instance)?;
    Ok(logger())
}

/// The global logger, if installed
pub fn get() -> Option<&'static Logger> {
    GLOBAL.logger.get()
}

/// The global logger, or a disabled one installed on first use
pub fn logger() -> &'static Logger {
    GLOBAL.logger()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_is_idempotent() {
        let config = LoggerConfig {
            app_name: "global-test".into(),
            ..LoggerConfig::default()
        };
        let first = init(&config);
        let second = init(&LoggerConfig::default());
        assert!(first.same_pipeline(second));
        assert!(get().is_some_and(|l| l.same_pipeline(first)));
        assert!(logger().same_pipeline(first));
        assert!(set(Logger::disabled()).is_err());
    }

    #[test]
    fn test_init_after_early_use_keeps_stand_in() {
        let slot = GlobalSlot::new();
        let early = slot.logger();
        assert!(slot.fallback_installed.load(Ordering::Acquire));

        let config = LoggerConfig {
            app_name: "late-init".into(),
            ..LoggerConfig::default()
        };
        let late = slot.init(&config);
        assert!(late.same_pipeline(early));
        assert!(!late.is_shipping());
    }

    #[test]
    fn test_init_first_installs_configured_logger() {
        let slot = GlobalSlot::new();
        let configured = slot.init(&LoggerConfig::default());
        assert!(!slot.fallback_installed.load(Ordering::Acquire));
        assert!(slot.logger().same_pipeline(configured));
        assert!(!slot.fallback_installed.load(Ordering::Acquire));
    }
}
