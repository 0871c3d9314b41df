//! Console fallback: one line per record on stderr or stdout

use crate::core::{FallbackSink, LogLevel};
#[cfg(feature = "console")]
use colored::Colorize;
use std::io::{self, Write};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ConsoleTarget {
    #[default]
    Stderr,
    Stdout,
}

/// Writes each line to the console, optionally prefixed by a colored level tag.
///
/// # Example
///
/// ```
/// use rust_log_shipper::sinks::{ConsoleFallback, ConsoleTarget};
///
/// let fallback = ConsoleFallback::new()
///     .with_target(ConsoleTarget::Stdout)
///     .with_level_prefix(true);
/// ```
#[derive(Debug, Clone)]
pub struct ConsoleFallback {
    target: ConsoleTarget,
    level_prefix: bool,
    use_colors: bool,
}

impl ConsoleFallback {
    pub fn new() -> Self {
        Self {
            target: ConsoleTarget::Stderr,
            level_prefix: false,
            use_colors: cfg!(feature = "console"),
        }
    }

    #[must_use]
    pub fn with_target(mut self, target: ConsoleTarget) -> Self {
        self.target = target;
        self
    }

    /// Prefix each line with `[LEVEL]`
    #[must_use]
    pub fn with_level_prefix(mut self, enabled: bool) -> Self {
        self.level_prefix = enabled;
        self
    }

    #[must_use]
    pub fn with_colors(mut self, use_colors: bool) -> Self {
        self.use_colors = use_colors;
        self
    }

    fn format_line(&self, level: LogLevel, line: &str) -> String {
        if !self.level_prefix {
            return line.to_string();
        }

        #[cfg(feature = "console")]
        if self.use_colors {
            let tag = format!("{:5}", level.to_str()).color(level.color_code());
            return format!("[{}] {}", tag, line);
        }

        format!("[{:5}] {}", level.to_str(), line)
    }
}

impl Default for ConsoleFallback {
    fn default() -> Self {
        Self::new()
    }
}

impl FallbackSink for ConsoleFallback {
    fn write_line(&self, level: LogLevel, line: &str) -> io::Result<()> {
        let output = self.format_line(level, line);
        match self.target {
            ConsoleTarget::Stderr => writeln!(io::stderr().lock(), "{}", output),
            ConsoleTarget::Stdout => writeln!(io::stdout().lock(), "{}", output),
        }
    }

    fn flush(&self) -> io::Result<()> {
        match self.target {
            ConsoleTarget::Stderr => io::stderr().flush(),
            ConsoleTarget::Stdout => io::stdout().flush(),
        }
    }

    fn name(&self) -> &str {
        "console"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_line_passes_through() {
        let fallback = ConsoleFallback::new();
        assert_eq!(fallback.format_line(LogLevel::Info, "{\"a\":1}"), "{\"a\":1}");
    }

    #[test]
    fn test_level_prefix_without_colors() {
        let fallback = ConsoleFallback::new()
            .with_level_prefix(true)
            .with_colors(false);
        assert_eq!(fallback.format_line(LogLevel::Warn, "x"), "[WARN ] x");
    }

    #[test]
    fn test_write_line() {
        let fallback = ConsoleFallback::new().with_target(ConsoleTarget::Stdout);
        assert!(fallback.write_line(LogLevel::Error, "console fallback test").is_ok());
        assert!(fallback.flush().is_ok());
        assert_eq!(fallback.name(), "console");
    }
}
