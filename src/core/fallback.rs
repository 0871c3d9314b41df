//! Local line-oriented output used when records cannot be delivered

use super::log_level::LogLevel;
use std::io;

/// Synchronous "write a line" capability (console, local file, ...).
///
/// Receives records the pipeline gave up on, so nothing is lost silently.
/// Also used for the optional local echo of every accepted record.
pub trait FallbackSink: Send + Sync {
    fn write_line(&self, level: LogLevel, line: &str) -> io::Result<()>;

    fn flush(&self) -> io::Result<()> {
        Ok(())
    }

    fn name(&self) -> &str;
}
