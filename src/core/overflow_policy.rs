//! Overflow policies for the dispatch queue
//!
//! When the dispatch queue is at capacity, the policy decides whether the
//! oldest buffered record makes room for the new one or the new one is
//! refused. Neither option ever blocks the caller.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Policy for handling a full dispatch queue
///
/// # Example
///
/// ```
/// use rust_log_shipper::OverflowPolicy;
///
/// let policy: OverflowPolicy = "reject".parse().unwrap();
/// assert_eq!(policy, OverflowPolicy::Reject);
/// assert_eq!(OverflowPolicy::default(), OverflowPolicy::DropOldest);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverflowPolicy {
    /// Evict the single oldest unconsumed record to admit the new one.
    ///
    /// Every eviction is counted. Recent records are usually the ones an
    /// operator needs when the sink has been down for a while.
    DropOldest,

    /// Refuse the new record and report `Rejected` to the caller.
    Reject,
}

impl Default for OverflowPolicy {
    fn default() -> Self {
        OverflowPolicy::DropOldest
    }
}

impl fmt::Display for OverflowPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OverflowPolicy::DropOldest => write!(f, "drop_oldest"),
            OverflowPolicy::Reject => write!(f, "reject"),
        }
    }
}

impl std::str::FromStr for OverflowPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "drop_oldest" => Ok(OverflowPolicy::DropOldest),
            "reject" => Ok(OverflowPolicy::Reject),
            _ => Err(format!("Invalid overflow policy: '{}'", s)),
        }
    }
}

/// Callback type for overflow notifications
///
/// Called when the queue overflows (eviction or rejection).
/// The parameter is the total count of overflow events so far.
pub type OverflowCallback = Arc<dyn Fn(u64) + Send + Sync>;
