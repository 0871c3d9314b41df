//! Sink client trait for the remote search/indexing backend

use super::{encoder::EncodedRecord, error::Result};

/// Outcome for one record of a submitted batch
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemResult {
    Ok,
    Failed {
        reason: String,
        /// `true` for transient failures (throttling, server errors)
        retryable: bool,
    },
}

impl ItemResult {
    pub fn transient(reason: impl Into<String>) -> Self {
        ItemResult::Failed {
            reason: reason.into(),
            retryable: true,
        }
    }

    pub fn permanent(reason: impl Into<String>) -> Self {
        ItemResult::Failed {
            reason: reason.into(),
            retryable: false,
        }
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, ItemResult::Ok)
    }
}

/// Network client for the log backend.
///
/// Owned exclusively by the shipper thread, so implementations need `Send`
/// but not `Sync`.
pub trait SinkClient: Send {
    /// Submit a batch, returning one result per record in submission order.
    ///
    /// An `Err` means the batch as a whole could not be delivered
    /// (unreachable backend, authentication failure, ...); every record
    /// is then treated as a transient failure.
    fn submit_batch(&mut self, batch: &[EncodedRecord]) -> Result<Vec<ItemResult>>;

    fn name(&self) -> &str;
}
