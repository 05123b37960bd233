use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::order::{Order, OrderId};

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum LedgerError {
    #[error("order ledger unavailable: {0}")]
    Unavailable(String),
    #[error("order header for `{order_id}` was rejected: {reason}")]
    HeaderRejected { order_id: OrderId, reason: String },
    #[error("order lines for `{order_id}` were rejected after the header was stored: {reason}")]
    LinesRejected { order_id: OrderId, reason: String },
    #[error("order commit timed out after {after_secs}s")]
    Timeout { after_secs: u64 },
}

impl LedgerError {
    /// Header stored, lines missing.
    pub fn is_partial(&self) -> bool {
        matches!(self, Self::LinesRejected { .. })
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitReceipt {
    pub order_id: OrderId,
    /// False when an earlier attempt already stored the header.
    pub header_written: bool,
    pub lines_written: usize,
}

/// Remote order storage. `commit` must be idempotent per order id so a failed
/// commit can be retried with the same order.
#[async_trait]
pub trait OrderLedger: Send + Sync {
    fn backend(&self) -> &'static str;

    async fn commit(&self, order: &Order) -> Result<CommitReceipt, LedgerError>;

    /// Highest order sequence already stored, used to seed the id allocator.
    async fn highest_sequence(&self) -> Result<Option<u64>, LedgerError> {
        Ok(None)
    }
}
