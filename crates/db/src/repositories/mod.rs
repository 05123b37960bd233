use thiserror::Error;

use orderbot_core::ledger::LedgerError;

pub mod memory;
pub mod order;

pub use memory::InMemoryOrderLedger;
pub use order::SqlOrderLedger;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
}

impl From<RepositoryError> for LedgerError {
    fn from(value: RepositoryError) -> Self {
        LedgerError::Unavailable(value.to_string())
    }
}
