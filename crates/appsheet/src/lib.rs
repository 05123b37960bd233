//! AppSheet REST API backends: the product catalog table and the order
//! header/line tables.

pub mod catalog;
pub mod client;
pub mod ledger;
pub mod rows;

pub use catalog::AppSheetCatalog;
pub use client::{AppSheetClient, AppSheetError, TableAction};
pub use ledger::AppSheetOrderLedger;
