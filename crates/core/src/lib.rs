pub mod audit;
pub mod catalog;
pub mod config;
pub mod domain;
pub mod errors;
pub mod flows;
pub mod ledger;

pub use audit::{AuditSink, InMemoryAuditSink, TracingAuditSink};
pub use catalog::{CatalogClient, CatalogError, InMemoryCatalog};
pub use domain::cart::{Cart, LineItem};
pub use domain::customer::{Customer, CustomerProfile, PhoneNumber};
pub use domain::order::{Order, OrderId, OrderIdAllocator};
pub use domain::product::CatalogItem;
pub use errors::{ApplicationError, DomainError, InterfaceError, TurnError, ValidationError};
pub use flows::{ConversationEngine, ConversationId, ConversationService, StageKind, TurnOutcome};
pub use ledger::{CommitReceipt, LedgerError, OrderLedger};
