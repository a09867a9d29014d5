//! Ledger domain module.
//!
//! This crate contains the business rules of the stock ledger, implemented
//! purely as deterministic domain logic (no IO, no HTTP, no storage): the
//! immutable transaction row and its draft form, the inventory-record
//! projection type, quantity replay, alert classification, and reference
//! allocation.

pub mod alerts;
pub mod projector;
pub mod record;
pub mod reference;
pub mod transaction;

pub use alerts::{
    classify, suggested_quantity, AlertLevel, AlertPolicy, ReorderSuggestion, StockAlert,
};
pub use projector::{divergences, project_all, projected_quantity, Divergence};
pub use record::InventoryRecord;
pub use reference::{Reference, ReferenceKind};
pub use transaction::{Transaction, TransactionDraft, TransactionKind};
