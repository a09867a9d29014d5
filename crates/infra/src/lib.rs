//! Infrastructure: durable ledger storage, master-data access, and the
//! mutation engine that is the sole write path into both.
//!
//! Layering: `ledger_store` owns durability and the atomic commit unit;
//! `mutation_engine` owns validation, per-key serialization, and reference
//! allocation; `audit` and `alert_service` are read-only consumers of the
//! store and never mutate through anything but the repair path.

pub mod alert_service;
pub mod audit;
pub mod ledger_store;
pub mod master_data;
pub mod mutation_engine;


pub use alert_service::{AlertService, StoreInventoryLine};
pub use audit::{audit, repair};
pub use ledger_store::{
    CommitUnit, InMemoryLedgerStore, LedgerStore, LedgerStoreError, Pagination,
    PostgresLedgerStore, PurgeReport, RecordWrite, TransactionFilter,
};
pub use master_data::{
    InMemoryMasterData, MasterData, Product, ProductUpdate, Store, StoreUpdate,
};
pub use mutation_engine::{
    AdjustOutcome, MutationEngine, ReversalMode, ReverseOutcome, SetLevelOutcome,
    TransferOutcome,
};
