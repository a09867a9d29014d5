//! Durable keyed storage for inventory records and transaction rows.

mod in_memory;
mod postgres;
mod query;
mod r#trait;

pub use in_memory::InMemoryLedgerStore;
pub use postgres::PostgresLedgerStore;
pub use query::{Pagination, TransactionFilter};
pub use r#trait::{CommitUnit, LedgerStore, LedgerStoreError, PurgeReport, RecordWrite};
