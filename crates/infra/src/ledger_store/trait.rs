use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use stockledger_core::{ProductId, StockKey, StoreId, TransactionId};
use stockledger_ledger::{InventoryRecord, Transaction, TransactionDraft};

use super::query::{Pagination, TransactionFilter};

/// One record-projection write inside a commit unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RecordWrite {
    /// Create or overwrite the record for `key` with `quantity` (>= 0).
    Upsert {
        key: StockKey,
        quantity: i64,
        at: DateTime<Utc>,
    },
    /// Remove the record for `key`. The record must exist; a missing record
    /// here means the caller computed the unit against stale state.
    Delete { key: StockKey },
}

impl RecordWrite {
    pub fn key(&self) -> StockKey {
        match self {
            Self::Upsert { key, .. } | Self::Delete { key } => *key,
        }
    }
}

/// The atomic unit of one logical ledger operation.
///
/// A unit bundles the transaction rows to append, at most one row to remove
/// (hard reversal), and the record writes that keep the projection in step.
/// The store applies the whole unit or none of it — a transaction row is never
/// visible without its paired record write, which is what keeps
/// `record.quantity == sum(changes)` true at every observable instant.
///
/// Rows appended by one unit may share a reference id (the two sides of a
/// transfer do); a reference already committed by a *previous* unit is
/// rejected with [`LedgerStoreError::DuplicateReference`] so the allocator can
/// retry with a disambiguated id.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitUnit {
    pub appends: Vec<TransactionDraft>,
    pub removes: Vec<TransactionId>,
    pub writes: Vec<RecordWrite>,
}

impl CommitUnit {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(mut self, draft: TransactionDraft) -> Self {
        self.appends.push(draft);
        self
    }

    pub fn remove(mut self, id: TransactionId) -> Self {
        self.removes.push(id);
        self
    }

    pub fn upsert(mut self, key: StockKey, quantity: i64, at: DateTime<Utc>) -> Self {
        self.writes.push(RecordWrite::Upsert { key, quantity, at });
        self
    }

    pub fn delete_record(mut self, key: StockKey) -> Self {
        self.writes.push(RecordWrite::Delete { key });
        self
    }

    pub fn is_empty(&self) -> bool {
        self.appends.is_empty() && self.removes.is_empty() && self.writes.is_empty()
    }
}

/// Counts returned by a cascade purge.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurgeReport {
    pub records_removed: usize,
    pub transactions_removed: usize,
}

/// Ledger store operation error.
///
/// These are storage-layer failures (uniqueness, unit validation, backend
/// faults), distinct from the domain taxonomy the mutation engine reports to
/// its callers.
#[derive(Debug, Error)]
pub enum LedgerStoreError {
    /// A reference id in the unit was already committed by a previous unit.
    /// The caller retries with a disambiguated reference.
    #[error("duplicate reference: {0}")]
    DuplicateReference(String),

    /// A concurrent writer touched the same rows (serialization failure in a
    /// transactional backend). Retryable by the caller.
    #[error("conflict: {0}")]
    Conflict(String),

    /// The unit is internally inconsistent (zero-change row, negative upsert,
    /// delete of a missing record). Indicates a caller bug, never retried.
    #[error("invalid commit unit: {0}")]
    InvalidUnit(String),

    /// A row listed in `removes` does not exist.
    #[error("transaction {0} not found")]
    RowNotFound(TransactionId),

    /// The backend failed. Surfaced as-is, never swallowed.
    #[error("backend failure: {0}")]
    Backend(String),
}

/// Durable CRUD for inventory records and transaction rows.
///
/// Implementations must:
/// - apply every [`CommitUnit`] atomically (full success or full rollback,
///   no partial visibility to concurrent readers)
/// - assign `TransactionId`s at commit time
/// - enforce cross-unit reference uniqueness
/// - return listings newest first (created_at, then id, descending)
///
/// The store does not serialize read-modify-write sequences; per-key
/// serialization is the mutation engine's job. Readers may run concurrently
/// with commits and observe pre- or post-state, never an in-between.
pub trait LedgerStore: Send + Sync {
    /// The stored record for a key, if any.
    fn record(&self, key: StockKey) -> Result<Option<InventoryRecord>, LedgerStoreError>;

    /// Current quantity for a key; a missing record is 0.
    fn quantity(&self, key: StockKey) -> Result<i64, LedgerStoreError> {
        Ok(self.record(key)?.map(|r| r.quantity).unwrap_or(0))
    }

    /// All stored records.
    fn records(&self) -> Result<Vec<InventoryRecord>, LedgerStoreError>;

    /// Apply one atomic unit, returning the committed rows in append order.
    fn commit(&self, unit: CommitUnit) -> Result<Vec<Transaction>, LedgerStoreError>;

    /// Look up one committed row.
    fn transaction(&self, id: TransactionId) -> Result<Option<Transaction>, LedgerStoreError>;

    /// Filtered, paginated listing, newest first.
    fn transactions(
        &self,
        filter: &TransactionFilter,
        page: Pagination,
    ) -> Result<Vec<Transaction>, LedgerStoreError>;

    /// The full history, oldest first (audit replay input).
    fn all_transactions(&self) -> Result<Vec<Transaction>, LedgerStoreError>;

    /// Atomically remove every record and row referencing a store. Run by the
    /// master-data collaborator before it deletes the store itself.
    fn purge_store(&self, store_id: StoreId) -> Result<PurgeReport, LedgerStoreError>;

    /// Atomically remove every record and row referencing a product.
    fn purge_product(&self, product_id: ProductId) -> Result<PurgeReport, LedgerStoreError>;
}

impl<S> LedgerStore for Arc<S>
where
    S: LedgerStore + ?Sized,
{
    fn record(&self, key: StockKey) -> Result<Option<InventoryRecord>, LedgerStoreError> {
        (**self).record(key)
    }

    fn quantity(&self, key: StockKey) -> Result<i64, LedgerStoreError> {
        (**self).quantity(key)
    }

    fn records(&self) -> Result<Vec<InventoryRecord>, LedgerStoreError> {
        (**self).records()
    }

    fn commit(&self, unit: CommitUnit) -> Result<Vec<Transaction>, LedgerStoreError> {
        (**self).commit(unit)
    }

    fn transaction(&self, id: TransactionId) -> Result<Option<Transaction>, LedgerStoreError> {
        (**self).transaction(id)
    }

    fn transactions(
        &self,
        filter: &TransactionFilter,
        page: Pagination,
    ) -> Result<Vec<Transaction>, LedgerStoreError> {
        (**self).transactions(filter, page)
    }

    fn all_transactions(&self) -> Result<Vec<Transaction>, LedgerStoreError> {
        (**self).all_transactions()
    }

    fn purge_store(&self, store_id: StoreId) -> Result<PurgeReport, LedgerStoreError> {
        (**self).purge_store(store_id)
    }

    fn purge_product(&self, product_id: ProductId) -> Result<PurgeReport, LedgerStoreError> {
        (**self).purge_product(product_id)
    }
}
