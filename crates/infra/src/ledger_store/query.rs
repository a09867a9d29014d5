//! Transaction listing filters and pagination.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockledger_core::{ProductId, StoreId};
use stockledger_ledger::{Transaction, TransactionKind};

/// Pagination parameters for transaction listings.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Pagination {
    pub limit: u32,
    /// 0-based row offset.
    pub offset: u32,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            limit: 50,
            offset: 0,
        }
    }
}

impl Pagination {
    pub fn new(limit: Option<u32>, offset: Option<u32>) -> Self {
        Self {
            limit: limit.unwrap_or(50).min(1000),
            offset: offset.unwrap_or(0),
        }
    }
}

/// Filter criteria for transaction listings. All fields optional, combined
/// with AND.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TransactionFilter {
    pub store_id: Option<StoreId>,
    pub product_id: Option<ProductId>,
    pub kind: Option<TransactionKind>,
    /// Only rows created at or after this instant (the API derives it from a
    /// trailing `days` window).
    pub since: Option<DateTime<Utc>>,
}

impl TransactionFilter {
    pub fn matches(&self, row: &Transaction) -> bool {
        if self.store_id.is_some_and(|s| s != row.store_id) {
            return false;
        }
        if self.product_id.is_some_and(|p| p != row.product_id) {
            return false;
        }
        if self.kind.is_some_and(|k| k != row.kind) {
            return false;
        }
        if self.since.is_some_and(|t| row.created_at < t) {
            return false;
        }
        true
    }
}

/// Newest-first ordering shared by the store implementations: created_at
/// descending, id descending as the tie-break (ids are time-ordered uuids, so
/// rows committed in the same instant stay in reverse commit order).
pub fn sort_newest_first(rows: &mut [Transaction]) {
    rows.sort_by(|a, b| {
        b.created_at
            .cmp(&a.created_at)
            .then_with(|| b.id.cmp(&a.id))
    });
}
