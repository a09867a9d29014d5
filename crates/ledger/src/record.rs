//! The cached-quantity projection.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockledger_core::{ProductId, StockKey, StoreId};

/// Current quantity of one (store, product) key.
///
/// This is a projection, not a source of truth: it must always equal the sum
/// of `change` over the transactions sharing its key. A missing record is
/// equivalent to quantity 0 — readers go through total mappings, never
/// null-check this type themselves.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryRecord {
    pub store_id: StoreId,
    pub product_id: ProductId,
    /// Never negative.
    pub quantity: i64,
    pub last_updated: DateTime<Utc>,
}

impl InventoryRecord {
    pub fn new(key: StockKey, quantity: i64, at: DateTime<Utc>) -> Self {
        Self {
            store_id: key.store_id,
            product_id: key.product_id,
            quantity,
            last_updated: at,
        }
    }

    pub fn key(&self) -> StockKey {
        StockKey::new(self.store_id, self.product_id)
    }
}
