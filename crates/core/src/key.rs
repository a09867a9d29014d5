//! The (store, product) stock key.

use serde::{Deserialize, Serialize};

use crate::id::{ProductId, StoreId};

/// Key of one tracked quantity: a product held at a store.
///
/// `Ord` is derived (store first, then product) and is the global lock
/// acquisition order for multi-key operations — transfers lock both keys in
/// ascending order regardless of direction, so opposite-direction transfers
/// cannot deadlock.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct StockKey {
    pub store_id: StoreId,
    pub product_id: ProductId,
}

impl StockKey {
    pub fn new(store_id: StoreId, product_id: ProductId) -> Self {
        Self {
            store_id,
            product_id,
        }
    }
}

impl core::fmt::Display for StockKey {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}/{}", self.store_id, self.product_id)
    }
}
