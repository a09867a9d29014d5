//! Store and product master data.
//!
//! Master data is an external collaborator from the ledger's point of view:
//! the engine only needs existence checks and the per-product reorder point.
//! The in-memory implementation here also carries the administrative surface
//! (create, update, cascade-delete) that the HTTP layer exposes.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use stockledger_core::{LedgerError, LedgerResult, ProductId, StoreId};

use crate::ledger_store::{LedgerStore, PurgeReport};

/// Product master record as the ledger sees it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    /// Stable business key, unique, immutable.
    pub sku: String,
    pub name: String,
    /// Non-negative threshold below which a (store, product) pair is flagged.
    /// Mutable at any time; never affects ledger history.
    pub reorder_point: i64,
    pub created_at: DateTime<Utc>,
}

/// Store master record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Store {
    pub id: StoreId,
    pub name: String,
    pub location: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Mutable product fields, each optional, applied via a fixed mapping.
/// The SKU is the stable business key and is deliberately absent.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProductUpdate {
    pub name: Option<String>,
    pub reorder_point: Option<i64>,
}

/// Mutable store fields.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StoreUpdate {
    pub name: Option<String>,
    pub location: Option<Option<String>>,
}

/// Read access the engine and evaluators need from master data.
pub trait MasterData: Send + Sync {
    fn product(&self, id: ProductId) -> Option<Product>;
    fn store(&self, id: StoreId) -> Option<Store>;
    fn products(&self) -> Vec<Product>;
    fn stores(&self) -> Vec<Store>;
}

impl<M> MasterData for Arc<M>
where
    M: MasterData + ?Sized,
{
    fn product(&self, id: ProductId) -> Option<Product> {
        (**self).product(id)
    }

    fn store(&self, id: StoreId) -> Option<Store> {
        (**self).store(id)
    }

    fn products(&self) -> Vec<Product> {
        (**self).products()
    }

    fn stores(&self) -> Vec<Store> {
        (**self).stores()
    }
}

#[derive(Debug, Default)]
struct Registry {
    products: HashMap<ProductId, Product>,
    stores: HashMap<StoreId, Store>,
}

/// In-memory master-data registry.
#[derive(Debug, Default)]
pub struct InMemoryMasterData {
    registry: RwLock<Registry>,
}

impl InMemoryMasterData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create_product(
        &self,
        sku: impl Into<String>,
        name: impl Into<String>,
        reorder_point: i64,
    ) -> LedgerResult<Product> {
        let sku = sku.into();
        let name = name.into();
        if sku.trim().is_empty() || name.trim().is_empty() {
            return Err(LedgerError::invalid_operation("sku and name are required"));
        }
        if reorder_point < 0 {
            return Err(LedgerError::invalid_quantity(
                "reorder point cannot be negative",
            ));
        }

        let mut registry = self.write()?;
        if registry.products.values().any(|p| p.sku == sku) {
            return Err(LedgerError::invalid_operation(format!(
                "sku '{sku}' already exists"
            )));
        }

        let product = Product {
            id: ProductId::new(),
            sku,
            name,
            reorder_point,
            created_at: Utc::now(),
        };
        registry.products.insert(product.id, product.clone());
        Ok(product)
    }

    pub fn update_product(&self, id: ProductId, update: ProductUpdate) -> LedgerResult<Product> {
        if update.reorder_point.is_some_and(|rp| rp < 0) {
            return Err(LedgerError::invalid_quantity(
                "reorder point cannot be negative",
            ));
        }

        let mut registry = self.write()?;
        let product = registry
            .products
            .get_mut(&id)
            .ok_or(LedgerError::NotFound)?;
        if let Some(name) = update.name {
            product.name = name;
        }
        if let Some(reorder_point) = update.reorder_point {
            product.reorder_point = reorder_point;
        }
        Ok(product.clone())
    }

    pub fn set_reorder_point(&self, id: ProductId, reorder_point: i64) -> LedgerResult<Product> {
        self.update_product(
            id,
            ProductUpdate {
                reorder_point: Some(reorder_point),
                ..Default::default()
            },
        )
    }

    pub fn create_store(
        &self,
        name: impl Into<String>,
        location: Option<String>,
    ) -> LedgerResult<Store> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(LedgerError::invalid_operation("store name is required"));
        }

        let mut registry = self.write()?;
        if registry.stores.values().any(|s| s.name == name) {
            return Err(LedgerError::invalid_operation(format!(
                "store '{name}' already exists"
            )));
        }

        let store = Store {
            id: StoreId::new(),
            name,
            location,
            created_at: Utc::now(),
        };
        registry.stores.insert(store.id, store.clone());
        Ok(store)
    }

    pub fn update_store(&self, id: StoreId, update: StoreUpdate) -> LedgerResult<Store> {
        let mut registry = self.write()?;
        let store = registry.stores.get_mut(&id).ok_or(LedgerError::NotFound)?;
        if let Some(name) = update.name {
            store.name = name;
        }
        if let Some(location) = update.location {
            store.location = location;
        }
        Ok(store.clone())
    }

    /// Delete a product: ledger traces are purged first, then the master
    /// record — the reverse order would leave orphaned keys violating the
    /// record/history pairing.
    pub fn delete_product<S: LedgerStore>(
        &self,
        ledger: &S,
        id: ProductId,
    ) -> LedgerResult<PurgeReport> {
        {
            let registry = self.read()?;
            if !registry.products.contains_key(&id) {
                return Err(LedgerError::NotFound);
            }
        }

        let report = ledger
            .purge_product(id)
            .map_err(|e| LedgerError::storage(e.to_string()))?;
        self.write()?.products.remove(&id);

        info!(
            product_id = %id,
            records = report.records_removed,
            rows = report.transactions_removed,
            "product deleted with ledger cascade"
        );
        Ok(report)
    }

    /// Delete a store with the same cascade ordering as [`Self::delete_product`].
    pub fn delete_store<S: LedgerStore>(
        &self,
        ledger: &S,
        id: StoreId,
    ) -> LedgerResult<PurgeReport> {
        {
            let registry = self.read()?;
            if !registry.stores.contains_key(&id) {
                return Err(LedgerError::NotFound);
            }
        }

        let report = ledger
            .purge_store(id)
            .map_err(|e| LedgerError::storage(e.to_string()))?;
        self.write()?.stores.remove(&id);

        info!(
            store_id = %id,
            records = report.records_removed,
            rows = report.transactions_removed,
            "store deleted with ledger cascade"
        );
        Ok(report)
    }

    fn read(&self) -> LedgerResult<std::sync::RwLockReadGuard<'_, Registry>> {
        self.registry
            .read()
            .map_err(|_| LedgerError::storage("master data lock poisoned"))
    }

    fn write(&self) -> LedgerResult<std::sync::RwLockWriteGuard<'_, Registry>> {
        self.registry
            .write()
            .map_err(|_| LedgerError::storage("master data lock poisoned"))
    }
}

impl MasterData for InMemoryMasterData {
    fn product(&self, id: ProductId) -> Option<Product> {
        self.read().ok()?.products.get(&id).cloned()
    }

    fn store(&self, id: StoreId) -> Option<Store> {
        self.read().ok()?.stores.get(&id).cloned()
    }

    fn products(&self) -> Vec<Product> {
        self.read()
            .map(|r| r.products.values().cloned().collect())
            .unwrap_or_default()
    }

    fn stores(&self) -> Vec<Store> {
        self.read()
            .map(|r| r.stores.values().cloned().collect())
            .unwrap_or_default()
    }
}
