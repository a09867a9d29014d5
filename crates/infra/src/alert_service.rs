//! Read-side alert evaluation over the live ledger.
//!
//! Joins master data against current quantities on every call. The evaluation
//! is a cross join over stores × products: a pair with no inventory record
//! counts as quantity 0 and is therefore out of stock, which is exactly the
//! case alerting exists to catch.

use serde::Serialize;

use stockledger_core::{LedgerError, LedgerResult, StockKey, StoreId};
use stockledger_ledger::{
    classify, suggested_quantity, AlertLevel, AlertPolicy, ReorderSuggestion, StockAlert,
};

use crate::ledger_store::LedgerStore;
use crate::master_data::MasterData;

/// One line of a per-store inventory listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoreInventoryLine {
    pub product_id: stockledger_core::ProductId,
    pub sku: String,
    pub product_name: String,
    pub quantity: i64,
    pub reorder_point: i64,
    pub low_stock: bool,
}

/// Stateless evaluator over a ledger store and its master data.
pub struct AlertService<S, M> {
    store: S,
    master: M,
}

impl<S, M> AlertService<S, M>
where
    S: LedgerStore,
    M: MasterData,
{
    pub fn new(store: S, master: M) -> Self {
        Self { store, master }
    }

    /// Every (store, product) pair at or below its effective threshold,
    /// out-of-stock pairs first, then by product name.
    pub fn low_stock(&self, policy: &AlertPolicy) -> LedgerResult<Vec<StockAlert>> {
        let mut alerts = Vec::new();
        for store in self.master.stores() {
            for product in self.master.products() {
                let quantity = self.quantity_of(store.id, product.id)?;
                let level = classify(quantity, policy.effective_threshold(product.reorder_point));
                if level == AlertLevel::Ok {
                    continue;
                }
                alerts.push(StockAlert {
                    store_id: store.id,
                    product_id: product.id,
                    sku: product.sku.clone(),
                    product_name: product.name.clone(),
                    store_name: store.name.clone(),
                    quantity,
                    reorder_point: product.reorder_point,
                    level,
                });
            }
        }
        alerts.sort_by(|a, b| {
            a.level
                .rank()
                .cmp(&b.level.rank())
                .then_with(|| a.product_name.cmp(&b.product_name))
                .then_with(|| a.store_name.cmp(&b.store_name))
        });
        Ok(alerts)
    }

    /// Restock suggestions for flagged pairs. Pairs without a positive
    /// reorder point are skipped: there is no target to restock toward.
    pub fn reorder_suggestions(&self, policy: &AlertPolicy) -> LedgerResult<Vec<ReorderSuggestion>> {
        let suggestions = self
            .low_stock(policy)?
            .into_iter()
            .filter(|alert| alert.reorder_point > 0)
            .map(|alert| ReorderSuggestion {
                suggested_quantity: suggested_quantity(alert.quantity, alert.reorder_point),
                store_id: alert.store_id,
                product_id: alert.product_id,
                sku: alert.sku,
                product_name: alert.product_name,
                store_name: alert.store_name,
                quantity: alert.quantity,
                reorder_point: alert.reorder_point,
            })
            .collect();
        Ok(suggestions)
    }

    /// Full product listing for one store, flagged pairs first.
    pub fn store_inventory(
        &self,
        store_id: StoreId,
        policy: &AlertPolicy,
    ) -> LedgerResult<Vec<StoreInventoryLine>> {
        if self.master.store(store_id).is_none() {
            return Err(LedgerError::NotFound);
        }
        let mut lines = Vec::new();
        for product in self.master.products() {
            let quantity = self.quantity_of(store_id, product.id)?;
            let level = classify(quantity, policy.effective_threshold(product.reorder_point));
            lines.push(StoreInventoryLine {
                product_id: product.id,
                sku: product.sku,
                product_name: product.name,
                quantity,
                reorder_point: product.reorder_point,
                low_stock: level != AlertLevel::Ok,
            });
        }
        lines.sort_by(|a, b| {
            b.low_stock
                .cmp(&a.low_stock)
                .then_with(|| a.product_name.cmp(&b.product_name))
        });
        Ok(lines)
    }

    fn quantity_of(
        &self,
        store_id: StoreId,
        product_id: stockledger_core::ProductId,
    ) -> LedgerResult<i64> {
        self.store
            .quantity(StockKey::new(store_id, product_id))
            .map_err(|e| LedgerError::storage(e.to_string()))
    }
}
