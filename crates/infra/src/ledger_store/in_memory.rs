use std::collections::{HashMap, HashSet};
use std::sync::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};

use stockledger_core::{ProductId, StockKey, StoreId, TransactionId};
use stockledger_ledger::{InventoryRecord, Transaction};

use super::query::{sort_newest_first, Pagination, TransactionFilter};
use super::r#trait::{CommitUnit, LedgerStore, LedgerStoreError, PurgeReport, RecordWrite};

#[derive(Debug, Default)]
struct State {
    records: HashMap<StockKey, InventoryRecord>,
    rows: Vec<Transaction>,
    /// References committed by past units; appends within one unit may share.
    references: HashSet<String>,
}

/// In-memory ledger store.
///
/// Intended for tests/dev. Commits validate the whole unit against current
/// state before touching any of it, so a rejected unit is a full rollback by
/// construction.
#[derive(Debug, Default)]
pub struct InMemoryLedgerStore {
    state: RwLock<State>,
    fail_next: AtomicBool,
}

impl InMemoryLedgerStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `commit` fail after validation with a backend fault,
    /// applying nothing. Lets tests prove the full-rollback contract without a
    /// real crashing backend.
    pub fn fail_next_commit(&self) {
        self.fail_next.store(true, Ordering::SeqCst);
    }

    fn validate(state: &State, unit: &CommitUnit) -> Result<(), LedgerStoreError> {
        if unit.is_empty() {
            return Err(LedgerStoreError::InvalidUnit("empty unit".to_string()));
        }

        for draft in &unit.appends {
            if draft.change == 0 {
                return Err(LedgerStoreError::InvalidUnit(
                    "zero-change row".to_string(),
                ));
            }
            if state.references.contains(draft.reference.as_str()) {
                return Err(LedgerStoreError::DuplicateReference(
                    draft.reference.as_str().to_string(),
                ));
            }
        }

        for id in &unit.removes {
            if !state.rows.iter().any(|r| r.id == *id) {
                return Err(LedgerStoreError::RowNotFound(*id));
            }
        }

        for write in &unit.writes {
            match write {
                RecordWrite::Upsert { quantity, key, .. } => {
                    if *quantity < 0 {
                        return Err(LedgerStoreError::InvalidUnit(format!(
                            "negative upsert for {key}"
                        )));
                    }
                }
                RecordWrite::Delete { key } => {
                    if !state.records.contains_key(key) {
                        return Err(LedgerStoreError::InvalidUnit(format!(
                            "delete of missing record {key}"
                        )));
                    }
                }
            }
        }

        Ok(())
    }
}

impl LedgerStore for InMemoryLedgerStore {
    fn record(&self, key: StockKey) -> Result<Option<InventoryRecord>, LedgerStoreError> {
        let state = self
            .state
            .read()
            .map_err(|_| LedgerStoreError::Backend("lock poisoned".to_string()))?;
        Ok(state.records.get(&key).cloned())
    }

    fn records(&self) -> Result<Vec<InventoryRecord>, LedgerStoreError> {
        let state = self
            .state
            .read()
            .map_err(|_| LedgerStoreError::Backend("lock poisoned".to_string()))?;
        Ok(state.records.values().cloned().collect())
    }

    fn commit(&self, unit: CommitUnit) -> Result<Vec<Transaction>, LedgerStoreError> {
        let mut state = self
            .state
            .write()
            .map_err(|_| LedgerStoreError::Backend("lock poisoned".to_string()))?;

        Self::validate(&state, &unit)?;

        if self.fail_next.swap(false, Ordering::SeqCst) {
            return Err(LedgerStoreError::Backend("injected fault".to_string()));
        }

        // Validation passed; apply everything.
        let mut committed = Vec::with_capacity(unit.appends.len());
        for draft in unit.appends {
            state.references.insert(draft.reference.as_str().to_string());
            let row = Transaction::from_draft(TransactionId::new(), draft);
            state.rows.push(row.clone());
            committed.push(row);
        }

        for id in unit.removes {
            state.rows.retain(|r| r.id != id);
        }

        for write in unit.writes {
            match write {
                RecordWrite::Upsert { key, quantity, at } => {
                    state
                        .records
                        .insert(key, InventoryRecord::new(key, quantity, at));
                }
                RecordWrite::Delete { key } => {
                    state.records.remove(&key);
                }
            }
        }

        Ok(committed)
    }

    fn transaction(&self, id: TransactionId) -> Result<Option<Transaction>, LedgerStoreError> {
        let state = self
            .state
            .read()
            .map_err(|_| LedgerStoreError::Backend("lock poisoned".to_string()))?;
        Ok(state.rows.iter().find(|r| r.id == id).cloned())
    }

    fn transactions(
        &self,
        filter: &TransactionFilter,
        page: Pagination,
    ) -> Result<Vec<Transaction>, LedgerStoreError> {
        let state = self
            .state
            .read()
            .map_err(|_| LedgerStoreError::Backend("lock poisoned".to_string()))?;

        let mut rows: Vec<Transaction> = state
            .rows
            .iter()
            .filter(|r| filter.matches(r))
            .cloned()
            .collect();
        sort_newest_first(&mut rows);

        Ok(rows
            .into_iter()
            .skip(page.offset as usize)
            .take(page.limit as usize)
            .collect())
    }

    fn all_transactions(&self) -> Result<Vec<Transaction>, LedgerStoreError> {
        let state = self
            .state
            .read()
            .map_err(|_| LedgerStoreError::Backend("lock poisoned".to_string()))?;
        Ok(state.rows.clone())
    }

    fn purge_store(&self, store_id: StoreId) -> Result<PurgeReport, LedgerStoreError> {
        let mut state = self
            .state
            .write()
            .map_err(|_| LedgerStoreError::Backend("lock poisoned".to_string()))?;

        let records_before = state.records.len();
        let rows_before = state.rows.len();
        state.records.retain(|key, _| key.store_id != store_id);
        state.rows.retain(|r| r.store_id != store_id);

        Ok(PurgeReport {
            records_removed: records_before - state.records.len(),
            transactions_removed: rows_before - state.rows.len(),
        })
    }

    fn purge_product(&self, product_id: ProductId) -> Result<PurgeReport, LedgerStoreError> {
        let mut state = self
            .state
            .write()
            .map_err(|_| LedgerStoreError::Backend("lock poisoned".to_string()))?;

        let records_before = state.records.len();
        let rows_before = state.rows.len();
        state.records.retain(|key, _| key.product_id != product_id);
        state.rows.retain(|r| r.product_id != product_id);

        Ok(PurgeReport {
            records_removed: records_before - state.records.len(),
            transactions_removed: rows_before - state.rows.len(),
        })
    }
}
