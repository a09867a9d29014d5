//! The mutation engine: the single choke-point for quantity change.
//!
//! Every write to the ledger goes through here. The engine owns the pipeline
//! that every operation follows:
//!
//! ```text
//! Command (adjust / add_stock / set_level / transfer / reverse)
//!   ↓
//! 1. Validate inputs and master-data existence
//!   ↓
//! 2. Acquire the per-key lock(s) — both keys in ascending order for transfers
//!   ↓
//! 3. Read current quantity, decide the outcome (pure arithmetic + invariants)
//!   ↓
//! 4. Allocate a reference id and commit one atomic unit
//!   ↓
//! 5. On a reference collision, retry the commit with a disambiguated id
//! ```
//!
//! The per-key lock is held across the whole read-modify-write, so two
//! concurrent operations on one key can never both read the same stale
//! quantity. The store's commit unit supplies atomicity; the lock supplies
//! serialization; neither is useful without the other.
//!
//! The engine never notifies readers: the alert evaluator and the projector
//! pull from the store on their own schedule.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::Utc;
use serde::Serialize;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use stockledger_core::{
    Actor, LedgerError, LedgerResult, ProductId, StockKey, StoreId, TransactionId,
};
use stockledger_ledger::{
    InventoryRecord, Reference, ReferenceKind, Transaction, TransactionDraft, TransactionKind,
};

use crate::ledger_store::{
    CommitUnit, LedgerStore, LedgerStoreError, Pagination, TransactionFilter,
};
use crate::master_data::MasterData;

/// Attempts per logical operation before reference allocation gives up.
const MAX_REFERENCE_ATTEMPTS: u32 = 8;

/// Result of an adjust.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AdjustOutcome {
    pub new_quantity: i64,
    pub reference: Reference,
}

/// Result of a set-level. `reference` is `None` for the no-op case (no ledger
/// row is written when the target equals the current quantity).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SetLevelOutcome {
    pub old_quantity: i64,
    pub new_quantity: i64,
    pub change: i64,
    pub reference: Option<Reference>,
}

/// Result of a transfer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransferOutcome {
    pub reference: Reference,
    pub from_quantity: i64,
    pub to_quantity: i64,
}

/// How a reversal treats the original row.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReversalMode {
    /// Delete the original row and undo its effect. Leaves no trace of the
    /// reversed operation in the history.
    HardDelete,
    /// Append a negating row and keep the original, preserving the full
    /// audit trail.
    Compensate,
}

/// Result of a reversal. `reference` is the compensating row's reference in
/// `Compensate` mode, `None` for a hard delete.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReverseOutcome {
    pub mode: ReversalMode,
    pub new_quantity: i64,
    pub reference: Option<Reference>,
}

/// Per-key mutual exclusion table.
///
/// Handles are created on first use and kept for the life of the engine; the
/// key space is bounded by the (store, product) pairs actually mutated.
#[derive(Debug, Default)]
struct KeyLocks {
    table: Mutex<HashMap<StockKey, Arc<Mutex<()>>>>,
}

impl KeyLocks {
    fn handle(&self, key: StockKey) -> LedgerResult<Arc<Mutex<()>>> {
        let mut table = self
            .table
            .lock()
            .map_err(|_| LedgerError::conflict("lock table poisoned"))?;
        Ok(table.entry(key).or_default().clone())
    }
}

/// The sole entry point for quantity change.
pub struct MutationEngine<S, M> {
    store: S,
    master: M,
    locks: KeyLocks,
}

impl<S, M> MutationEngine<S, M>
where
    S: LedgerStore,
    M: MasterData,
{
    pub fn new(store: S, master: M) -> Self {
        Self {
            store,
            master,
            locks: KeyLocks::default(),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn master(&self) -> &M {
        &self.master
    }

    /// Apply a signed delta to one key.
    #[instrument(skip(self, note, actor), fields(%store_id, %product_id, change))]
    pub fn adjust(
        &self,
        store_id: StoreId,
        product_id: ProductId,
        change: i64,
        kind: TransactionKind,
        note: impl Into<String>,
        actor: Actor,
    ) -> LedgerResult<AdjustOutcome> {
        if change == 0 {
            return Err(LedgerError::invalid_quantity("change must be non-zero"));
        }
        check_assignable(kind)?;
        let key = self.checked_key(store_id, product_id)?;

        let handle = self.locks.handle(key)?;
        let _guard = lock(&handle)?;

        let current = self.quantity_of(key)?;
        let new = current
            .checked_add(change)
            .ok_or_else(|| LedgerError::invalid_quantity("quantity overflow"))?;
        if new < 0 {
            return Err(LedgerError::insufficient_stock(current, change));
        }

        let now = Utc::now();
        let note = note.into();
        let base = Reference::allocate(ReferenceKind::Adjust, now, &store_id, &product_id);
        let (reference, _) = self.commit_with_reference(base, |reference| {
            CommitUnit::new()
                .append(TransactionDraft {
                    store_id,
                    product_id,
                    change,
                    kind,
                    note: note.clone(),
                    reference,
                    actor: actor.clone(),
                    occurred_at: now,
                })
                .upsert(key, new, now)
        })?;

        info!(%reference, new_quantity = new, "stock adjusted");
        Ok(AdjustOutcome {
            new_quantity: new,
            reference,
        })
    }

    /// Receive stock into one key. A thin wrapper over the adjust pipeline
    /// with a receipt-shaped (`ADD-`) reference; callers may bring their own
    /// reference id (a supplier document number), which is committed verbatim
    /// and never retried on collision.
    #[instrument(skip(self, note, actor, reference), fields(%store_id, %product_id, quantity))]
    pub fn add_stock(
        &self,
        store_id: StoreId,
        product_id: ProductId,
        quantity: i64,
        note: impl Into<String>,
        actor: Actor,
        reference: Option<Reference>,
    ) -> LedgerResult<AdjustOutcome> {
        if quantity <= 0 {
            return Err(LedgerError::invalid_quantity("quantity must be positive"));
        }
        let key = self.checked_key(store_id, product_id)?;

        let handle = self.locks.handle(key)?;
        let _guard = lock(&handle)?;

        let current = self.quantity_of(key)?;
        let new = current
            .checked_add(quantity)
            .ok_or_else(|| LedgerError::invalid_quantity("quantity overflow"))?;

        let now = Utc::now();
        let note = note.into();
        let supplied = reference.is_some();
        let base = reference.unwrap_or_else(|| {
            Reference::allocate(ReferenceKind::AddStock, now, &store_id, &product_id)
        });
        let build = |reference: Reference| {
            CommitUnit::new()
                .append(TransactionDraft {
                    store_id,
                    product_id,
                    change: quantity,
                    kind: TransactionKind::Purchase,
                    note: note.clone(),
                    reference,
                    actor: actor.clone(),
                    occurred_at: now,
                })
                .upsert(key, new, now)
        };
        let reference = if supplied {
            // Caller-chosen ids are not ours to mutate; a collision is theirs
            // to resolve.
            self.store
                .commit(build(base.clone()))
                .map_err(map_store_error)?;
            base
        } else {
            self.commit_with_reference(base, build)?.0
        };

        info!(%reference, new_quantity = new, "stock received");
        Ok(AdjustOutcome {
            new_quantity: new,
            reference,
        })
    }

    /// Set one key to an absolute level. Equal target and current quantity
    /// refreshes the record timestamp but writes no ledger row.
    #[instrument(skip(self, note, actor), fields(%store_id, %product_id, target))]
    pub fn set_level(
        &self,
        store_id: StoreId,
        product_id: ProductId,
        target: i64,
        kind: TransactionKind,
        note: impl Into<String>,
        actor: Actor,
    ) -> LedgerResult<SetLevelOutcome> {
        if target < 0 {
            return Err(LedgerError::invalid_quantity("target cannot be negative"));
        }
        check_assignable(kind)?;
        let key = self.checked_key(store_id, product_id)?;

        let handle = self.locks.handle(key)?;
        let _guard = lock(&handle)?;

        let current = self.quantity_of(key)?;
        let change = target - current;
        let now = Utc::now();

        if change == 0 {
            self.store
                .commit(CommitUnit::new().upsert(key, current, now))
                .map_err(map_store_error)?;
            return Ok(SetLevelOutcome {
                old_quantity: current,
                new_quantity: current,
                change: 0,
                reference: None,
            });
        }

        let note = note.into();
        let base = Reference::allocate(ReferenceKind::SetLevel, now, &store_id, &product_id);
        let (reference, _) = self.commit_with_reference(base, |reference| {
            CommitUnit::new()
                .append(TransactionDraft {
                    store_id,
                    product_id,
                    change,
                    kind,
                    note: note.clone(),
                    reference,
                    actor: actor.clone(),
                    occurred_at: now,
                })
                .upsert(key, target, now)
        })?;

        info!(%reference, old_quantity = current, new_quantity = target, "stock level set");
        Ok(SetLevelOutcome {
            old_quantity: current,
            new_quantity: target,
            change,
            reference: Some(reference),
        })
    }

    /// Move quantity between two stores as one atomic pair of rows sharing a
    /// reference. Net system quantity for the product is unchanged.
    #[instrument(skip(self, note, actor), fields(%from_store_id, %to_store_id, %product_id, quantity))]
    pub fn transfer(
        &self,
        from_store_id: StoreId,
        to_store_id: StoreId,
        product_id: ProductId,
        quantity: i64,
        note: impl Into<String>,
        actor: Actor,
    ) -> LedgerResult<TransferOutcome> {
        if from_store_id == to_store_id {
            return Err(LedgerError::invalid_operation(
                "cannot transfer a store to itself",
            ));
        }
        if quantity <= 0 {
            return Err(LedgerError::invalid_quantity(
                "transfer quantity must be positive",
            ));
        }
        let from_key = self.checked_key(from_store_id, product_id)?;
        let to_key = self.checked_key(to_store_id, product_id)?;

        // Fixed global acquisition order keeps opposite-direction transfers
        // from deadlocking.
        let (first, second) = if from_key < to_key {
            (from_key, to_key)
        } else {
            (to_key, from_key)
        };
        let first_handle = self.locks.handle(first)?;
        let second_handle = self.locks.handle(second)?;
        let _first_guard = lock(&first_handle)?;
        let _second_guard = lock(&second_handle)?;

        let source = self.quantity_of(from_key)?;
        if source < quantity {
            return Err(LedgerError::insufficient_stock(source, quantity));
        }
        let destination = self.quantity_of(to_key)?;
        let new_source = source - quantity;
        let new_destination = destination
            .checked_add(quantity)
            .ok_or_else(|| LedgerError::invalid_quantity("quantity overflow"))?;

        let now = Utc::now();
        let note = note.into();
        let base = Reference::allocate(ReferenceKind::Transfer, now, &from_store_id, &to_store_id);
        let (reference, _) = self.commit_with_reference(base, |reference| {
            let unit = CommitUnit::new()
                .append(TransactionDraft {
                    store_id: from_store_id,
                    product_id,
                    change: -quantity,
                    kind: TransactionKind::TransferOut,
                    note: format!("{note} (OUT)"),
                    reference: reference.clone(),
                    actor: actor.clone(),
                    occurred_at: now,
                })
                .append(TransactionDraft {
                    store_id: to_store_id,
                    product_id,
                    change: quantity,
                    kind: TransactionKind::TransferIn,
                    note: format!("{note} (IN)"),
                    reference,
                    actor: actor.clone(),
                    occurred_at: now,
                });
            let unit = if new_source == 0 {
                unit.delete_record(from_key)
            } else {
                unit.upsert(from_key, new_source, now)
            };
            unit.upsert(to_key, new_destination, now)
        })?;

        info!(%reference, from_quantity = new_source, to_quantity = new_destination, "stock transferred");
        Ok(TransferOutcome {
            reference,
            from_quantity: new_source,
            to_quantity: new_destination,
        })
    }

    /// Undo one committed row. `HardDelete` removes it outright (matching the
    /// system this replaces); `Compensate` appends a negating row instead and
    /// keeps the history complete.
    #[instrument(skip(self, actor), fields(%transaction_id, ?mode))]
    pub fn reverse(
        &self,
        transaction_id: TransactionId,
        actor: Actor,
        mode: ReversalMode,
    ) -> LedgerResult<ReverseOutcome> {
        // The first lookup only tells us which key to lock.
        let key = self
            .store
            .transaction(transaction_id)
            .map_err(map_store_error)?
            .ok_or(LedgerError::NotFound)?
            .key();

        let handle = self.locks.handle(key)?;
        let _guard = lock(&handle)?;

        // Re-fetch under the lock: a concurrent reversal may have removed the
        // row between the lookup above and the lock acquisition, and a stale
        // copy would let the row be reversed twice.
        let original = self
            .store
            .transaction(transaction_id)
            .map_err(map_store_error)?
            .ok_or(LedgerError::NotFound)?;
        debug_assert_eq!(original.key(), key);

        let current = self.quantity_of(key)?;
        let new = current - original.change;
        if new < 0 {
            return Err(LedgerError::insufficient_stock(current, -original.change));
        }

        let now = Utc::now();
        match mode {
            ReversalMode::HardDelete => {
                let unit = CommitUnit::new().remove(transaction_id);
                // A zero result implies current > 0 (committed rows are never
                // zero-change), so the record exists and can be deleted.
                let unit = if new == 0 {
                    unit.delete_record(key)
                } else {
                    unit.upsert(key, new, now)
                };
                self.store.commit(unit).map_err(map_store_error)?;

                info!(%transaction_id, new_quantity = new, "transaction hard-reversed");
                Ok(ReverseOutcome {
                    mode,
                    new_quantity: new,
                    reference: None,
                })
            }
            ReversalMode::Compensate => {
                let base = Reference::allocate(
                    ReferenceKind::Reversal,
                    now,
                    &key.store_id,
                    &key.product_id,
                );
                let note = format!(
                    "reversal of {} ({})",
                    transaction_id, original.reference
                );
                let (reference, _) = self.commit_with_reference(base, |reference| {
                    CommitUnit::new()
                        .append(TransactionDraft {
                            store_id: key.store_id,
                            product_id: key.product_id,
                            change: -original.change,
                            kind: original.kind,
                            note: note.clone(),
                            reference,
                            actor: actor.clone(),
                            occurred_at: now,
                        })
                        .upsert(key, new, now)
                })?;

                info!(%transaction_id, %reference, new_quantity = new, "transaction compensated");
                Ok(ReverseOutcome {
                    mode,
                    new_quantity: new,
                    reference: Some(reference),
                })
            }
        }
    }

    /// Current quantity of a key (0 when no record exists).
    pub fn quantity(&self, store_id: StoreId, product_id: ProductId) -> LedgerResult<i64> {
        self.quantity_of(StockKey::new(store_id, product_id))
    }

    pub fn record(
        &self,
        store_id: StoreId,
        product_id: ProductId,
    ) -> LedgerResult<Option<InventoryRecord>> {
        self.store
            .record(StockKey::new(store_id, product_id))
            .map_err(map_store_error)
    }

    pub fn transaction(&self, id: TransactionId) -> LedgerResult<Option<Transaction>> {
        self.store.transaction(id).map_err(map_store_error)
    }

    pub fn list_transactions(
        &self,
        filter: &TransactionFilter,
        page: Pagination,
    ) -> LedgerResult<Vec<Transaction>> {
        self.store.transactions(filter, page).map_err(map_store_error)
    }

    fn quantity_of(&self, key: StockKey) -> LedgerResult<i64> {
        self.store.quantity(key).map_err(map_store_error)
    }

    /// Existence checks against master data; the ledger does not validate
    /// beyond that.
    fn checked_key(&self, store_id: StoreId, product_id: ProductId) -> LedgerResult<StockKey> {
        if self.master.store(store_id).is_none() {
            return Err(LedgerError::NotFound);
        }
        if self.master.product(product_id).is_none() {
            return Err(LedgerError::NotFound);
        }
        Ok(StockKey::new(store_id, product_id))
    }

    /// Commit a unit built from a candidate reference, retrying with a
    /// disambiguating suffix when the store reports the reference already
    /// committed (clock-resolution collision on the same key).
    fn commit_with_reference(
        &self,
        base: Reference,
        build: impl Fn(Reference) -> CommitUnit,
    ) -> LedgerResult<(Reference, Vec<Transaction>)> {
        let mut candidate = base.clone();
        for attempt in 0..MAX_REFERENCE_ATTEMPTS {
            match self.store.commit(build(candidate.clone())) {
                Ok(rows) => return Ok((candidate, rows)),
                Err(LedgerStoreError::DuplicateReference(reference)) => {
                    warn!(%reference, attempt, "reference collision, retrying with suffix");
                    candidate = base.with_suffix(&short_suffix());
                }
                Err(other) => return Err(map_store_error(other)),
            }
        }
        Err(LedgerError::conflict(
            "reference allocation exhausted its retries",
        ))
    }
}

fn check_assignable(kind: TransactionKind) -> LedgerResult<()> {
    if kind.is_assignable() {
        Ok(())
    } else {
        Err(LedgerError::invalid_operation(
            "transfer rows are only written by the transfer operation",
        ))
    }
}

fn lock(handle: &Arc<Mutex<()>>) -> LedgerResult<std::sync::MutexGuard<'_, ()>> {
    handle
        .lock()
        .map_err(|_| LedgerError::conflict("key lock poisoned"))
}

fn short_suffix() -> String {
    let mut simple = Uuid::new_v4().simple().to_string();
    simple.truncate(6);
    simple
}

fn map_store_error(error: LedgerStoreError) -> LedgerError {
    match error {
        LedgerStoreError::Conflict(msg) => LedgerError::conflict(msg),
        LedgerStoreError::DuplicateReference(reference) => {
            LedgerError::conflict(format!("reference '{reference}' already committed"))
        }
        LedgerStoreError::RowNotFound(_) => LedgerError::NotFound,
        LedgerStoreError::InvalidUnit(msg) | LedgerStoreError::Backend(msg) => {
            LedgerError::storage(msg)
        }
    }
}
