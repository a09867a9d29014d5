//! Quantity replay over the transaction history.
//!
//! Pure functions: given ledger rows they recompute quantities independently
//! of the cached `InventoryRecord`s, for startup consistency verification and
//! repair. Stored and projected values diverging means a prior crash landed
//! mid-operation; the atomic commit contract makes it impossible otherwise.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use stockledger_core::StockKey;

use crate::record::InventoryRecord;
use crate::transaction::Transaction;

/// Replay the rows of a single key. Callers pass pre-filtered rows; keys are
/// not checked here.
pub fn projected_quantity<'a>(rows: impl IntoIterator<Item = &'a Transaction>) -> i64 {
    rows.into_iter().map(|t| t.change).sum()
}

/// Replay the whole ledger into per-key quantities.
///
/// Keys whose rows sum to zero are retained (a record may legitimately be
/// stored at zero), so the caller can compare against stored records without
/// losing those keys.
pub fn project_all<'a>(rows: impl IntoIterator<Item = &'a Transaction>) -> BTreeMap<StockKey, i64> {
    let mut out = BTreeMap::new();
    for row in rows {
        *out.entry(row.key()).or_insert(0) += row.change;
    }
    out
}

/// One stored-vs-projected mismatch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Divergence {
    pub key: StockKey,
    /// Quantity held by the stored record (0 when the record is absent).
    pub stored: i64,
    /// Quantity recomputed from the transaction history.
    pub projected: i64,
}

/// Compare stored records against replayed history over the union of keys.
///
/// A key diverges when the stored quantity (0 for a missing record) differs
/// from the replayed sum. An absent record with a zero sum is consistent.
pub fn divergences(records: &[InventoryRecord], rows: &[Transaction]) -> Vec<Divergence> {
    let projected = project_all(rows);

    let mut stored: BTreeMap<StockKey, i64> = BTreeMap::new();
    for record in records {
        stored.insert(record.key(), record.quantity);
    }

    let mut keys: Vec<StockKey> = stored.keys().chain(projected.keys()).copied().collect();
    keys.sort();
    keys.dedup();

    keys.into_iter()
        .filter_map(|key| {
            let s = stored.get(&key).copied().unwrap_or(0);
            let p = projected.get(&key).copied().unwrap_or(0);
            (s != p).then_some(Divergence {
                key,
                stored: s,
                projected: p,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use proptest::prelude::*;

    use stockledger_core::{Actor, ProductId, StoreId, TransactionId};

    use super::*;
    use crate::reference::{Reference, ReferenceKind};
    use crate::transaction::TransactionKind;

    fn row(key: StockKey, change: i64) -> Transaction {
        Transaction {
            id: TransactionId::new(),
            store_id: key.store_id,
            product_id: key.product_id,
            change,
            kind: TransactionKind::Manual,
            note: String::new(),
            reference: Reference::allocate(
                ReferenceKind::Adjust,
                Utc::now(),
                &key.store_id,
                &key.product_id,
            ),
            actor: Actor::system(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn empty_history_projects_to_zero() {
        assert_eq!(projected_quantity([]), 0);
        assert!(project_all([]).is_empty());
    }

    #[test]
    fn records_without_history_diverge() {
        let key = StockKey::new(StoreId::new(), ProductId::new());
        let records = vec![InventoryRecord::new(key, 7, Utc::now())];

        let found = divergences(&records, &[]);
        assert_eq!(
            found,
            vec![Divergence {
                key,
                stored: 7,
                projected: 0
            }]
        );
    }

    #[test]
    fn matching_record_and_history_do_not_diverge() {
        let key = StockKey::new(StoreId::new(), ProductId::new());
        let rows = vec![row(key, 10), row(key, -4)];
        let records = vec![InventoryRecord::new(key, 6, Utc::now())];

        assert!(divergences(&records, &rows).is_empty());
    }

    #[test]
    fn history_without_record_diverges_unless_zero_sum() {
        let key = StockKey::new(StoreId::new(), ProductId::new());

        let balanced = vec![row(key, 5), row(key, -5)];
        assert!(divergences(&[], &balanced).is_empty());

        let unbalanced = vec![row(key, 5), row(key, -2)];
        let found = divergences(&[], &unbalanced);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].projected, 3);
        assert_eq!(found[0].stored, 0);
    }

    proptest! {
        #[test]
        fn projection_is_the_sum_of_changes(changes in proptest::collection::vec(-1000i64..1000, 0..64)) {
            let key = StockKey::new(StoreId::new(), ProductId::new());
            let rows: Vec<Transaction> = changes.iter().map(|&c| row(key, c)).collect();

            prop_assert_eq!(projected_quantity(&rows), changes.iter().sum::<i64>());
        }

        #[test]
        fn project_all_partitions_by_key(
            a in proptest::collection::vec(-100i64..100, 0..32),
            b in proptest::collection::vec(-100i64..100, 0..32),
        ) {
            let ka = StockKey::new(StoreId::new(), ProductId::new());
            let kb = StockKey::new(StoreId::new(), ProductId::new());

            let rows: Vec<Transaction> = a
                .iter()
                .map(|&c| row(ka, c))
                .chain(b.iter().map(|&c| row(kb, c)))
                .collect();

            let projected = project_all(&rows);
            prop_assert_eq!(projected.get(&ka).copied().unwrap_or(0), a.iter().sum::<i64>());
            prop_assert_eq!(projected.get(&kb).copied().unwrap_or(0), b.iter().sum::<i64>());
        }
    }
}
