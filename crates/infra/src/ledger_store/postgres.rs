//! Postgres-backed ledger store.
//!
//! Same unit semantics as the in-memory store, enforced at the database level:
//! every [`CommitUnit`] runs inside one SQL transaction, so a half-applied unit
//! can never be observed or survive a crash.
//!
//! ## Expected schema
//!
//! ```sql
//! CREATE TABLE inventory_records (
//!     store_id     UUID        NOT NULL,
//!     product_id   UUID        NOT NULL,
//!     quantity     BIGINT      NOT NULL CHECK (quantity >= 0),
//!     last_updated TIMESTAMPTZ NOT NULL,
//!     PRIMARY KEY (store_id, product_id)
//! );
//!
//! CREATE TABLE transactions (
//!     id         UUID        PRIMARY KEY,
//!     store_id   UUID        NOT NULL,
//!     product_id UUID        NOT NULL,
//!     change     BIGINT      NOT NULL CHECK (change <> 0),
//!     kind       TEXT        NOT NULL,
//!     note       TEXT        NOT NULL,
//!     reference  TEXT        NOT NULL,
//!     actor      TEXT        NOT NULL,
//!     created_at TIMESTAMPTZ NOT NULL
//! );
//!
//! -- Cross-unit reference uniqueness: one row per allocated reference. The
//! -- transaction rows of one unit share a reference, so the uniqueness lives
//! -- here rather than on transactions.reference.
//! CREATE TABLE ledger_references (
//!     reference TEXT PRIMARY KEY
//! );
//! ```
//!
//! ## Error mapping
//!
//! | PostgreSQL error | `LedgerStoreError` |
//! |------------------|--------------------|
//! | `23505` on ledger_references | `DuplicateReference` (allocator retries) |
//! | `23514` (check violation)    | `InvalidUnit` |
//! | `40001` (serialization)      | `Conflict` (caller retries) |
//! | anything else                | `Backend` |

use std::future::Future;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Row, Transaction as PgTransaction};
use tokio::runtime::Handle;
use tracing::instrument;
use uuid::Uuid;

use stockledger_core::{Actor, ProductId, StockKey, StoreId, TransactionId};
use stockledger_ledger::{InventoryRecord, Reference, Transaction, TransactionKind};

use super::query::{Pagination, TransactionFilter};
use super::r#trait::{CommitUnit, LedgerStore, LedgerStoreError, PurgeReport, RecordWrite};

/// Postgres-backed ledger store.
///
/// Implements the sync [`LedgerStore`] trait by driving each query on the
/// runtime captured at construction, so the mutation engine runs against it
/// unchanged. Trait calls made from inside a runtime hop onto a blocking
/// thread first, which requires the multi-thread flavor.
#[derive(Debug, Clone)]
pub struct PostgresLedgerStore {
    pool: PgPool,
    handle: Handle,
}

impl PostgresLedgerStore {
    /// Build a store over an existing pool. Must be called from within the
    /// Tokio runtime that owns the pool.
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            handle: Handle::current(),
        }
    }

    fn wait<F: Future>(&self, fut: F) -> F::Output {
        if Handle::try_current().is_ok() {
            tokio::task::block_in_place(|| self.handle.block_on(fut))
        } else {
            self.handle.block_on(fut)
        }
    }

    #[instrument(skip(self), fields(key = %key))]
    async fn record_async(
        &self,
        key: StockKey,
    ) -> Result<Option<InventoryRecord>, LedgerStoreError> {
        let row = sqlx::query(
            "SELECT store_id, product_id, quantity, last_updated \
             FROM inventory_records WHERE store_id = $1 AND product_id = $2",
        )
        .bind(key.store_id.as_uuid())
        .bind(key.product_id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        row.map(record_from_row).transpose()
    }

    async fn records_async(&self) -> Result<Vec<InventoryRecord>, LedgerStoreError> {
        let rows = sqlx::query(
            "SELECT store_id, product_id, quantity, last_updated FROM inventory_records",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        rows.into_iter().map(record_from_row).collect()
    }

    /// Apply one atomic unit inside a single SQL transaction.
    #[instrument(skip(self, unit), fields(appends = unit.appends.len(), removes = unit.removes.len()))]
    async fn commit_async(&self, unit: CommitUnit) -> Result<Vec<Transaction>, LedgerStoreError> {
        if unit.is_empty() {
            return Err(LedgerStoreError::InvalidUnit("empty unit".to_string()));
        }
        for draft in &unit.appends {
            if draft.change == 0 {
                return Err(LedgerStoreError::InvalidUnit("zero-change row".to_string()));
            }
        }

        let mut tx = self.pool.begin().await.map_err(map_sqlx_error)?;

        // One uniqueness row per distinct reference in the unit.
        let mut seen: Vec<&str> = Vec::new();
        for draft in &unit.appends {
            let reference = draft.reference.as_str();
            if seen.contains(&reference) {
                continue;
            }
            seen.push(reference);
            sqlx::query("INSERT INTO ledger_references (reference) VALUES ($1)")
                .bind(reference)
                .execute(&mut *tx)
                .await
                .map_err(|e| map_reference_error(e, reference))?;
        }

        let mut committed = Vec::with_capacity(unit.appends.len());
        for draft in unit.appends {
            let row = Transaction::from_draft(TransactionId::new(), draft);
            sqlx::query(
                "INSERT INTO transactions \
                 (id, store_id, product_id, change, kind, note, reference, actor, created_at) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
            )
            .bind(row.id.as_uuid())
            .bind(row.store_id.as_uuid())
            .bind(row.product_id.as_uuid())
            .bind(row.change)
            .bind(row.kind.as_str())
            .bind(&row.note)
            .bind(row.reference.as_str())
            .bind(row.actor.as_str())
            .bind(row.created_at)
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx_error)?;
            committed.push(row);
        }

        for id in unit.removes {
            let result = sqlx::query("DELETE FROM transactions WHERE id = $1")
                .bind(id.as_uuid())
                .execute(&mut *tx)
                .await
                .map_err(map_sqlx_error)?;
            if result.rows_affected() == 0 {
                return Err(LedgerStoreError::RowNotFound(id));
            }
        }

        for write in unit.writes {
            apply_record_write(&mut tx, write).await?;
        }

        tx.commit().await.map_err(map_sqlx_error)?;
        Ok(committed)
    }

    async fn transaction_async(
        &self,
        id: TransactionId,
    ) -> Result<Option<Transaction>, LedgerStoreError> {
        let row = sqlx::query(
            "SELECT id, store_id, product_id, change, kind, note, reference, actor, created_at \
             FROM transactions WHERE id = $1",
        )
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        row.map(transaction_from_row).transpose()
    }

    async fn transactions_async(
        &self,
        filter: &TransactionFilter,
        page: Pagination,
    ) -> Result<Vec<Transaction>, LedgerStoreError> {
        let rows = sqlx::query(
            "SELECT id, store_id, product_id, change, kind, note, reference, actor, created_at \
             FROM transactions \
             WHERE ($1::uuid IS NULL OR store_id = $1) \
               AND ($2::uuid IS NULL OR product_id = $2) \
               AND ($3::text IS NULL OR kind = $3) \
               AND ($4::timestamptz IS NULL OR created_at >= $4) \
             ORDER BY created_at DESC, id DESC \
             LIMIT $5 OFFSET $6",
        )
        .bind(filter.store_id.map(|s| *s.as_uuid()))
        .bind(filter.product_id.map(|p| *p.as_uuid()))
        .bind(filter.kind.map(|k| k.as_str()))
        .bind(filter.since)
        .bind(i64::from(page.limit))
        .bind(i64::from(page.offset))
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        rows.into_iter().map(transaction_from_row).collect()
    }

    async fn all_transactions_async(&self) -> Result<Vec<Transaction>, LedgerStoreError> {
        let rows = sqlx::query(
            "SELECT id, store_id, product_id, change, kind, note, reference, actor, created_at \
             FROM transactions ORDER BY created_at ASC, id ASC",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        rows.into_iter().map(transaction_from_row).collect()
    }

    #[instrument(skip(self), fields(store_id = %store_id))]
    async fn purge_store_async(
        &self,
        store_id: StoreId,
    ) -> Result<PurgeReport, LedgerStoreError> {
        let mut tx = self.pool.begin().await.map_err(map_sqlx_error)?;

        let records = sqlx::query("DELETE FROM inventory_records WHERE store_id = $1")
            .bind(store_id.as_uuid())
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx_error)?;
        let rows = sqlx::query("DELETE FROM transactions WHERE store_id = $1")
            .bind(store_id.as_uuid())
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx_error)?;

        tx.commit().await.map_err(map_sqlx_error)?;
        Ok(PurgeReport {
            records_removed: records.rows_affected() as usize,
            transactions_removed: rows.rows_affected() as usize,
        })
    }

    #[instrument(skip(self), fields(product_id = %product_id))]
    async fn purge_product_async(
        &self,
        product_id: ProductId,
    ) -> Result<PurgeReport, LedgerStoreError> {
        let mut tx = self.pool.begin().await.map_err(map_sqlx_error)?;

        let records = sqlx::query("DELETE FROM inventory_records WHERE product_id = $1")
            .bind(product_id.as_uuid())
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx_error)?;
        let rows = sqlx::query("DELETE FROM transactions WHERE product_id = $1")
            .bind(product_id.as_uuid())
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx_error)?;

        tx.commit().await.map_err(map_sqlx_error)?;
        Ok(PurgeReport {
            records_removed: records.rows_affected() as usize,
            transactions_removed: rows.rows_affected() as usize,
        })
    }
}

impl LedgerStore for PostgresLedgerStore {
    fn record(&self, key: StockKey) -> Result<Option<InventoryRecord>, LedgerStoreError> {
        self.wait(self.record_async(key))
    }

    fn records(&self) -> Result<Vec<InventoryRecord>, LedgerStoreError> {
        self.wait(self.records_async())
    }

    fn commit(&self, unit: CommitUnit) -> Result<Vec<Transaction>, LedgerStoreError> {
        self.wait(self.commit_async(unit))
    }

    fn transaction(&self, id: TransactionId) -> Result<Option<Transaction>, LedgerStoreError> {
        self.wait(self.transaction_async(id))
    }

    fn transactions(
        &self,
        filter: &TransactionFilter,
        page: Pagination,
    ) -> Result<Vec<Transaction>, LedgerStoreError> {
        self.wait(self.transactions_async(filter, page))
    }

    fn all_transactions(&self) -> Result<Vec<Transaction>, LedgerStoreError> {
        self.wait(self.all_transactions_async())
    }

    fn purge_store(&self, store_id: StoreId) -> Result<PurgeReport, LedgerStoreError> {
        self.wait(self.purge_store_async(store_id))
    }

    fn purge_product(&self, product_id: ProductId) -> Result<PurgeReport, LedgerStoreError> {
        self.wait(self.purge_product_async(product_id))
    }
}

async fn apply_record_write(
    tx: &mut PgTransaction<'_, Postgres>,
    write: RecordWrite,
) -> Result<(), LedgerStoreError> {
    match write {
        RecordWrite::Upsert { key, quantity, at } => {
            if quantity < 0 {
                return Err(LedgerStoreError::InvalidUnit(format!(
                    "negative upsert for {key}"
                )));
            }
            sqlx::query(
                "INSERT INTO inventory_records (store_id, product_id, quantity, last_updated) \
                 VALUES ($1, $2, $3, $4) \
                 ON CONFLICT (store_id, product_id) \
                 DO UPDATE SET quantity = EXCLUDED.quantity, last_updated = EXCLUDED.last_updated",
            )
            .bind(key.store_id.as_uuid())
            .bind(key.product_id.as_uuid())
            .bind(quantity)
            .bind(at)
            .execute(&mut **tx)
            .await
            .map_err(map_sqlx_error)?;
        }
        RecordWrite::Delete { key } => {
            let result = sqlx::query(
                "DELETE FROM inventory_records WHERE store_id = $1 AND product_id = $2",
            )
            .bind(key.store_id.as_uuid())
            .bind(key.product_id.as_uuid())
            .execute(&mut **tx)
            .await
            .map_err(map_sqlx_error)?;
            if result.rows_affected() == 0 {
                return Err(LedgerStoreError::InvalidUnit(format!(
                    "delete of missing record {key}"
                )));
            }
        }
    }
    Ok(())
}

fn record_from_row(row: sqlx::postgres::PgRow) -> Result<InventoryRecord, LedgerStoreError> {
    let store_id: Uuid = row.try_get("store_id").map_err(map_sqlx_error)?;
    let product_id: Uuid = row.try_get("product_id").map_err(map_sqlx_error)?;
    let quantity: i64 = row.try_get("quantity").map_err(map_sqlx_error)?;
    let last_updated: DateTime<Utc> = row.try_get("last_updated").map_err(map_sqlx_error)?;

    Ok(InventoryRecord {
        store_id: StoreId::from_uuid(store_id),
        product_id: ProductId::from_uuid(product_id),
        quantity,
        last_updated,
    })
}

fn transaction_from_row(row: sqlx::postgres::PgRow) -> Result<Transaction, LedgerStoreError> {
    let id: Uuid = row.try_get("id").map_err(map_sqlx_error)?;
    let store_id: Uuid = row.try_get("store_id").map_err(map_sqlx_error)?;
    let product_id: Uuid = row.try_get("product_id").map_err(map_sqlx_error)?;
    let change: i64 = row.try_get("change").map_err(map_sqlx_error)?;
    let kind: String = row.try_get("kind").map_err(map_sqlx_error)?;
    let note: String = row.try_get("note").map_err(map_sqlx_error)?;
    let reference: String = row.try_get("reference").map_err(map_sqlx_error)?;
    let actor: String = row.try_get("actor").map_err(map_sqlx_error)?;
    let created_at: DateTime<Utc> = row.try_get("created_at").map_err(map_sqlx_error)?;

    let kind = TransactionKind::from_str(&kind)
        .map_err(|_| LedgerStoreError::Backend(format!("corrupt kind '{kind}'")))?;

    Ok(Transaction {
        id: TransactionId::from_uuid(id),
        store_id: StoreId::from_uuid(store_id),
        product_id: ProductId::from_uuid(product_id),
        change,
        kind,
        note,
        reference: Reference::from(reference),
        actor: Actor::new(actor),
        created_at,
    })
}

fn map_reference_error(error: sqlx::Error, reference: &str) -> LedgerStoreError {
    if let sqlx::Error::Database(ref db) = error {
        if db.code().as_deref() == Some("23505") {
            return LedgerStoreError::DuplicateReference(reference.to_string());
        }
    }
    map_sqlx_error(error)
}

fn map_sqlx_error(error: sqlx::Error) -> LedgerStoreError {
    match &error {
        sqlx::Error::Database(db) => match db.code().as_deref() {
            Some("40001") => LedgerStoreError::Conflict(db.message().to_string()),
            Some("23514") => LedgerStoreError::InvalidUnit(db.message().to_string()),
            _ => LedgerStoreError::Backend(db.message().to_string()),
        },
        _ => LedgerStoreError::Backend(error.to_string()),
    }
}
