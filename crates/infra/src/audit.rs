//! Consistency audit between the cached records and the ledger itself.
//!
//! The transaction log is the source of truth; the record table is a cache.
//! `audit` replays the log and reports each key whose cached quantity differs
//! from the replayed one. `repair` goes one step further and rewrites the
//! cache to match. Run at startup, or after restoring a backend from backup.

use tracing::{info, warn};

use stockledger_core::{LedgerError, LedgerResult};
use stockledger_ledger::{divergences, Divergence};

use crate::ledger_store::{CommitUnit, LedgerStore, LedgerStoreError};

/// Replay the full ledger and report keys whose cached quantity diverges.
pub fn audit<S: LedgerStore>(store: &S) -> LedgerResult<Vec<Divergence>> {
    let records = store.records().map_err(map_store_error)?;
    let rows = store.all_transactions().map_err(map_store_error)?;
    Ok(divergences(&records, &rows))
}

/// Audit and then rewrite every diverged record to its replayed quantity.
/// Keys whose replayed quantity is zero lose their record entirely, matching
/// what the write path would have produced.
pub fn repair<S: LedgerStore>(store: &S) -> LedgerResult<Vec<Divergence>> {
    let found = audit(store)?;
    if found.is_empty() {
        info!("audit clean, nothing to repair");
        return Ok(found);
    }

    let now = chrono::Utc::now();
    for divergence in &found {
        warn!(
            key = %divergence.key,
            stored = divergence.stored,
            projected = divergence.projected,
            "repairing diverged record"
        );
        let unit = if divergence.projected == 0 {
            CommitUnit::new().delete_record(divergence.key)
        } else {
            CommitUnit::new().upsert(divergence.key, divergence.projected, now)
        };
        store.commit(unit).map_err(map_store_error)?;
    }
    info!(repaired = found.len(), "audit repair complete");
    Ok(found)
}

fn map_store_error(error: LedgerStoreError) -> LedgerError {
    LedgerError::storage(error.to_string())
}
