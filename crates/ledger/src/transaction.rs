//! Immutable ledger rows.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockledger_core::{Actor, LedgerError, ProductId, StockKey, StoreId, TransactionId};

use crate::reference::Reference;

/// Classification tag carried by every ledger row.
///
/// Transfers are recorded as a directional pair (`transfer_out` at the source,
/// `transfer_in` at the destination) sharing one reference id.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionKind {
    Manual,
    Sale,
    Purchase,
    Return,
    Damage,
    Theft,
    TransferOut,
    TransferIn,
}

impl TransactionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Manual => "manual",
            Self::Sale => "sale",
            Self::Purchase => "purchase",
            Self::Return => "return",
            Self::Damage => "damage",
            Self::Theft => "theft",
            Self::TransferOut => "transfer_out",
            Self::TransferIn => "transfer_in",
        }
    }

    /// Kinds a caller may attach to an adjust/set-level request. The transfer
    /// pair is only ever written by the transfer operation itself.
    pub fn is_assignable(&self) -> bool {
        !matches!(self, Self::TransferOut | Self::TransferIn)
    }
}

impl core::fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl core::str::FromStr for TransactionKind {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "manual" => Ok(Self::Manual),
            "sale" => Ok(Self::Sale),
            "purchase" => Ok(Self::Purchase),
            "return" => Ok(Self::Return),
            "damage" => Ok(Self::Damage),
            "theft" => Ok(Self::Theft),
            "transfer_out" => Ok(Self::TransferOut),
            "transfer_in" => Ok(Self::TransferIn),
            other => Err(LedgerError::invalid_operation(format!(
                "unknown transaction kind '{other}'"
            ))),
        }
    }
}

/// A ledger row that has not yet been committed.
///
/// Drafts carry everything except the `TransactionId`, which the ledger store
/// assigns at commit time (mirroring how sequence numbers are assigned by an
/// append-only store, never by the caller).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionDraft {
    pub store_id: StoreId,
    pub product_id: ProductId,
    /// Signed quantity delta. Never zero for a committed row.
    pub change: i64,
    pub kind: TransactionKind,
    pub note: String,
    pub reference: Reference,
    pub actor: Actor,
    pub occurred_at: DateTime<Utc>,
}

impl TransactionDraft {
    pub fn key(&self) -> StockKey {
        StockKey::new(self.store_id, self.product_id)
    }
}

/// A committed, immutable ledger row.
///
/// Once written a transaction is never mutated; it can only be removed by the
/// hard-reversal path, or negated by a compensating row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: TransactionId,
    pub store_id: StoreId,
    pub product_id: ProductId,
    pub change: i64,
    pub kind: TransactionKind,
    pub note: String,
    pub reference: Reference,
    pub actor: Actor,
    pub created_at: DateTime<Utc>,
}

impl Transaction {
    pub fn key(&self) -> StockKey {
        StockKey::new(self.store_id, self.product_id)
    }

    /// Commit a draft with a store-assigned id.
    pub fn from_draft(id: TransactionId, draft: TransactionDraft) -> Self {
        Self {
            id,
            store_id: draft.store_id,
            product_id: draft.product_id,
            change: draft.change,
            kind: draft.kind,
            note: draft.note,
            reference: draft.reference,
            actor: draft.actor,
            created_at: draft.occurred_at,
        }
    }
}
