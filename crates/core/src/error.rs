//! Ledger error model.

use thiserror::Error;

/// Result type used across the ledger and engine layers.
pub type LedgerResult<T> = Result<T, LedgerError>;

/// Failure taxonomy for the mutation path.
///
/// Every variant except `Conflict` is terminal for the request that produced
/// it; `Conflict` signals a detected concurrent mutation and the caller may
/// retry the same operation. All mutation failures leave stored state exactly
/// as it was before the call.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LedgerError {
    /// The operation would drive a quantity below zero. Carries the quantity
    /// observed at decision time so the caller can act on it.
    #[error("insufficient stock: have {current}, requested change {requested}")]
    InsufficientStock { current: i64, requested: i64 },

    /// A negative target level or non-positive transfer amount.
    #[error("invalid quantity: {0}")]
    InvalidQuantity(String),

    /// Degenerate input such as a self-transfer.
    #[error("invalid operation: {0}")]
    InvalidOperation(String),

    /// Unknown transaction, store, or product.
    #[error("not found")]
    NotFound,

    /// Concurrent mutation of the same key was detected; retryable.
    #[error("conflict: {0}")]
    Conflict(String),

    /// The durability layer failed. Never swallowed, always surfaced.
    #[error("storage failure: {0}")]
    Storage(String),
}

impl LedgerError {
    pub fn insufficient_stock(current: i64, requested: i64) -> Self {
        Self::InsufficientStock { current, requested }
    }

    pub fn invalid_quantity(msg: impl Into<String>) -> Self {
        Self::InvalidQuantity(msg.into())
    }

    pub fn invalid_operation(msg: impl Into<String>) -> Self {
        Self::InvalidOperation(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn storage(msg: impl Into<String>) -> Self {
        Self::Storage(msg.into())
    }

    pub fn not_found() -> Self {
        Self::NotFound
    }
}
