//! Shared kernel: identifiers, the stock key, and the error taxonomy.
//!
//! Everything here is deterministic and IO-free; the ledger, engine, and API
//! crates all build on these types.

pub mod actor;
pub mod error;
pub mod id;
pub mod key;

pub use actor::Actor;
pub use error::{LedgerError, LedgerResult};
pub use id::{ProductId, StoreId, TransactionId};
pub use key::StockKey;
