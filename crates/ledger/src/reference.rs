//! Reference identifier allocation.
//!
//! Every logical operation gets exactly one reference id; the two rows of a
//! transfer share it. The format is `PREFIX-YYYYMMDDHHMMSS-<a>-<b>`: an
//! operation-kind prefix, a second-resolution timestamp, and the two ids the
//! operation touched — sortable, greppable, human-diagnosable. Clock-resolution
//! collisions are handled by the caller retrying with a disambiguating suffix.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Operation kind encoded in the reference prefix.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReferenceKind {
    Adjust,
    AddStock,
    SetLevel,
    Transfer,
    Reversal,
}

impl ReferenceKind {
    pub fn prefix(&self) -> &'static str {
        match self {
            Self::Adjust => "TXN",
            Self::AddStock => "ADD",
            Self::SetLevel => "ADJ",
            Self::Transfer => "TRANSFER",
            Self::Reversal => "RVS",
        }
    }
}

/// A reference id grouping the ledger rows of one logical operation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Reference(String);

impl Reference {
    /// Allocate a reference for an operation over two ids.
    ///
    /// Adjust and set-level pass (store, product); transfer passes
    /// (from_store, to_store) — matching the shapes the rest of the tooling
    /// greps for.
    pub fn allocate(
        kind: ReferenceKind,
        at: DateTime<Utc>,
        a: &impl core::fmt::Display,
        b: &impl core::fmt::Display,
    ) -> Self {
        Self(format!(
            "{}-{}-{}-{}",
            kind.prefix(),
            at.format("%Y%m%d%H%M%S"),
            a,
            b
        ))
    }

    /// Disambiguated variant used when the store reports the base reference
    /// already committed (same key, same clock second).
    pub fn with_suffix(&self, suffix: &str) -> Self {
        Self(format!("{}-{}", self.0, suffix))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Display for Reference {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for Reference {
    fn from(value: String) -> Self {
        Self(value)
    }
}
