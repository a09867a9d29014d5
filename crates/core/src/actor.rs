//! Attributed actor label.

use serde::{Deserialize, Serialize};

/// Opaque actor label attached to every ledger row.
///
/// Identity resolution is the authentication collaborator's job; the ledger
/// only records the label it was handed. Empty labels collapse to `system`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Actor(String);

impl Actor {
    pub const SYSTEM: &'static str = "system";

    pub fn new(label: impl Into<String>) -> Self {
        let label = label.into();
        if label.trim().is_empty() {
            Self(Self::SYSTEM.to_string())
        } else {
            Self(label)
        }
    }

    pub fn system() -> Self {
        Self(Self::SYSTEM.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for Actor {
    fn default() -> Self {
        Self::system()
    }
}

impl core::fmt::Display for Actor {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Actor {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for Actor {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}
