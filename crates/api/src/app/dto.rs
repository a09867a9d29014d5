use axum::http::StatusCode;
use serde::Deserialize;

use stockledger_core::{Actor, ProductId, StoreId};
use stockledger_infra::ReversalMode;
use stockledger_ledger::TransactionKind;

use crate::app::errors;

// -------------------------
// Request DTOs
// -------------------------

#[derive(Debug, Deserialize)]
pub struct AdjustRequest {
    pub store_id: StoreId,
    pub product_id: ProductId,
    pub change: i64,
    pub kind: Option<String>,
    #[serde(default)]
    pub note: String,
}

#[derive(Debug, Deserialize)]
pub struct AddStockRequest {
    pub store_id: StoreId,
    pub product_id: ProductId,
    pub quantity: i64,
    #[serde(default)]
    pub note: String,
    /// Caller-supplied document number (e.g. a purchase order). When absent a
    /// receipt reference is allocated.
    pub reference: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SetLevelRequest {
    pub store_id: StoreId,
    pub product_id: ProductId,
    pub quantity: i64,
    #[serde(default)]
    pub note: String,
}

#[derive(Debug, Deserialize)]
pub struct TransferRequest {
    pub from_store_id: StoreId,
    pub to_store_id: StoreId,
    pub product_id: ProductId,
    pub quantity: i64,
    #[serde(default)]
    pub note: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateProductRequest {
    pub sku: String,
    pub name: String,
    #[serde(default)]
    pub reorder_point: i64,
}

#[derive(Debug, Deserialize)]
pub struct UpdateProductRequest {
    pub name: Option<String>,
    pub reorder_point: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct CreateStoreRequest {
    pub name: String,
    pub location: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateStoreRequest {
    pub name: Option<String>,
    /// Present-and-null clears the location; absent leaves it alone.
    #[serde(default, deserialize_with = "double_option")]
    pub location: Option<Option<String>>,
}

fn double_option<'de, D>(deserializer: D) -> Result<Option<Option<String>>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(Some(Option::deserialize(deserializer)?))
}

// -------------------------
// Query-string DTOs
// -------------------------

#[derive(Debug, Default, Deserialize)]
pub struct TransactionQuery {
    pub store_id: Option<StoreId>,
    pub product_id: Option<ProductId>,
    pub kind: Option<String>,
    /// Trailing window in days; converted to a `since` cutoff.
    pub days: Option<i64>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ReverseQuery {
    pub mode: Option<String>,
}

// -------------------------
// Parsing helpers
// -------------------------

/// An omitted kind means a manual correction.
pub fn parse_kind(kind: Option<&str>) -> Result<TransactionKind, axum::response::Response> {
    match kind {
        None => Ok(TransactionKind::Manual),
        Some(s) => s.parse().map_err(|_| {
            errors::json_error(
                StatusCode::BAD_REQUEST,
                "invalid_kind",
                format!("unknown transaction kind '{s}'"),
            )
        }),
    }
}

/// Reversal defaults to the hard-delete behavior.
pub fn parse_mode(mode: Option<&str>) -> Result<ReversalMode, axum::response::Response> {
    match mode {
        None | Some("hard") => Ok(ReversalMode::HardDelete),
        Some("compensate") => Ok(ReversalMode::Compensate),
        Some(other) => Err(errors::json_error(
            StatusCode::BAD_REQUEST,
            "invalid_mode",
            format!("mode must be 'hard' or 'compensate', got '{other}'"),
        )),
    }
}

/// Actor label taken from the `x-actor` header; missing or unreadable headers
/// collapse to the system actor.
pub fn actor_from_headers(headers: &axum::http::HeaderMap) -> Actor {
    headers
        .get("x-actor")
        .and_then(|v| v.to_str().ok())
        .map(Actor::new)
        .unwrap_or_default()
}
