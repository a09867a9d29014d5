use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use stockledger_core::LedgerError;

pub fn ledger_error_to_response(err: LedgerError) -> axum::response::Response {
    match err {
        LedgerError::InsufficientStock { current, requested } => (
            StatusCode::UNPROCESSABLE_ENTITY,
            axum::Json(json!({
                "error": "insufficient_stock",
                "message": format!(
                    "insufficient stock: {current} on hand, {requested} requested"
                ),
                "current_quantity": current,
            })),
        )
            .into_response(),
        LedgerError::InvalidQuantity(msg) => {
            json_error(StatusCode::BAD_REQUEST, "invalid_quantity", msg)
        }
        LedgerError::InvalidOperation(msg) => {
            json_error(StatusCode::BAD_REQUEST, "invalid_operation", msg)
        }
        LedgerError::NotFound => json_error(StatusCode::NOT_FOUND, "not_found", "not found"),
        LedgerError::Conflict(msg) => json_error(StatusCode::CONFLICT, "conflict", msg),
        LedgerError::Storage(msg) => {
            tracing::error!("storage error: {msg}");
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "storage_error", msg)
        }
    }
}

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}
