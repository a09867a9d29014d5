//! Low-stock alerts and reorder suggestions.

use std::sync::Arc;

use axum::{
    extract::Extension,
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};

use crate::app::errors::ledger_error_to_response;
use crate::app::AppServices;

pub fn router() -> Router {
    Router::new()
        .route("/low-stock", get(low_stock))
        .route("/reorder-suggestions", get(reorder_suggestions))
}

async fn low_stock(Extension(services): Extension<Arc<AppServices>>) -> axum::response::Response {
    match services.alerts.low_stock(&services.alert_policy) {
        Ok(alerts) => (
            StatusCode::OK,
            Json(serde_json::json!({
                "count": alerts.len(),
                "alerts": alerts,
            })),
        )
            .into_response(),
        Err(e) => ledger_error_to_response(e),
    }
}

async fn reorder_suggestions(
    Extension(services): Extension<Arc<AppServices>>,
) -> axum::response::Response {
    match services.alerts.reorder_suggestions(&services.alert_policy) {
        Ok(suggestions) => (
            StatusCode::OK,
            Json(serde_json::json!({
                "count": suggestions.len(),
                "suggestions": suggestions,
            })),
        )
            .into_response(),
        Err(e) => ledger_error_to_response(e),
    }
}
