//! Ledger row listings and reversal.

use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use chrono::{Duration, Utc};

use stockledger_core::TransactionId;
use stockledger_infra::{Pagination, TransactionFilter};

use crate::app::dto::{self, ReverseQuery, TransactionQuery};
use crate::app::errors::{json_error, ledger_error_to_response};
use crate::app::AppServices;

pub fn router() -> Router {
    Router::new()
        .route("/", get(list))
        .route("/:id", get(fetch).delete(reverse))
}

async fn list(
    Extension(services): Extension<Arc<AppServices>>,
    Query(query): Query<TransactionQuery>,
) -> axum::response::Response {
    let kind = match dto::parse_kind(query.kind.as_deref()) {
        // An omitted kind filters nothing.
        Ok(_) if query.kind.is_none() => None,
        Ok(kind) => Some(kind),
        Err(resp) => return resp,
    };

    // `Duration::days` aborts on overflow, so the window must be bounded
    // before arithmetic.
    let since = match query.days {
        None => None,
        Some(days @ 0..=36500) => Some(Utc::now() - Duration::days(days)),
        Some(days) => {
            return json_error(
                StatusCode::BAD_REQUEST,
                "invalid_quantity",
                format!("days must be between 0 and 36500, got {days}"),
            )
        }
    };
    let filter = TransactionFilter {
        store_id: query.store_id,
        product_id: query.product_id,
        kind,
        since,
    };
    let page = Pagination::new(query.limit, query.offset);

    match services.engine.list_transactions(&filter, page) {
        Ok(rows) => (StatusCode::OK, Json(rows)).into_response(),
        Err(e) => ledger_error_to_response(e),
    }
}

async fn fetch(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<TransactionId>,
) -> axum::response::Response {
    match services.engine.transaction(id) {
        Ok(Some(row)) => (StatusCode::OK, Json(row)).into_response(),
        Ok(None) => json_error(StatusCode::NOT_FOUND, "not_found", "transaction not found"),
        Err(e) => ledger_error_to_response(e),
    }
}

async fn reverse(
    Extension(services): Extension<Arc<AppServices>>,
    headers: HeaderMap,
    Path(id): Path<TransactionId>,
    Query(query): Query<ReverseQuery>,
) -> axum::response::Response {
    let mode = match dto::parse_mode(query.mode.as_deref()) {
        Ok(mode) => mode,
        Err(resp) => return resp,
    };
    let actor = dto::actor_from_headers(&headers);

    match services.engine.reverse(id, actor, mode) {
        Ok(outcome) => (StatusCode::OK, Json(outcome)).into_response(),
        Err(e) => ledger_error_to_response(e),
    }
}
