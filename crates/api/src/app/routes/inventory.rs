//! Stock movement and per-store inventory listings.

use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};

use stockledger_core::{ProductId, StoreId};

use crate::app::dto::{self, AddStockRequest, AdjustRequest, SetLevelRequest, TransferRequest};
use crate::app::errors::ledger_error_to_response;
use crate::app::AppServices;

pub fn router() -> Router {
    Router::new()
        .route("/adjust", post(adjust))
        .route("/add-stock", post(add_stock))
        .route("/set-level", post(set_level))
        .route("/transfer", post(transfer))
        .route("/:store_id", get(store_inventory))
        .route("/:store_id/:product_id", get(stock_level))
}

async fn adjust(
    Extension(services): Extension<Arc<AppServices>>,
    headers: HeaderMap,
    Json(body): Json<AdjustRequest>,
) -> axum::response::Response {
    let kind = match dto::parse_kind(body.kind.as_deref()) {
        Ok(kind) => kind,
        Err(resp) => return resp,
    };
    let actor = dto::actor_from_headers(&headers);

    match services.engine.adjust(
        body.store_id,
        body.product_id,
        body.change,
        kind,
        body.note,
        actor,
    ) {
        Ok(outcome) => (StatusCode::OK, Json(outcome)).into_response(),
        Err(e) => ledger_error_to_response(e),
    }
}

async fn add_stock(
    Extension(services): Extension<Arc<AppServices>>,
    headers: HeaderMap,
    Json(body): Json<AddStockRequest>,
) -> axum::response::Response {
    let actor = dto::actor_from_headers(&headers);

    match services.engine.add_stock(
        body.store_id,
        body.product_id,
        body.quantity,
        body.note,
        actor,
        body.reference.map(stockledger_ledger::Reference::from),
    ) {
        Ok(outcome) => (StatusCode::OK, Json(outcome)).into_response(),
        Err(e) => ledger_error_to_response(e),
    }
}

async fn set_level(
    Extension(services): Extension<Arc<AppServices>>,
    headers: HeaderMap,
    Json(body): Json<SetLevelRequest>,
) -> axum::response::Response {
    let actor = dto::actor_from_headers(&headers);

    match services.engine.set_level(
        body.store_id,
        body.product_id,
        body.quantity,
        stockledger_ledger::TransactionKind::Manual,
        body.note,
        actor,
    ) {
        Ok(outcome) => (StatusCode::OK, Json(outcome)).into_response(),
        Err(e) => ledger_error_to_response(e),
    }
}

async fn transfer(
    Extension(services): Extension<Arc<AppServices>>,
    headers: HeaderMap,
    Json(body): Json<TransferRequest>,
) -> axum::response::Response {
    let actor = dto::actor_from_headers(&headers);

    match services.engine.transfer(
        body.from_store_id,
        body.to_store_id,
        body.product_id,
        body.quantity,
        body.note,
        actor,
    ) {
        Ok(outcome) => (StatusCode::OK, Json(outcome)).into_response(),
        Err(e) => ledger_error_to_response(e),
    }
}

async fn store_inventory(
    Extension(services): Extension<Arc<AppServices>>,
    Path(store_id): Path<StoreId>,
) -> axum::response::Response {
    match services
        .alerts
        .store_inventory(store_id, &services.alert_policy)
    {
        Ok(lines) => (StatusCode::OK, Json(lines)).into_response(),
        Err(e) => ledger_error_to_response(e),
    }
}

async fn stock_level(
    Extension(services): Extension<Arc<AppServices>>,
    Path((store_id, product_id)): Path<(StoreId, ProductId)>,
) -> axum::response::Response {
    match services.engine.record(store_id, product_id) {
        Ok(record) => {
            let quantity = record.as_ref().map(|r| r.quantity).unwrap_or(0);
            (
                StatusCode::OK,
                Json(serde_json::json!({
                    "store_id": store_id,
                    "product_id": product_id,
                    "quantity": quantity,
                    "last_updated": record.map(|r| r.last_updated),
                })),
            )
                .into_response()
        }
        Err(e) => ledger_error_to_response(e),
    }
}
