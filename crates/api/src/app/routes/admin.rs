//! Master-data administration and the consistency audit.

use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};

use stockledger_core::{ProductId, StoreId};
use stockledger_infra::{audit, MasterData, ProductUpdate, StoreUpdate};

use crate::app::dto::{
    CreateProductRequest, CreateStoreRequest, UpdateProductRequest, UpdateStoreRequest,
};
use crate::app::errors::ledger_error_to_response;
use crate::app::AppServices;

pub fn router() -> Router {
    Router::new()
        .route("/products", get(list_products).post(create_product))
        .route("/products/:id", axum::routing::patch(update_product).delete(delete_product))
        .route("/stores", get(list_stores).post(create_store))
        .route("/stores/:id", axum::routing::patch(update_store).delete(delete_store))
        .route("/audit", get(run_audit))
        .route("/audit/repair", post(run_repair))
}

async fn list_products(
    Extension(services): Extension<Arc<AppServices>>,
) -> axum::response::Response {
    let mut products = services.master.products();
    products.sort_by(|a, b| a.name.cmp(&b.name));
    (StatusCode::OK, Json(products)).into_response()
}

async fn create_product(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<CreateProductRequest>,
) -> axum::response::Response {
    match services
        .master
        .create_product(body.sku, body.name, body.reorder_point)
    {
        Ok(product) => (StatusCode::CREATED, Json(product)).into_response(),
        Err(e) => ledger_error_to_response(e),
    }
}

async fn update_product(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<ProductId>,
    Json(body): Json<UpdateProductRequest>,
) -> axum::response::Response {
    let update = ProductUpdate {
        name: body.name,
        reorder_point: body.reorder_point,
    };
    match services.master.update_product(id, update) {
        Ok(product) => (StatusCode::OK, Json(product)).into_response(),
        Err(e) => ledger_error_to_response(e),
    }
}

async fn delete_product(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<ProductId>,
) -> axum::response::Response {
    match services.master.delete_product(&services.store, id) {
        Ok(report) => (StatusCode::OK, Json(report)).into_response(),
        Err(e) => ledger_error_to_response(e),
    }
}

async fn list_stores(Extension(services): Extension<Arc<AppServices>>) -> axum::response::Response {
    let mut stores = services.master.stores();
    stores.sort_by(|a, b| a.name.cmp(&b.name));
    (StatusCode::OK, Json(stores)).into_response()
}

async fn create_store(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<CreateStoreRequest>,
) -> axum::response::Response {
    match services.master.create_store(body.name, body.location) {
        Ok(store) => (StatusCode::CREATED, Json(store)).into_response(),
        Err(e) => ledger_error_to_response(e),
    }
}

async fn update_store(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<StoreId>,
    Json(body): Json<UpdateStoreRequest>,
) -> axum::response::Response {
    let update = StoreUpdate {
        name: body.name,
        location: body.location,
    };
    match services.master.update_store(id, update) {
        Ok(store) => (StatusCode::OK, Json(store)).into_response(),
        Err(e) => ledger_error_to_response(e),
    }
}

async fn delete_store(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<StoreId>,
) -> axum::response::Response {
    match services.master.delete_store(&services.store, id) {
        Ok(report) => (StatusCode::OK, Json(report)).into_response(),
        Err(e) => ledger_error_to_response(e),
    }
}

async fn run_audit(Extension(services): Extension<Arc<AppServices>>) -> axum::response::Response {
    match audit::audit(&services.store) {
        Ok(diverged) => (
            StatusCode::OK,
            Json(serde_json::json!({
                "consistent": diverged.is_empty(),
                "divergences": diverged,
            })),
        )
            .into_response(),
        Err(e) => ledger_error_to_response(e),
    }
}

async fn run_repair(Extension(services): Extension<Arc<AppServices>>) -> axum::response::Response {
    match audit::repair(&services.store) {
        Ok(repaired) => (
            StatusCode::OK,
            Json(serde_json::json!({
                "repaired": repaired.len(),
                "divergences": repaired,
            })),
        )
            .into_response(),
        Err(e) => ledger_error_to_response(e),
    }
}
