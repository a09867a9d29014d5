use axum::Router;

pub mod admin;
pub mod alerts;
pub mod inventory;
pub mod system;
pub mod transactions;

/// Router for everything under `/api`.
pub fn router() -> Router {
    Router::new()
        .nest("/inventory", inventory::router())
        .nest("/transactions", transactions::router())
        .nest("/alerts", alerts::router())
        .nest("/admin", admin::router())
}
