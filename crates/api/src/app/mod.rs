//! HTTP application wiring (Axum router + service wiring).
//!
//! This folder is structured like:
//! - `routes/`: HTTP routes + handlers (one file per area)
//! - `dto.rs`: request/response DTOs and JSON mapping helpers
//! - `errors.rs`: consistent error responses

use std::sync::Arc;

use axum::{routing::get, Extension, Router};
use tower::ServiceBuilder;

use stockledger_infra::{
    audit, AlertService, InMemoryLedgerStore, InMemoryMasterData, MutationEngine,
};
use stockledger_ledger::AlertPolicy;

pub mod dto;
pub mod errors;
pub mod routes;

type Store = Arc<InMemoryLedgerStore>;
type Master = Arc<InMemoryMasterData>;

/// Everything the handlers need, injected as one `Extension`.
pub struct AppServices {
    pub engine: MutationEngine<Store, Master>,
    pub alerts: AlertService<Store, Master>,
    pub store: Store,
    pub master: Master,
    pub alert_policy: AlertPolicy,
}

/// Environment-driven configuration.
#[derive(Debug, Clone, Default)]
pub struct AppConfig {
    /// Substitutes for a zero reorder point when classifying alerts.
    pub fallback_threshold: i64,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let fallback_threshold = std::env::var("ALERT_FALLBACK_THRESHOLD")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(0);
        Self { fallback_threshold }
    }
}

/// Build the full HTTP router (public entrypoint used by `main.rs`).
pub fn build_app(config: AppConfig) -> Router {
    let store: Store = Arc::new(InMemoryLedgerStore::new());
    let master: Master = Arc::new(InMemoryMasterData::new());

    let services = Arc::new(AppServices {
        engine: MutationEngine::new(store.clone(), master.clone()),
        alerts: AlertService::new(store.clone(), master.clone()),
        store: store.clone(),
        master,
        alert_policy: AlertPolicy::new(config.fallback_threshold),
    });

    // Startup consistency pass over whatever the store was seeded with.
    match audit::repair(&store) {
        Ok(repaired) if !repaired.is_empty() => {
            tracing::warn!(repaired = repaired.len(), "startup audit repaired records");
        }
        Ok(_) => {}
        Err(e) => tracing::error!("startup audit failed: {e}"),
    }

    Router::new()
        .route("/healthz", get(routes::system::health))
        .nest("/api", routes::router().layer(Extension(services)))
        .layer(ServiceBuilder::new())
}
