//! Audit log inspection HTTP service.
//!
//! Standalone sidecar for operators: the kernel itself owns its audit log
//! in-process, but exposing it over HTTP lets external tooling
//! pull a snapshot or re-verify the chain without touching kernel internals.

use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use governance_audit::AuditLogHandle;

#[derive(Clone)]
struct AppState {
    log: AuditLogHandle,
}

async fn healthz() -> &'static str {
    "governance-audit: operational"
}

async fn snapshot(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(serde_json::to_value(state.log.snapshot()).unwrap_or(serde_json::Value::Null))
}

async fn verify(State(state): State<AppState>) -> Result<Json<serde_json::Value>, (StatusCode, String)> {
    match state.log.verify() {
        Ok(chain_intact) => Ok(Json(serde_json::json!({ "chain_intact": chain_intact }))),
        Err(e) => Err((StatusCode::CONFLICT, e.to_string())),
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().json())
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let max_entries = std::env::var("AUDIT_MAX_ENTRIES")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(100_000);

    let state = AppState {
        log: AuditLogHandle::new(max_entries),
    };

    let app = Router::new()
        .route("/healthz", get(healthz))
        .route("/audit/snapshot", get(snapshot))
        .route("/audit/verify", get(verify))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let port = std::env::var("AUDIT_PORT").unwrap_or_else(|_| "3001".to_string());
    let addr = format!("127.0.0.1:{}", port);

    tracing::info!(%addr, max_entries, "governance-audit listening");

    let listener = tokio::net::TcpListener::bind(&addr).await.unwrap();
    axum::serve(listener, app).await.unwrap();
}
