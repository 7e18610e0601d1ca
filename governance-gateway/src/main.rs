//! Governance kernel HTTP gateway.
//!
//! axum front end wrapping a single in-process [`Kernel`] behind a
//! `tokio::sync::Mutex`, since both the audit log and the ordered broadcast
//! log assume one writer. Exposes the per-action pipeline plus the ambient
//! inspection surfaces a headless governance service needs.

use std::collections::HashSet;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::{ConnectInfo, Path, State},
    http::{Method, StatusCode},
    routing::{get, post},
    Json, Router,
};
use governor::{Quota, RateLimiter};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use governance_core::kernel::{ActionInput, ActionOutcome, ActionType, Kernel, KernelConfig};
use governance_core::state::{AgentState, MemoryEvent};
use governance_core::GovernanceError;

mod settings;

use settings::GatewaySettings;

const VERSION: &str = "1.0.0";

/// Keyed-by-IP rate limiter guarding the action-processing endpoint, the
/// only handler that does real work per request.
type IpRateLimiter = RateLimiter<
    std::net::IpAddr,
    governor::state::keyed::DashMapStateStore<std::net::IpAddr>,
    governor::clock::DefaultClock,
>;

// ============================================================================
// Wire types
// ============================================================================

#[derive(Debug, Deserialize)]
struct RegisterRequest {
    /// 32-byte master key / KEM shared secret, hex-encoded.
    seed_key_hex: String,
    #[serde(default)]
    expected_tongue: usize,
}

#[derive(Debug, Deserialize)]
struct ActionRequest {
    action_type: ActionType,
    state_vector: Vec<f64>,
    memory_event: Option<MemoryEvent>,
    #[serde(default)]
    accusers: Vec<String>,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

#[derive(Debug, Serialize)]
struct AuditVerifyResponse {
    chain_intact: bool,
    entries: usize,
    last_hash: String,
}

fn error_response(status: StatusCode, message: impl Into<String>) -> (StatusCode, Json<ErrorResponse>) {
    (status, Json(ErrorResponse { error: message.into() }))
}

// ============================================================================
// State
// ============================================================================

struct AppState {
    kernel: Mutex<Kernel>,
    action_limiter: IpRateLimiter,
}

impl AppState {
    fn new(settings: &GatewaySettings) -> Self {
        let kernel_config = KernelConfig {
            block_threshold: settings.gate_block_threshold,
            transform_threshold: settings.gate_transform_threshold,
            audit_max_entries: settings.audit_max_entries,
            ..KernelConfig::default()
        };
        let quota = Quota::per_second(settings.action_rate_limit_per_sec)
            .allow_burst(settings.action_rate_burst);
        Self {
            kernel: Mutex::new(Kernel::new(kernel_config)),
            action_limiter: RateLimiter::keyed(quota),
        }
    }
}

// ============================================================================
// Handlers
// ============================================================================

async fn healthz() -> &'static str {
    "governance-gateway: operational"
}

async fn info() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "name": "governance-gateway",
        "version": VERSION,
        "endpoints": {
            "POST /agents/{id}/register": "register an agent with a 32-byte seed key",
            "POST /agents/{id}/actions": "run one action through the 9-step pipeline",
            "GET /agents/{id}": "fetch an agent's canonical state snapshot",
            "GET /audit/verify": "recompute and verify the audit hash chain",
            "GET /healthz": "liveness check"
        }
    }))
}

async fn register_agent(
    State(state): State<Arc<AppState>>,
    Path(agent_id): Path<String>,
    Json(request): Json<RegisterRequest>,
) -> Result<StatusCode, (StatusCode, Json<ErrorResponse>)> {
    let bytes = hex::decode(&request.seed_key_hex)
        .map_err(|e| error_response(StatusCode::BAD_REQUEST, format!("invalid hex: {e}")))?;
    if bytes.len() != 32 {
        return Err(error_response(
            StatusCode::BAD_REQUEST,
            format!("seed key must be 32 bytes, got {}", bytes.len()),
        ));
    }
    let mut seed_key = [0u8; 32];
    seed_key.copy_from_slice(&bytes);

    let mut kernel = state.kernel.lock().await;
    kernel.register_agent_with_tongue(agent_id, seed_key, request.expected_tongue);
    Ok(StatusCode::CREATED)
}

async fn process_action(
    State(state): State<Arc<AppState>>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    Path(agent_id): Path<String>,
    Json(request): Json<ActionRequest>,
) -> Result<Json<ActionOutcome>, (StatusCode, Json<ErrorResponse>)> {
    if state.action_limiter.check_key(&peer.ip()).is_err() {
        return Err(error_response(
            StatusCode::TOO_MANY_REQUESTS,
            "action rate limit exceeded for this client",
        ));
    }

    let state_vector: [f64; governance_core::constants::BRAIN_DIMENSIONS] = request
        .state_vector
        .try_into()
        .map_err(|v: Vec<f64>| {
            error_response(
                StatusCode::BAD_REQUEST,
                format!(
                    "state_vector must have {} dimensions, got {}",
                    governance_core::constants::BRAIN_DIMENSIONS,
                    v.len()
                ),
            )
        })?;

    let action = ActionInput {
        action_type: request.action_type,
        state_vector,
        memory_event: request.memory_event,
    };
    let accusers: HashSet<String> = request.accusers.into_iter().collect();

    let mut kernel = state.kernel.lock().await;
    kernel
        .process_action(&agent_id, action, &accusers)
        .map(Json)
        .map_err(|e| {
            let status = match e {
                GovernanceError::UnknownAgent(_) => StatusCode::NOT_FOUND,
                _ => StatusCode::UNPROCESSABLE_ENTITY,
            };
            error_response(status, e.to_string())
        })
}

async fn get_agent(
    State(state): State<Arc<AppState>>,
    Path(agent_id): Path<String>,
) -> Result<Json<AgentState>, (StatusCode, Json<ErrorResponse>)> {
    let kernel = state.kernel.lock().await;
    kernel
        .agent_state(&agent_id)
        .cloned()
        .map(Json)
        .ok_or_else(|| error_response(StatusCode::NOT_FOUND, format!("unknown agent: {agent_id}")))
}

async fn audit_verify(
    State(state): State<Arc<AppState>>,
) -> Result<Json<AuditVerifyResponse>, (StatusCode, Json<ErrorResponse>)> {
    let kernel = state.kernel.lock().await;
    let handle = kernel.audit_handle();
    let snapshot = handle.snapshot();

    match handle.verify() {
        Ok(chain_intact) => Ok(Json(AuditVerifyResponse {
            chain_intact,
            entries: snapshot.len,
            last_hash: snapshot.last_hash,
        })),
        Err(e) => Err(error_response(StatusCode::CONFLICT, e.to_string())),
    }
}

// ============================================================================
// Main
// ============================================================================

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().json())
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    tracing::info!("starting governance-gateway v{}", VERSION);

    let settings = GatewaySettings::load().expect("failed to load gateway settings");
    tracing::info!(?settings, "loaded gateway settings");

    let state = Arc::new(AppState::new(&settings));

    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST])
        .allow_origin(Any)
        .allow_headers(Any);

    let app = Router::new()
        .route("/healthz", get(healthz))
        .route("/info", get(info))
        .route("/agents/:id/register", post(register_agent))
        .route("/agents/:id/actions", post(process_action))
        .route("/agents/:id", get(get_agent))
        .route("/audit/verify", get(audit_verify))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let addr = format!("0.0.0.0:{}", settings.port);

    tracing::info!(%addr, "governance-gateway listening");

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("failed to bind gateway listener");
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .expect("gateway server error");
}
