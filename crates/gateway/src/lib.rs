//! HTTP gateway for shopchat.
//!
//! Exposes the turn-level API over HTTP:
//!
//! - `POST /chat`    — one chat turn, `{"message", "session_id"?}`
//! - `GET  /chat`    — redirects to the chat page
//! - `GET  /metrics` — aggregate metrics summary
//! - `GET  /health`  — liveness check
//! - `GET  /`        — embedded chat page
//!
//! Built on Axum. The gateway only maps transport to [`ChatService`] calls;
//! every decision about a turn is made there.

pub mod frontend;

use axum::body::Bytes;
use axum::extract::DefaultBodyLimit;
use axum::{
    Router,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Json, Redirect, Response},
    routing::get,
};
use serde::Serialize;
use shopchat_agent::{ChatService, TurnError};
use shopchat_config::GatewayConfig;
use shopchat_core::{SessionId, TurnErrorKind};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{error, info, warn};

/// Header carrying the caller's session identity.
pub const SESSION_HEADER: &str = "X-Session-Id";

/// Shared application state for the gateway.
pub struct GatewayState {
    pub chat: Arc<ChatService>,
    session_locks: SessionLocks,
}

impl GatewayState {
    pub fn new(chat: Arc<ChatService>) -> Self {
        Self {
            chat,
            session_locks: SessionLocks::default(),
        }
    }
}

pub type SharedState = Arc<GatewayState>;

/// Build the Axum router with all gateway routes.
pub fn build_router(state: SharedState, max_body_bytes: usize) -> Router {
    Router::new()
        .route("/chat", get(chat_redirect_handler).post(chat_handler))
        .route("/metrics", get(metrics_handler))
        .route("/health", get(health_handler))
        .with_state(state)
        .merge(frontend::frontend_router())
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .layer(tower_http::trace::TraceLayer::new_for_http())
}

/// Start the gateway HTTP server. Returns after Ctrl-C.
pub async fn start(
    config: &GatewayConfig,
    chat: Arc<ChatService>,
) -> Result<(), Box<dyn std::error::Error>> {
    let addr = format!("{}:{}", config.host, config.port);
    let app = build_router(Arc::new(GatewayState::new(chat)), config.max_body_bytes);

    info!(addr = %addr, "Gateway starting");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    info!("Gateway stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to listen for shutdown signal");
    }
}

// --- Session ordering ---

/// Past this many entries, idle session locks are pruned.
const MAX_IDLE_LOCKS: usize = 10_000;

/// One async lock per session, so turns within a session run in arrival
/// order while different sessions proceed concurrently.
#[derive(Default)]
struct SessionLocks {
    locks: std::sync::Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl SessionLocks {
    async fn acquire(&self, session: &SessionId) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
            if locks.len() > MAX_IDLE_LOCKS {
                locks.retain(|_, lock| Arc::strong_count(lock) > 1);
            }
            locks.entry(session.as_str().to_string()).or_default().clone()
        };
        lock.lock_owned().await
    }
}

// --- Handlers ---

#[derive(Serialize)]
struct ChatResponse {
    response: String,
    session_id: String,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn chat_handler(
    State(state): State<SharedState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let payload: serde_json::Value = match serde_json::from_slice(&body) {
        Ok(payload) => payload,
        Err(e) => {
            warn!(error = %e, "Unparseable chat request body");
            return turn_error_response(&TurnError::MalformedInput(e.to_string()));
        }
    };

    let session = session_id(&headers, &payload);
    let _turn = state.session_locks.acquire(&session).await;

    match state.chat.handle_json_turn(&session, &payload).await {
        Ok(response) => Json(ChatResponse {
            response,
            session_id: session.to_string(),
        })
        .into_response(),
        Err(e) => turn_error_response(&e),
    }
}

async fn chat_redirect_handler() -> Redirect {
    Redirect::to("/")
}

async fn metrics_handler(State(state): State<SharedState>) -> Response {
    match state.chat.recorder().summary().await {
        Ok(summary) => Json(summary).into_response(),
        Err(e) => {
            error!(error = %e, "Failed to load metrics");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse {
                    error: "Metrics temporarily unavailable.".into(),
                }),
            )
                .into_response()
        }
    }
}

async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Header first, then the body's `session_id`, else a fresh id.
fn session_id(headers: &HeaderMap, payload: &serde_json::Value) -> SessionId {
    let from_header = headers
        .get(SESSION_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|s| !s.is_empty());
    let from_body = payload
        .get("session_id")
        .and_then(|v| v.as_str())
        .map(str::trim)
        .filter(|s| !s.is_empty());

    from_header
        .or(from_body)
        .map(SessionId::from)
        .unwrap_or_default()
}

fn status_for(kind: TurnErrorKind) -> StatusCode {
    match kind {
        TurnErrorKind::InputTooLong | TurnErrorKind::MalformedInput => StatusCode::BAD_REQUEST,
        TurnErrorKind::ServiceUnavailable => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn turn_error_response(error: &TurnError) -> Response {
    (
        status_for(error.kind()),
        Json(ErrorResponse {
            error: error.user_message(),
        }),
    )
        .into_response()
}
