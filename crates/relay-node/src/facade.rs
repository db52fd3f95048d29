//! HTTP facade.
//!
//! Turns each `GET /` into one request/reply exchange over the bus.
//!
//! | Route | Response |
//! |-------|----------|
//! | `GET /` | `{"message": "Hello, World!", "response": <reply>}` |
//! | `GET /health` | `{"status": "ok" \| "degraded", "worker": <state>}` |
//! | `GET /stats` | correlator, responder and transport counters |

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use relay_bus::InMemoryPubSub;
use relay_rpc::{
    ReplyChannelNamer, ReplyCorrelator, RequestEnvelope, ResponderStats, RpcError, WorkerState,
};
use serde_json::json;
use std::sync::Arc;
use tokio::sync::watch;
use tower_http::trace::TraceLayer;
use tracing::{debug, warn};

/// Greeting returned alongside every reply.
pub const GREETING: &str = "Hello, World!";

/// State shared across handlers.
#[derive(Clone)]
pub struct FacadeState {
    pub correlator: Arc<ReplyCorrelator>,
    pub namer: Arc<ReplyChannelNamer>,
    pub request_channel: Arc<str>,
    pub transport: Arc<InMemoryPubSub>,
    pub worker_state: watch::Receiver<WorkerState>,
    pub responder_stats: Arc<ResponderStats>,
}

/// Build the facade router.
pub fn router(state: FacadeState) -> Router {
    Router::new()
        .route("/", get(hello))
        .route("/health", get(health))
        .route("/stats", get(stats))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// An exchange failure rendered as an HTTP response.
#[derive(Debug)]
pub struct FacadeError(pub RpcError);

impl From<RpcError> for FacadeError {
    fn from(err: RpcError) -> Self {
        Self(err)
    }
}

impl FacadeError {
    pub fn status(&self) -> StatusCode {
        match self.0 {
            RpcError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            RpcError::Transport(_) => StatusCode::BAD_GATEWAY,
            RpcError::Cancelled { .. } => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

impl IntoResponse for FacadeError {
    fn into_response(self) -> Response {
        let status = self.status();
        warn!(status = %status, error = %self.0, "Request failed");
        (status, Json(json!({ "error": self.0.to_string() }))).into_response()
    }
}

async fn hello(State(state): State<FacadeState>) -> Result<Json<serde_json::Value>, FacadeError> {
    let ticket = state.namer.next_ticket();
    let envelope = RequestEnvelope::new(
        json!({ "request_number": ticket.request_number }),
        ticket.channel.clone(),
    );

    debug!(
        request_number = ticket.request_number,
        reply_channel = %ticket.channel,
        "Dispatching request"
    );

    let reply = state
        .correlator
        .request_reply(
            envelope.to_body(),
            &state.request_channel,
            &ticket.channel,
            None,
        )
        .await?;

    Ok(Json(json!({
        "message": GREETING,
        "response": reply,
    })))
}

/// `"ok"` while the responder can answer requests, `"degraded"` otherwise.
pub fn health_status(worker: WorkerState) -> &'static str {
    match worker {
        WorkerState::Listening | WorkerState::Processing => "ok",
        _ => "degraded",
    }
}

async fn health(State(state): State<FacadeState>) -> impl IntoResponse {
    let worker = *state.worker_state.borrow();
    Json(json!({
        "status": health_status(worker),
        "worker": worker,
    }))
}

async fn stats(State(state): State<FacadeState>) -> impl IntoResponse {
    Json(json!({
        "correlator": state.correlator.stats().snapshot(),
        "responder": state.responder_stats.snapshot(),
        "transport": {
            "active_subscriptions": state.transport.active_subscriptions(),
            "messages_published": state.transport.messages_published(),
            "subscriptions_released": state.transport.subscriptions_released(),
        },
    }))
}
