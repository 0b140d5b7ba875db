//! HTTP API
//!
//! | Method | Path | Body / answer |
//! |---|---|---|
//! | `POST` | `/chat` | `{message, thread_id}` → `{response, thread_id}` |
//! | `GET` | `/history/{thread_id}` | `{thread_id, messages: [{role, content}]}` |
//! | `DELETE` | `/history/{thread_id}` | `{message}` (threads are never deleted) |
//! | `GET` | `/health` | `{status: "ok"}` |
//!
//! Errors are `{detail}`: 400 for invalid input, 500 otherwise.

use crate::agent::FlightAgent;
use crate::error::{AgentError, Result};
use crate::types::ThreadId;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::future::Future;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info};

const NEW_THREAD_HINT: &str = "Để bắt đầu cuộc hội thoại mới, hãy dùng thread_id khác";

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    /// A fresh thread is started when absent
    #[serde(default)]
    pub thread_id: Option<ThreadId>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChatResponse {
    pub response: String,
    pub thread_id: ThreadId,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub role: String,
    pub content: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HistoryResponse {
    pub thread_id: ThreadId,
    pub messages: Vec<HistoryEntry>,
}

/// [`AgentError`] rendered as `{detail}`
pub struct ApiError(AgentError);

impl From<AgentError> for ApiError {
    fn from(e: AgentError) -> Self {
        Self(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self.0 {
            AgentError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            error!(error = %self.0, "Request failed");
        }
        (status, Json(json!({ "detail": self.0.to_string() }))).into_response()
    }
}

pub fn router(agent: Arc<FlightAgent>) -> Router {
    Router::new()
        .route("/chat", post(chat))
        .route("/history/{thread_id}", get(history).delete(clear_history))
        .route("/health", get(health))
        .with_state(agent)
}

async fn chat(
    State(agent): State<Arc<FlightAgent>>,
    Json(request): Json<ChatRequest>,
) -> std::result::Result<Json<ChatResponse>, ApiError> {
    let thread_id = request.thread_id.unwrap_or_default();
    let reply = agent.process_message(&thread_id, &request.message).await?;
    Ok(Json(ChatResponse {
        response: reply.response,
        thread_id: reply.thread_id,
    }))
}

async fn history(
    State(agent): State<Arc<FlightAgent>>,
    Path(thread_id): Path<String>,
) -> std::result::Result<Json<HistoryResponse>, ApiError> {
    let thread_id = ThreadId::from(thread_id);
    let messages = agent
        .history(&thread_id)
        .await?
        .into_iter()
        .map(|m| HistoryEntry {
            role: m.role.as_str().to_string(),
            content: m.content,
        })
        .collect();
    Ok(Json(HistoryResponse {
        thread_id,
        messages,
    }))
}

async fn clear_history(Path(_thread_id): Path<String>) -> Json<serde_json::Value> {
    Json(json!({ "message": NEW_THREAD_HINT }))
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

/// Bind `addr` and serve until `shutdown` resolves
pub async fn serve<F>(agent: Arc<FlightAgent>, addr: &str, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|e| AgentError::Configuration(format!("cannot bind {addr}: {e}")))?;
    info!(addr = %addr, "HTTP server listening");

    axum::serve(listener, router(agent))
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|e| AgentError::Internal(format!("HTTP server error: {e}")))?;

    info!("HTTP server stopped");
    Ok(())
}
