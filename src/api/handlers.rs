//! HTTP request handlers

use super::types::{
    ConversationIdRequest, ConversationListResponse, ConversationResponse, DetailResponse,
    ErrorResponse, SendMessageRequest, StartConversationRequest, StartConversationResponse,
};
use super::AppState;
use crate::runtime::{InvocationError, SwarmError, TurnError};
use crate::state_machine::TransitionError;
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};

/// Create the API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/start_conversation", post(start_conversation))
        .route("/send_message", post(send_message))
        .route("/fetch_conversations", get(fetch_conversations))
        .route("/load_conversation", post(load_conversation))
        .route("/delete_conversation", delete(delete_conversation))
        .route("/version", get(get_version))
        .with_state(state)
}

// ============================================================
// Sessions
// ============================================================

async fn start_conversation(
    State(state): State<AppState>,
    Json(req): Json<StartConversationRequest>,
) -> Result<Json<StartConversationResponse>, AppError> {
    let message = non_empty(&req.message)?;
    let (conversation_id, conversation) = state.sessions.start_session(message).await?;
    Ok(Json(StartConversationResponse {
        conversation_id,
        conversation,
    }))
}

async fn send_message(
    State(state): State<AppState>,
    Json(req): Json<SendMessageRequest>,
) -> Result<Json<ConversationResponse>, AppError> {
    let message = non_empty(&req.message)?;
    let conversation = state
        .sessions
        .continue_session(&req.conversation_id, message)
        .await?;
    Ok(Json(ConversationResponse { conversation }))
}

async fn fetch_conversations(
    State(state): State<AppState>,
) -> Result<Json<ConversationListResponse>, AppError> {
    let conversations = state.sessions.list_sessions().await?;
    Ok(Json(ConversationListResponse { conversations }))
}

async fn load_conversation(
    State(state): State<AppState>,
    Json(req): Json<ConversationIdRequest>,
) -> Result<Json<ConversationResponse>, AppError> {
    let conversation = state.sessions.load_session(&req.conversation_id).await?;
    Ok(Json(ConversationResponse { conversation }))
}

async fn delete_conversation(
    State(state): State<AppState>,
    Json(req): Json<ConversationIdRequest>,
) -> Result<Json<DetailResponse>, AppError> {
    state.sessions.delete_session(&req.conversation_id).await?;
    Ok(Json(DetailResponse {
        detail: "Conversation deleted".to_string(),
    }))
}

// ============================================================
// Version
// ============================================================

async fn get_version() -> &'static str {
    concat!("ai-teacher ", env!("CARGO_PKG_VERSION"))
}

fn non_empty(message: &str) -> Result<&str, AppError> {
    let trimmed = message.trim();
    if trimmed.is_empty() {
        return Err(AppError::BadRequest("Message must not be empty".to_string()));
    }
    Ok(trimmed)
}

// ============================================================
// Error Handling
// ============================================================

#[derive(Debug)]
enum AppError {
    BadRequest(String),
    NotFound(String),
    Conflict(String),
    BadGateway(String),
    Internal(String),
}

impl From<SwarmError> for AppError {
    fn from(e: SwarmError) -> Self {
        let message = e.to_string();
        match e {
            SwarmError::SessionNotFound(_) | SwarmError::CorruptedSnapshot { .. } => {
                AppError::NotFound(message)
            }
            SwarmError::SessionBusy(_)
            | SwarmError::Invocation(InvocationError::Transition(TransitionError::AgentBusy)) => {
                AppError::Conflict(message)
            }
            SwarmError::Invocation(InvocationError::Turn(
                TurnError::Llm(_) | TurnError::ToolRoundsExceeded(_),
            )) => AppError::BadGateway(message),
            other => {
                tracing::error!(
                    error = %other,
                    topology = other.is_topology_error(),
                    "Request failed"
                );
                AppError::Internal(message)
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            AppError::BadGateway(msg) => (StatusCode::BAD_GATEWAY, msg),
            AppError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        let body = Json(ErrorResponse::new(message));
        (status, body).into_response()
    }
}
