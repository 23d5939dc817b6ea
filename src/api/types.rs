//! API request and response types

use crate::session::ConversationEntry;
use serde::{Deserialize, Serialize};

/// Request to open a new session
#[derive(Debug, Deserialize)]
pub struct StartConversationRequest {
    pub message: String,
}

/// Request to send a message into an existing session
#[derive(Debug, Deserialize)]
pub struct SendMessageRequest {
    pub message: String,
    pub conversation_id: String,
}

/// Request naming a single session
#[derive(Debug, Deserialize)]
pub struct ConversationIdRequest {
    pub conversation_id: String,
}

/// Response for a new session
#[derive(Debug, Serialize, Deserialize)]
pub struct StartConversationResponse {
    pub conversation_id: String,
    pub conversation: Vec<ConversationEntry>,
}

/// `[source, text]` pairs
#[derive(Debug, Serialize, Deserialize)]
pub struct ConversationResponse {
    pub conversation: Vec<ConversationEntry>,
}

/// `[id, title]` pairs, most recently updated first
#[derive(Debug, Serialize, Deserialize)]
pub struct ConversationListResponse {
    pub conversations: Vec<(String, String)>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DetailResponse {
    pub detail: String,
}

/// Error response
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl ErrorResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            error: message.into(),
        }
    }
}
