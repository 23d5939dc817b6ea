//! Trait abstractions for runtime I/O
//!
//! The session manager, the swarm runtime and the turn executor only talk to
//! the outside world through these traits, so tests can swap in mocks.

use crate::db::{Database, DbError};
use crate::llm::{LlmError, LlmRequest, LlmResponse, ModelRegistry};
use crate::scraper::FetchError;
use crate::state_machine::{Message, TurnOutput};
use crate::swarm::{Agent, AgentName};
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

/// Errors raised while executing a single agent turn
#[derive(Debug, Error, Clone, PartialEq)]
pub enum TurnError {
    #[error("Model request failed: {0}")]
    Llm(#[from] LlmError),
    #[error("Agent {agent} tried to transfer to '{target}', which it cannot reach")]
    InvalidHandoffTarget { agent: AgentName, target: String },
    #[error("Agent {0} kept calling tools without finishing its turn")]
    ToolRoundsExceeded(AgentName),
    #[error("Agent {0} was started without an input message")]
    MissingInput(AgentName),
}

/// Runs one agent turn
#[async_trait]
pub trait TurnExecutor: Send + Sync {
    /// `history` precedes `input`, the message that triggered the turn
    async fn run_turn(
        &self,
        agent: &Agent,
        history: &[Message],
        input: &Message,
    ) -> Result<TurnOutput, TurnError>;
}

/// Client for making LLM requests
#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn complete(&self, request: &LlmRequest) -> Result<LlmResponse, LlmError>;

    #[allow(dead_code)] // API completeness
    fn model_id(&self) -> &str;
}

/// Turns a URL into readable page text
#[async_trait]
pub trait ContentSource: Send + Sync {
    async fn fetch_page_text(&self, url: &str) -> Result<String, FetchError>;
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("Session not found: {0}")]
    NotFound(String),
    #[error("Storage failure: {0}")]
    Backend(String),
}

/// A persisted session row
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredSession {
    pub id: String,
    pub title: String,
    /// Serialized [`crate::session::Snapshot`]
    pub snapshot: String,
}

/// Durable session storage keyed by id
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn load(&self, id: &str) -> Result<StoredSession, StoreError>;

    /// Insert or overwrite
    async fn save(&self, session: &StoredSession) -> Result<(), StoreError>;

    /// Deleting an unknown id succeeds
    async fn delete(&self, id: &str) -> Result<(), StoreError>;

    /// `(id, title)` pairs, most recently updated first
    async fn list(&self) -> Result<Vec<(String, String)>, StoreError>;
}

// ============================================================================
// Arc implementations for trait objects
// ============================================================================

#[async_trait]
impl<T: TurnExecutor + ?Sized> TurnExecutor for Arc<T> {
    async fn run_turn(
        &self,
        agent: &Agent,
        history: &[Message],
        input: &Message,
    ) -> Result<TurnOutput, TurnError> {
        (**self).run_turn(agent, history, input).await
    }
}

#[async_trait]
impl<T: LlmClient + ?Sized> LlmClient for Arc<T> {
    async fn complete(&self, request: &LlmRequest) -> Result<LlmResponse, LlmError> {
        (**self).complete(request).await
    }

    fn model_id(&self) -> &str {
        (**self).model_id()
    }
}

#[async_trait]
impl<T: ContentSource + ?Sized> ContentSource for Arc<T> {
    async fn fetch_page_text(&self, url: &str) -> Result<String, FetchError> {
        (**self).fetch_page_text(url).await
    }
}

#[async_trait]
impl<T: SessionStore + ?Sized> SessionStore for Arc<T> {
    async fn load(&self, id: &str) -> Result<StoredSession, StoreError> {
        (**self).load(id).await
    }

    async fn save(&self, session: &StoredSession) -> Result<(), StoreError> {
        (**self).save(session).await
    }

    async fn delete(&self, id: &str) -> Result<(), StoreError> {
        (**self).delete(id).await
    }

    async fn list(&self) -> Result<Vec<(String, String)>, StoreError> {
        (**self).list().await
    }
}

// ============================================================================
// Production Adapters
// ============================================================================

impl From<DbError> for StoreError {
    fn from(e: DbError) -> Self {
        match e {
            DbError::SessionNotFound(id) => StoreError::NotFound(id),
            other => StoreError::Backend(other.to_string()),
        }
    }
}

/// Adapter to use Database as `SessionStore`
#[derive(Clone)]
pub struct DatabaseStore {
    db: Database,
}

impl DatabaseStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}

// SQLite calls are short and synchronous; they run inline like the rest of
// the database layer.
#[async_trait]
impl SessionStore for DatabaseStore {
    async fn load(&self, id: &str) -> Result<StoredSession, StoreError> {
        let record = self.db.get_session(id)?;
        Ok(StoredSession {
            id: record.id,
            title: record.title,
            snapshot: record.snapshot,
        })
    }

    async fn save(&self, session: &StoredSession) -> Result<(), StoreError> {
        self.db
            .save_session(&session.id, &session.title, &session.snapshot)?;
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<(), StoreError> {
        if !self.db.delete_session(id)? {
            tracing::debug!(session_id = %id, "Delete of unknown session");
        }
        Ok(())
    }

    async fn list(&self) -> Result<Vec<(String, String)>, StoreError> {
        Ok(self
            .db
            .list_sessions()?
            .into_iter()
            .map(|s| (s.id, s.title))
            .collect())
    }
}

/// Adapter to use `ModelRegistry` as `LlmClient`
pub struct RegistryLlmClient {
    registry: Arc<ModelRegistry>,
    model_id: String,
}

impl RegistryLlmClient {
    pub fn new(registry: Arc<ModelRegistry>) -> Self {
        let model_id = registry
            .default()
            .map_or_else(|| "unconfigured".to_string(), |llm| llm.model_id().to_string());
        Self { registry, model_id }
    }
}

#[async_trait]
impl LlmClient for RegistryLlmClient {
    async fn complete(&self, request: &LlmRequest) -> Result<LlmResponse, LlmError> {
        let llm = self
            .registry
            .default()
            .ok_or_else(|| LlmError::auth("No LLM credentials configured"))?;
        llm.complete(request).await
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }
}
