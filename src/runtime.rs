//! Runtime for tutoring sessions
//!
//! The [`SessionManager`] owns the session cache and persistence; the
//! [`SwarmRuntime`] runs one invocation (a user message and the agent turns it
//! triggers) against a session copy.

mod executor;
mod recovery;
pub mod traits;
mod turn;

#[cfg(test)]
pub mod testing;

pub use executor::{InvocationError, SwarmRuntime};
pub use recovery::restore;
pub use traits::*;
pub use turn::LlmTurnExecutor;

use crate::session::{conversation_of, ConversationEntry, Session, SnapshotError};
use crate::state_machine::{Message, SwarmContext, TransitionError};
use crate::title_generator::TitleGenerator;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{Mutex, RwLock};

#[derive(Debug, Error)]
pub enum SwarmError {
    #[error("Session not found: {0}")]
    SessionNotFound(String),
    #[error("Session {id} could not be restored: {source}")]
    CorruptedSnapshot {
        id: String,
        #[source]
        source: SnapshotError,
    },
    #[error("Session {0} is already processing a message")]
    SessionBusy(String),
    #[error(transparent)]
    Invocation(#[from] InvocationError),
    #[error(transparent)]
    Store(StoreError),
}

impl SwarmError {
    /// Errors caused by the swarm definition or an agent breaking it, not by
    /// the caller or an external service
    pub fn is_topology_error(&self) -> bool {
        matches!(
            self,
            SwarmError::Invocation(
                InvocationError::Transition(
                    TransitionError::Registry(_)
                        | TransitionError::MissingHandoff(_)
                        | TransitionError::InvalidTransition(_)
                ) | InvocationError::Turn(TurnError::InvalidHandoffTarget { .. })
                    | InvocationError::Uncommitted(_)
            )
        )
    }
}

impl From<StoreError> for SwarmError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound(id) => SwarmError::SessionNotFound(id),
            other => SwarmError::Store(other),
        }
    }
}

type SessionHandle = Arc<Mutex<Session>>;

/// Owns every live session and its persistence
pub struct SessionManager {
    store: Arc<dyn SessionStore>,
    runtime: SwarmRuntime<Arc<dyn TurnExecutor>>,
    titles: TitleGenerator,
    sessions: RwLock<HashMap<String, SessionHandle>>,
}

impl SessionManager {
    pub fn new(
        store: Arc<dyn SessionStore>,
        context: SwarmContext,
        executor: Arc<dyn TurnExecutor>,
        titles: TitleGenerator,
    ) -> Self {
        Self {
            store,
            runtime: SwarmRuntime::new(context, executor),
            titles,
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// Create a session from the learner's first message and run it.
    ///
    /// Returns the new id and the agent replies.
    pub async fn start_session(
        &self,
        message: &str,
    ) -> Result<(String, Vec<ConversationEntry>), SwarmError> {
        let id = uuid::Uuid::new_v4().to_string();
        let title = self.titles.title_for(message).await;
        tracing::info!(session_id = %id, %title, "Starting session");

        let session = Session::new(&id, title);
        let invocation = self.runtime.process(&session, message).await?;
        self.persist(&invocation.session).await?;

        let replies = agent_replies(&invocation.produced);
        self.sessions
            .write()
            .await
            .insert(id.clone(), Arc::new(Mutex::new(invocation.session)));
        Ok((id, replies))
    }

    /// Route a message into an existing session.
    ///
    /// Returns only the agent replies produced by this message.
    pub async fn continue_session(
        &self,
        id: &str,
        message: &str,
    ) -> Result<Vec<ConversationEntry>, SwarmError> {
        let handle = self.handle(id).await?;
        let mut session = handle
            .try_lock()
            .map_err(|_| SwarmError::SessionBusy(id.to_string()))?;

        // Deleted while we waited for the handle
        if !self.is_cached(id, &handle).await {
            return Err(SwarmError::SessionNotFound(id.to_string()));
        }

        let invocation = self.runtime.process(&session, message).await?;
        self.persist(&invocation.session).await?;

        let replies = agent_replies(&invocation.produced);
        *session = invocation.session;
        Ok(replies)
    }

    /// `(id, title)` pairs, most recently updated first
    pub async fn list_sessions(&self) -> Result<Vec<(String, String)>, SwarmError> {
        Ok(self.store.list().await?)
    }

    /// The full visible transcript of a session
    pub async fn load_session(&self, id: &str) -> Result<Vec<ConversationEntry>, SwarmError> {
        let handle = self.handle(id).await?;
        let session = handle.lock().await;
        if !self.is_cached(id, &handle).await {
            return Err(SwarmError::SessionNotFound(id.to_string()));
        }
        Ok(session.conversation())
    }

    /// Remove a session from the cache and the store. Unknown ids are acked.
    ///
    /// Waits for an in-flight invocation, then drops the cache entry and the
    /// row under the cache write lock so no concurrent restore can bring the
    /// session back.
    pub async fn delete_session(&self, id: &str) -> Result<(), SwarmError> {
        loop {
            let cached = self.sessions.read().await.get(id).cloned();
            let _guard = match &cached {
                Some(handle) => Some(handle.lock().await),
                None => None,
            };

            let mut sessions = self.sessions.write().await;
            let unchanged = match (&cached, sessions.get(id)) {
                (Some(locked), Some(current)) => Arc::ptr_eq(locked, current),
                (None, None) => true,
                _ => false,
            };
            if !unchanged {
                // Restored or replaced while we waited; lock the new handle
                continue;
            }

            sessions.remove(id);
            self.store.delete(id).await?;
            tracing::info!(session_id = %id, "Deleted session");
            return Ok(());
        }
    }

    async fn handle(&self, id: &str) -> Result<SessionHandle, SwarmError> {
        if let Some(handle) = self.sessions.read().await.get(id) {
            return Ok(Arc::clone(handle));
        }

        // Restores run under the write lock so they serialize with deletes
        let mut sessions = self.sessions.write().await;
        if let Some(handle) = sessions.get(id) {
            return Ok(Arc::clone(handle));
        }

        let stored = self.store.load(id).await?;
        let session = restore(
            &stored.id,
            &stored.title,
            &stored.snapshot,
            &self.runtime.context().registry,
        )
        .map_err(|source| {
            tracing::error!(session_id = %id, error = %source, "Failed to restore session");
            SwarmError::CorruptedSnapshot {
                id: id.to_string(),
                source,
            }
        })?;
        tracing::debug!(
            session_id = %id,
            messages = session.history.len(),
            "Restored session"
        );

        let handle = Arc::new(Mutex::new(session));
        sessions.insert(id.to_string(), Arc::clone(&handle));
        Ok(handle)
    }

    async fn is_cached(&self, id: &str, handle: &SessionHandle) -> bool {
        self.sessions
            .read()
            .await
            .get(id)
            .is_some_and(|cached| Arc::ptr_eq(cached, handle))
    }

    async fn persist(&self, session: &Session) -> Result<(), SwarmError> {
        let snapshot = session.snapshot().to_json().map_err(|source| {
            SwarmError::CorruptedSnapshot {
                id: session.id.clone(),
                source,
            }
        })?;
        self.store
            .save(&StoredSession {
                id: session.id.clone(),
                title: session.title.clone(),
                snapshot,
            })
            .await?;
        Ok(())
    }
}

/// Content produced by agents, excluding the user's own input
fn agent_replies(produced: &[Message]) -> Vec<ConversationEntry> {
    let agent_only: Vec<Message> = produced
        .iter()
        .filter(|m| matches!(m, Message::Content { source, .. } if !source.is_user()))
        .cloned()
        .collect();
    conversation_of(&agent_only)
}
