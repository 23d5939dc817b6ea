//! Mock implementations for testing
//!
//! These mocks enable integration testing without real I/O.

use super::traits::*;
use crate::llm::{LlmError, LlmRequest, LlmResponse};
use crate::scraper::FetchError;
use crate::state_machine::{Message, TurnOutput};
use crate::swarm::{Agent, AgentName};
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

// ============================================================================
// Mock LLM Client
// ============================================================================

/// Mock LLM client that returns queued responses
pub struct MockLlmClient {
    responses: Mutex<VecDeque<Result<LlmResponse, LlmError>>>,
    model_id: String,
    /// Record of all requests made
    pub requests: Mutex<Vec<LlmRequest>>,
}

impl MockLlmClient {
    pub fn new(model_id: impl Into<String>) -> Self {
        Self {
            responses: Mutex::new(VecDeque::new()),
            model_id: model_id.into(),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn queue_response(&self, response: LlmResponse) {
        self.responses.lock().unwrap().push_back(Ok(response));
    }

    pub fn queue_error(&self, error: LlmError) {
        self.responses.lock().unwrap().push_back(Err(error));
    }

    pub fn recorded_requests(&self) -> Vec<LlmRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl LlmClient for MockLlmClient {
    async fn complete(&self, request: &LlmRequest) -> Result<LlmResponse, LlmError> {
        self.requests.lock().unwrap().push(request.clone());
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(LlmError::network("No mock response queued")))
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }
}

// ============================================================================
// Scripted Turn Executor
// ============================================================================

/// A call observed by [`ScriptedTurnExecutor`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedTurn {
    pub agent: AgentName,
    pub history_len: usize,
    pub input: Message,
}

/// Turn executor that replays queued outputs in order
#[derive(Default)]
pub struct ScriptedTurnExecutor {
    outputs: Mutex<VecDeque<Result<TurnOutput, TurnError>>>,
    pub turns: Mutex<Vec<RecordedTurn>>,
}

impl ScriptedTurnExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn queue(&self, output: TurnOutput) -> &Self {
        self.outputs.lock().unwrap().push_back(Ok(output));
        self
    }

    pub fn queue_error(&self, error: TurnError) -> &Self {
        self.outputs.lock().unwrap().push_back(Err(error));
        self
    }

    pub fn recorded_turns(&self) -> Vec<RecordedTurn> {
        self.turns.lock().unwrap().clone()
    }

    /// Agents in the order they ran
    pub fn agents_run(&self) -> Vec<String> {
        self.recorded_turns()
            .into_iter()
            .map(|t| t.agent.to_string())
            .collect()
    }
}

#[async_trait]
impl TurnExecutor for ScriptedTurnExecutor {
    async fn run_turn(
        &self,
        agent: &Agent,
        history: &[Message],
        input: &Message,
    ) -> Result<TurnOutput, TurnError> {
        self.turns.lock().unwrap().push(RecordedTurn {
            agent: agent.name().clone(),
            history_len: history.len(),
            input: input.clone(),
        });
        self.outputs
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(TurnError::Llm(LlmError::network("No scripted turn queued"))))
    }
}

/// Scripted executor that parks every turn until the test releases it
pub struct GatedTurnExecutor {
    inner: ScriptedTurnExecutor,
    entered: tokio::sync::Notify,
    gate: tokio::sync::Semaphore,
}

impl GatedTurnExecutor {
    pub fn new() -> Self {
        Self {
            inner: ScriptedTurnExecutor::new(),
            entered: tokio::sync::Notify::new(),
            gate: tokio::sync::Semaphore::new(0),
        }
    }

    pub fn scripted(&self) -> &ScriptedTurnExecutor {
        &self.inner
    }

    /// Resolves once a turn is parked at the gate
    pub async fn entered(&self) {
        self.entered.notified().await;
    }

    /// Let one parked turn proceed
    pub fn release(&self) {
        self.gate.add_permits(1);
    }
}

#[async_trait]
impl TurnExecutor for GatedTurnExecutor {
    async fn run_turn(
        &self,
        agent: &Agent,
        history: &[Message],
        input: &Message,
    ) -> Result<TurnOutput, TurnError> {
        self.entered.notify_one();
        self.gate.acquire().await.unwrap().forget();
        self.inner.run_turn(agent, history, input).await
    }
}

// ============================================================================
// Mock Content Source
// ============================================================================

/// Serves canned pages by URL
#[derive(Default)]
pub struct MockContentSource {
    pages: Mutex<HashMap<String, Result<String, FetchError>>>,
    requested: Mutex<Vec<String>>,
}

impl MockContentSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, url: impl Into<String>, text: impl Into<String>) {
        self.pages.lock().unwrap().insert(url.into(), Ok(text.into()));
    }

    pub fn fail(&self, url: impl Into<String>, error: FetchError) {
        self.pages.lock().unwrap().insert(url.into(), Err(error));
    }

    pub fn requested_urls(&self) -> Vec<String> {
        self.requested.lock().unwrap().clone()
    }
}

#[async_trait]
impl ContentSource for MockContentSource {
    async fn fetch_page_text(&self, url: &str) -> Result<String, FetchError> {
        self.requested.lock().unwrap().push(url.to_string());
        self.pages
            .lock()
            .unwrap()
            .get(url)
            .cloned()
            .unwrap_or_else(|| Err(FetchError::Navigation(format!("no page at {url}"))))
    }
}

// ============================================================================
// Mock Session Store
// ============================================================================

/// In-memory session store; saves can be made to fail
#[derive(Default)]
pub struct MockSessionStore {
    sessions: Mutex<HashMap<String, StoredSession>>,
    /// Insertion order stands in for update time
    order: Mutex<Vec<String>>,
    fail_saves: Mutex<bool>,
    pub save_count: Mutex<usize>,
}

impl MockSessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_fail_saves(&self, fail: bool) {
        *self.fail_saves.lock().unwrap() = fail;
    }

    pub fn get(&self, id: &str) -> Option<StoredSession> {
        self.sessions.lock().unwrap().get(id).cloned()
    }

    /// Write a raw row, bypassing the session manager
    pub fn put(&self, id: &str, title: &str, snapshot: &str) {
        self.sessions.lock().unwrap().insert(
            id.to_string(),
            StoredSession {
                id: id.to_string(),
                title: title.to_string(),
                snapshot: snapshot.to_string(),
            },
        );
        let mut order = self.order.lock().unwrap();
        order.retain(|existing| existing != id);
        order.push(id.to_string());
    }

    pub fn saves(&self) -> usize {
        *self.save_count.lock().unwrap()
    }
}

#[async_trait]
impl SessionStore for MockSessionStore {
    async fn load(&self, id: &str) -> Result<StoredSession, StoreError> {
        self.get(id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }

    async fn save(&self, session: &StoredSession) -> Result<(), StoreError> {
        if *self.fail_saves.lock().unwrap() {
            return Err(StoreError::Backend("disk full".to_string()));
        }
        self.put(&session.id, &session.title, &session.snapshot);
        *self.save_count.lock().unwrap() += 1;
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<(), StoreError> {
        self.sessions.lock().unwrap().remove(id);
        self.order.lock().unwrap().retain(|existing| existing != id);
        Ok(())
    }

    async fn list(&self) -> Result<Vec<(String, String)>, StoreError> {
        let sessions = self.sessions.lock().unwrap();
        Ok(self
            .order
            .lock()
            .unwrap()
            .iter()
            .rev()
            .filter_map(|id| sessions.get(id).map(|s| (s.id.clone(), s.title.clone())))
            .collect())
    }
}
