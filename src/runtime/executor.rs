//! Swarm runtime: drives the pure state machine and executes its effects

use super::traits::{TurnError, TurnExecutor};
use crate::session::Session;
use crate::state_machine::{
    transition, Effect, Event, Message, SwarmContext, TransitionError,
};
use crate::swarm::AgentName;
use chrono::Utc;
use thiserror::Error;
use tracing::Instrument;

/// Why one invocation failed. The caller's session is left untouched.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum InvocationError {
    #[error(transparent)]
    Transition(#[from] TransitionError),
    #[error(transparent)]
    Turn(#[from] TurnError),
    #[error("Event chain ended without committing (state: {0})")]
    Uncommitted(String),
}

/// The outcome of processing one user message
#[derive(Debug, Clone)]
pub struct Invocation {
    /// The session after the chain committed
    pub session: Session,
    /// Messages appended during this invocation, user input included
    pub produced: Vec<Message>,
}

/// Executes user messages against a session, one chain of agent turns at a time
pub struct SwarmRuntime<E: TurnExecutor> {
    context: SwarmContext,
    executor: E,
}

impl<E: TurnExecutor> SwarmRuntime<E> {
    pub fn new(context: SwarmContext, executor: E) -> Self {
        Self { context, executor }
    }

    pub fn context(&self) -> &SwarmContext {
        &self.context
    }

    /// Feed `text` to the session and run agent turns until control returns
    /// to the user or the chain terminates.
    ///
    /// Works on a copy, so any error leaves `session` exactly as it was.
    pub async fn process(
        &self,
        session: &Session,
        text: &str,
    ) -> Result<Invocation, InvocationError> {
        let span = tracing::info_span!("invocation", session_id = %session.id);
        self.run_chain(session.clone(), text.to_string())
            .instrument(span)
            .await
    }

    async fn run_chain(
        &self,
        mut working: Session,
        text: String,
    ) -> Result<Invocation, InvocationError> {
        let start = working.history.len();
        let mut pending = Some(Event::UserMessage {
            text,
            received_at: Utc::now(),
        });
        let mut committed = false;

        while let Some(event) = pending.take() {
            let result = transition(&working.state, &self.context, event)?;
            working.state = result.new_state;

            for effect in result.effects {
                match effect {
                    Effect::AppendMessage(message) => working.history.push(message),
                    Effect::RunTurn { agent } => {
                        pending = Some(self.run_turn(&agent, &working.history).await?);
                    }
                    Effect::Commit => committed = true,
                }
            }
        }

        if !committed {
            return Err(InvocationError::Uncommitted(format!("{:?}", working.state)));
        }

        tracing::info!(
            state = ?working.state,
            appended = working.history.len() - start,
            "Invocation committed"
        );

        let produced = working.history.split_off(start);
        working.history.extend(produced.iter().cloned());
        Ok(Invocation {
            session: working,
            produced,
        })
    }

    async fn run_turn(
        &self,
        agent: &AgentName,
        history: &[Message],
    ) -> Result<Event, InvocationError> {
        let resolved = self
            .context
            .registry
            .resolve(agent)
            .map_err(TransitionError::from)?;
        let (input, earlier) = history
            .split_last()
            .ok_or_else(|| TurnError::MissingInput(agent.clone()))?;

        tracing::debug!(agent = %agent, history_len = earlier.len(), "Running agent turn");
        let output = self
            .executor
            .run_turn(&resolved, earlier, input)
            .await
            .inspect_err(|e| tracing::warn!(agent = %agent, error = %e, "Agent turn failed"))?;

        Ok(Event::TurnCompleted {
            agent: agent.clone(),
            output,
            completed_at: Utc::now(),
        })
    }
}
