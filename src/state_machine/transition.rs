//! Pure state transition function

use super::event::TurnOutput;
use super::state::{Message, ResumePoint, StopReason, SwarmContext, SwarmState};
use super::{Effect, Event};
use crate::swarm::{AgentName, Participant, RegistryError};
use chrono::{DateTime, Utc};
use thiserror::Error;

/// Result of a state transition
#[derive(Debug)]
pub struct TransitionResult {
    pub new_state: SwarmState,
    pub effects: Vec<Effect>,
}

impl TransitionResult {
    pub fn new(state: SwarmState) -> Self {
        Self {
            new_state: state,
            effects: vec![],
        }
    }

    pub fn with_effect(mut self, effect: Effect) -> Self {
        self.effects.push(effect);
        self
    }

    pub fn with_effects(mut self, effects: impl IntoIterator<Item = Effect>) -> Self {
        self.effects.extend(effects);
        self
    }
}

/// Errors that can occur during transition
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransitionError {
    #[error("An agent is still running, cannot accept a new message")]
    AgentBusy,
    #[error("Agent {0} finished its turn without a handoff or termination")]
    MissingHandoff(AgentName),
    #[error("Invalid transition: {0}")]
    InvalidTransition(String),
    #[error(transparent)]
    Registry(#[from] RegistryError),
}

/// Pure transition function
///
/// Given the same inputs it always produces the same outputs. Timestamps come
/// from the event, never from the clock.
pub fn transition(
    state: &SwarmState,
    context: &SwarmContext,
    event: Event,
) -> Result<TransitionResult, TransitionError> {
    match (state, event) {
        // ============================================================
        // User input
        // ============================================================

        // Awaiting or Terminated + UserMessage -> AgentRunning.
        // Terminated is the explicit restart and routes identically.
        (
            SwarmState::AwaitingUserInput { resume_point }
            | SwarmState::Terminated { resume_point, .. },
            Event::UserMessage { text, received_at },
        ) => route_user_message(context, resume_point.as_ref(), text, received_at),

        (SwarmState::AgentRunning { .. }, Event::UserMessage { .. }) => {
            Err(TransitionError::AgentBusy)
        }

        // ============================================================
        // Agent turns
        // ============================================================
        (
            SwarmState::AgentRunning {
                agent,
                auto_turns,
                resume_point,
            },
            Event::TurnCompleted {
                agent: finished,
                output,
                completed_at,
            },
        ) => {
            if &finished != agent {
                return Err(TransitionError::InvalidTransition(format!(
                    "turn completed by {finished} while {agent} holds control"
                )));
            }
            complete_turn(
                context,
                agent,
                *auto_turns,
                resume_point.as_ref(),
                output,
                completed_at,
            )
        }

        (state, Event::TurnCompleted { agent, .. }) => {
            Err(TransitionError::InvalidTransition(format!(
                "turn completed by {agent} while {} holds control",
                state.control_holder()
            )))
        }
    }
}

fn route_user_message(
    context: &SwarmContext,
    resume_point: Option<&ResumePoint>,
    text: String,
    received_at: DateTime<Utc>,
) -> Result<TransitionResult, TransitionError> {
    let target = match resume_point {
        Some(point) => point.source.clone(),
        None => context.registry.entry().clone(),
    };
    // A stale resume point naming an unregistered agent is a topology error
    context.registry.resolve(&target)?;

    let mut effects = vec![Effect::append(Message::content(
        Participant::User,
        text,
        received_at,
    ))];
    if resume_point.is_some() {
        effects.push(Effect::append(Message::handoff(
            Participant::User,
            target.clone(),
            None,
            received_at,
        )));
    }
    effects.push(Effect::run_turn(target.clone()));

    Ok(TransitionResult::new(SwarmState::AgentRunning {
        agent: target,
        auto_turns: 0,
        resume_point: resume_point.cloned(),
    })
    .with_effects(effects))
}

fn complete_turn(
    context: &SwarmContext,
    agent: &AgentName,
    auto_turns: u32,
    resume_point: Option<&ResumePoint>,
    output: TurnOutput,
    completed_at: DateTime<Utc>,
) -> Result<TransitionResult, TransitionError> {
    // Validate before producing any effect so a rejected proposal appends nothing
    if let Some(handoff) = &output.handoff {
        context.registry.validate_handoff(agent, &handoff.target)?;
    }

    let stop = context.termination.evaluate(&output);
    if stop.is_none() && output.handoff.is_none() {
        return Err(TransitionError::MissingHandoff(agent.clone()));
    }

    let mut effects: Vec<Effect> = output
        .messages
        .into_iter()
        .map(|text| Effect::append(Message::content(agent.clone(), text, completed_at)))
        .collect();

    let resume_point = match output.handoff {
        Some(handoff) => {
            let point = ResumePoint {
                source: agent.clone(),
                target: handoff.target.clone(),
            };
            effects.push(Effect::append(Message::handoff(
                agent.clone(),
                handoff.target,
                handoff.payload,
                completed_at,
            )));
            Some(point)
        }
        None => resume_point.cloned(),
    };

    let new_state = match stop {
        Some(StopReason::HandoffToUser) => SwarmState::AwaitingUserInput { resume_point },
        Some(reason) => SwarmState::Terminated {
            reason,
            resume_point,
        },
        None => {
            let turns = auto_turns + 1;
            // No stop signal implies an agent handoff
            let next = match resume_point.as_ref().map(|point| &point.target) {
                Some(Participant::Agent(next)) => next.clone(),
                _ => return Err(TransitionError::MissingHandoff(agent.clone())),
            };
            if turns >= context.max_auto_turns {
                tracing::warn!(
                    agent = %agent,
                    turns,
                    "Automatic turn limit reached, stopping chain"
                );
                SwarmState::Terminated {
                    reason: StopReason::TurnLimit,
                    resume_point,
                }
            } else {
                return Ok(TransitionResult::new(SwarmState::AgentRunning {
                    agent: next.clone(),
                    auto_turns: turns,
                    resume_point,
                })
                .with_effects(effects)
                .with_effect(Effect::run_turn(next)));
            }
        }
    };

    Ok(TransitionResult::new(new_state)
        .with_effects(effects)
        .with_effect(Effect::Commit))
}
