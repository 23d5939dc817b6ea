//! Events that can occur in a session

use crate::swarm::{AgentName, Participant};
use chrono::{DateTime, Utc};

/// Events that trigger state transitions.
///
/// Timestamps travel with the event so the transition stays pure.
#[derive(Debug, Clone)]
pub enum Event {
    UserMessage {
        text: String,
        received_at: DateTime<Utc>,
    },
    TurnCompleted {
        agent: AgentName,
        output: TurnOutput,
        completed_at: DateTime<Utc>,
    },
}

/// What one agent turn produced
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TurnOutput {
    /// Content messages, in order
    pub messages: Vec<String>,
    /// At most one handoff per turn
    pub handoff: Option<HandoffDirective>,
    /// Executor-level termination signal
    pub terminate: bool,
}

impl TurnOutput {
    pub fn handoff(messages: Vec<String>, target: impl Into<Participant>) -> Self {
        Self {
            messages,
            handoff: Some(HandoffDirective::to(target)),
            terminate: false,
        }
    }

    /// A terminal turn carrying a message that explains the failure
    pub fn terminal(message: impl Into<String>) -> Self {
        Self {
            messages: vec![message.into()],
            handoff: None,
            terminate: true,
        }
    }
}

/// A proposed transfer of control
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandoffDirective {
    pub target: Participant,
    pub payload: Option<String>,
}

impl HandoffDirective {
    pub fn to(target: impl Into<Participant>) -> Self {
        Self {
            target: target.into(),
            payload: None,
        }
    }

    pub fn with_payload(mut self, payload: impl Into<String>) -> Self {
        self.payload = Some(payload.into());
        self
    }
}
