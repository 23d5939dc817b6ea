//! Swarm state types

use super::event::TurnOutput;
use crate::swarm::{AgentName, AgentRegistry, Participant};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Default upper bound on agent turns executed without user input
pub const DEFAULT_MAX_AUTO_TURNS: u32 = 12;

/// Default text token that stops the automatic chain
pub const DEFAULT_TERMINATION_MARKER: &str = "TERMINATE";

// ============================================================================
// Messages
// ============================================================================

/// One entry of a session's append-only transcript
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Message {
    /// Text authored by the user or an agent
    Content {
        source: Participant,
        text: String,
        created_at: DateTime<Utc>,
    },
    /// Control passed from one participant to another
    Handoff {
        source: Participant,
        target: Participant,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        payload: Option<String>,
        created_at: DateTime<Utc>,
    },
}

impl Message {
    pub fn content(
        source: impl Into<Participant>,
        text: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Message::Content {
            source: source.into(),
            text: text.into(),
            created_at,
        }
    }

    pub fn handoff(
        source: impl Into<Participant>,
        target: impl Into<Participant>,
        payload: Option<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Message::Handoff {
            source: source.into(),
            target: target.into(),
            payload,
            created_at,
        }
    }

    pub fn source(&self) -> &Participant {
        match self {
            Message::Content { source, .. } | Message::Handoff { source, .. } => source,
        }
    }

    /// `(source, text)` for content messages
    pub fn as_content(&self) -> Option<(&Participant, &str)> {
        match self {
            Message::Content { source, text, .. } => Some((source, text)),
            Message::Handoff { .. } => None,
        }
    }
}

// ============================================================================
// Resume point
// ============================================================================

/// The last handoff made by an agent, remembered while the user holds control
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResumePoint {
    /// Agent that made the handoff; the next user message is routed here
    pub source: AgentName,
    pub target: Participant,
}

impl ResumePoint {
    /// Recover the resume point from a transcript: the last handoff whose
    /// source is not the user.
    pub fn from_history(history: &[Message]) -> Option<Self> {
        history.iter().rev().find_map(|message| match message {
            Message::Handoff {
                source: Participant::Agent(source),
                target,
                ..
            } => Some(ResumePoint {
                source: source.clone(),
                target: target.clone(),
            }),
            _ => None,
        })
    }
}

// ============================================================================
// Swarm state
// ============================================================================

/// Why an automatic chain stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// An agent handed control to the user
    HandoffToUser,
    /// Produced text contained the termination marker
    TextMention,
    /// The turn executor signalled termination (capability failure)
    CapabilityFailure,
    /// Too many agent turns without user input
    TurnLimit,
}

/// Whose turn it is
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SwarmState {
    /// The user holds control
    AwaitingUserInput {
        #[serde(default)]
        resume_point: Option<ResumePoint>,
    },

    /// An agent holds control and turns execute without external input
    AgentRunning {
        agent: AgentName,
        /// Agent turns completed since the last user message
        auto_turns: u32,
        #[serde(default)]
        resume_point: Option<ResumePoint>,
    },

    /// The automatic chain stopped; the next user message restarts it
    Terminated {
        reason: StopReason,
        #[serde(default)]
        resume_point: Option<ResumePoint>,
    },
}

impl Default for SwarmState {
    fn default() -> Self {
        SwarmState::AwaitingUserInput { resume_point: None }
    }
}

impl SwarmState {
    /// The participant currently in control. Never undefined.
    pub fn control_holder(&self) -> Participant {
        match self {
            SwarmState::AgentRunning { agent, .. } => Participant::Agent(agent.clone()),
            SwarmState::AwaitingUserInput { .. } | SwarmState::Terminated { .. } => {
                Participant::User
            }
        }
    }

    pub fn resume_point(&self) -> Option<&ResumePoint> {
        match self {
            SwarmState::AwaitingUserInput { resume_point }
            | SwarmState::AgentRunning { resume_point, .. }
            | SwarmState::Terminated { resume_point, .. } => resume_point.as_ref(),
        }
    }

    pub fn is_terminated(&self) -> bool {
        matches!(self, SwarmState::Terminated { .. })
    }

    /// Check if an agent is mid-chain
    pub fn is_running(&self) -> bool {
        matches!(self, SwarmState::AgentRunning { .. })
    }
}

// ============================================================================
// Termination
// ============================================================================

/// Stop predicate evaluated after every agent turn: a handoff to the user,
/// a marker token in produced text, or an explicit executor signal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TerminationCondition {
    marker: String,
}

impl TerminationCondition {
    pub fn new(marker: impl Into<String>) -> Self {
        Self {
            marker: marker.into(),
        }
    }

    /// An empty marker never matches
    pub fn mentions_marker(&self, text: &str) -> bool {
        !self.marker.is_empty() && text.contains(&self.marker)
    }

    /// Decide whether a completed turn stops the chain.
    ///
    /// Executor signal and marker win over a handoff to the user, so a scraper
    /// failure is reported as a termination even if the model also handed off.
    pub fn evaluate(&self, output: &TurnOutput) -> Option<StopReason> {
        if output.terminate {
            return Some(StopReason::CapabilityFailure);
        }
        if output.messages.iter().any(|text| self.mentions_marker(text)) {
            return Some(StopReason::TextMention);
        }
        match &output.handoff {
            Some(handoff) if handoff.target.is_user() => Some(StopReason::HandoffToUser),
            _ => None,
        }
    }
}

impl Default for TerminationCondition {
    fn default() -> Self {
        Self::new(DEFAULT_TERMINATION_MARKER)
    }
}

// ============================================================================
// Context
// ============================================================================

/// Immutable configuration shared by every transition of a session
#[derive(Debug, Clone)]
pub struct SwarmContext {
    pub registry: Arc<AgentRegistry>,
    pub termination: TerminationCondition,
    pub max_auto_turns: u32,
}

impl SwarmContext {
    pub fn new(registry: Arc<AgentRegistry>) -> Self {
        Self {
            registry,
            termination: TerminationCondition::default(),
            max_auto_turns: DEFAULT_MAX_AUTO_TURNS,
        }
    }

    pub fn with_termination(mut self, termination: TerminationCondition) -> Self {
        self.termination = termination;
        self
    }

    pub fn with_max_auto_turns(mut self, max_auto_turns: u32) -> Self {
        self.max_auto_turns = max_auto_turns.max(1);
        self
    }
}
