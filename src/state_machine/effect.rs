//! Effects produced by state transitions

use super::state::Message;
use crate::swarm::AgentName;

/// Effects to be executed after state transition
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Append a message to the session transcript
    AppendMessage(Message),

    /// Run one turn of the named agent
    RunTurn { agent: AgentName },

    /// The chain stopped; persist the session
    Commit,
}

impl Effect {
    pub fn append(message: Message) -> Self {
        Effect::AppendMessage(message)
    }

    pub fn run_turn(agent: AgentName) -> Self {
        Effect::RunTurn { agent }
    }
}
