//! Agent identity and handoff participants

use serde::{Deserialize, Serialize};
use std::fmt;

/// Reserved participant name for the human learner
pub const USER: &str = "user";

/// Name of a registered agent
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AgentName(String);

impl AgentName {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AgentName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for AgentName {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

/// One side of a handoff: the user or a named agent
///
/// Serialized as a bare string so persisted transcripts read naturally
/// (`"user"`, `"quiz_agent"`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Participant {
    User,
    Agent(AgentName),
}

impl Participant {
    pub fn agent(name: impl Into<String>) -> Self {
        Participant::Agent(AgentName::new(name))
    }

    pub fn is_user(&self) -> bool {
        matches!(self, Participant::User)
    }

    pub fn as_agent(&self) -> Option<&AgentName> {
        match self {
            Participant::User => None,
            Participant::Agent(name) => Some(name),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Participant::User => USER,
            Participant::Agent(name) => name.as_str(),
        }
    }
}

impl From<String> for Participant {
    fn from(name: String) -> Self {
        if name == USER {
            Participant::User
        } else {
            Participant::Agent(AgentName(name))
        }
    }
}

impl From<&str> for Participant {
    fn from(name: &str) -> Self {
        Participant::from(name.to_string())
    }
}

impl From<Participant> for String {
    fn from(participant: Participant) -> Self {
        match participant {
            Participant::User => USER.to_string(),
            Participant::Agent(name) => name.0,
        }
    }
}

impl From<AgentName> for Participant {
    fn from(name: AgentName) -> Self {
        Participant::Agent(name)
    }
}

impl fmt::Display for Participant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// External side-effecting capability an agent may consult during its turn
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    /// Fetch the text of a web page through the content source
    FetchPage,
}

/// Everything about an agent except its place in the topology
#[derive(Debug, Clone)]
pub struct AgentProfile {
    pub name: AgentName,
    /// Short summary shown to other agents in handoff tool descriptions
    pub description: String,
    pub system_prompt: String,
    pub capability: Option<Capability>,
}

impl AgentProfile {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        system_prompt: impl Into<String>,
    ) -> Self {
        Self {
            name: AgentName::new(name),
            description: description.into(),
            system_prompt: system_prompt.into(),
            capability: None,
        }
    }

    pub fn with_capability(mut self, capability: Capability) -> Self {
        self.capability = Some(capability);
        self
    }
}

/// A registered agent. Immutable once the registry is built.
#[derive(Debug, Clone)]
pub struct Agent {
    pub profile: AgentProfile,
    /// Permitted handoff targets, in declaration order
    pub handoffs: Vec<Participant>,
}

impl Agent {
    pub fn name(&self) -> &AgentName {
        &self.profile.name
    }

    pub fn can_hand_off_to(&self, target: &Participant) -> bool {
        self.handoffs.contains(target)
    }

    pub fn has_capability(&self, capability: Capability) -> bool {
        self.profile.capability == Some(capability)
    }
}
