//! Registry of agents and their permitted handoffs

use super::agent::{Agent, AgentName, AgentProfile, Participant, USER};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("Agent registered twice: {0}")]
    DuplicateAgent(AgentName),
    #[error("'user' is reserved for the human participant and cannot name an agent")]
    ReservedName,
    #[error("Agent {agent} lists unknown handoff target {target}")]
    UnknownHandoffTarget { agent: AgentName, target: Participant },
    #[error("Entry agent {0} is not registered")]
    MissingEntryAgent(AgentName),
    #[error("Agent not found: {0}")]
    AgentNotFound(AgentName),
    #[error("Illegal handoff from {from} to {target}")]
    InvalidHandoffTarget { from: AgentName, target: Participant },
}

/// Fixed topology of agents. Built once, shared read-only.
#[derive(Debug)]
pub struct AgentRegistry {
    agents: HashMap<AgentName, Arc<Agent>>,
    /// Registration order, for stable iteration
    order: Vec<AgentName>,
    entry: AgentName,
}

impl AgentRegistry {
    /// Start building a registry whose new sessions begin at `entry`
    pub fn builder(entry: impl Into<String>) -> AgentRegistryBuilder {
        AgentRegistryBuilder {
            entry: AgentName::new(entry),
            agents: Vec::new(),
        }
    }

    /// Look up an agent by name
    pub fn resolve(&self, name: &AgentName) -> Result<Arc<Agent>, RegistryError> {
        self.agents
            .get(name)
            .cloned()
            .ok_or_else(|| RegistryError::AgentNotFound(name.clone()))
    }

    pub fn entry(&self) -> &AgentName {
        &self.entry
    }

    pub fn contains(&self, name: &AgentName) -> bool {
        self.agents.contains_key(name)
    }

    pub fn agents(&self) -> impl Iterator<Item = &Arc<Agent>> {
        self.order.iter().filter_map(|name| self.agents.get(name))
    }

    /// Check a proposed handoff against the source agent's permitted targets
    pub fn validate_handoff(
        &self,
        source: &AgentName,
        target: &Participant,
    ) -> Result<(), RegistryError> {
        let agent = self.resolve(source)?;
        if agent.can_hand_off_to(target) {
            Ok(())
        } else {
            Err(RegistryError::InvalidHandoffTarget {
                from: source.clone(),
                target: target.clone(),
            })
        }
    }
}

pub struct AgentRegistryBuilder {
    entry: AgentName,
    agents: Vec<Agent>,
}

impl AgentRegistryBuilder {
    /// Register an agent with its permitted handoff targets.
    ///
    /// Duplicate targets are collapsed; declaration order is kept because it
    /// decides the order handoff tools are offered to the model.
    pub fn register(
        mut self,
        profile: AgentProfile,
        targets: impl IntoIterator<Item = Participant>,
    ) -> Self {
        let mut handoffs: Vec<Participant> = Vec::new();
        for target in targets {
            if !handoffs.contains(&target) {
                handoffs.push(target);
            }
        }
        self.agents.push(Agent { profile, handoffs });
        self
    }

    /// Validate the topology and freeze it
    pub fn build(self) -> Result<AgentRegistry, RegistryError> {
        let mut agents = HashMap::with_capacity(self.agents.len());
        let mut order = Vec::with_capacity(self.agents.len());

        for agent in self.agents {
            if agent.name().as_str() == USER {
                return Err(RegistryError::ReservedName);
            }
            if agents.contains_key(agent.name()) {
                return Err(RegistryError::DuplicateAgent(agent.name().clone()));
            }
            order.push(agent.name().clone());
            agents.insert(agent.name().clone(), Arc::new(agent));
        }

        for agent in agents.values() {
            for target in &agent.handoffs {
                if let Participant::Agent(name) = target {
                    if !agents.contains_key(name) {
                        return Err(RegistryError::UnknownHandoffTarget {
                            agent: agent.name().clone(),
                            target: target.clone(),
                        });
                    }
                }
            }
        }

        if !agents.contains_key(&self.entry) {
            return Err(RegistryError::MissingEntryAgent(self.entry));
        }

        Ok(AgentRegistry {
            agents,
            order,
            entry: self.entry,
        })
    }
}
