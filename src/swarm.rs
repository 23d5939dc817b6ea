//! Agent definitions and the handoff topology
//!
//! The swarm is a fixed directed graph: each agent names the participants it
//! may hand control to. The graph is validated once at construction and
//! consulted again for every handoff an agent proposes at runtime.

mod agent;
mod registry;
mod teaching;

pub use agent::{Agent, AgentName, Capability, Participant};
pub use registry::{AgentRegistry, RegistryError};
pub use teaching::{
    teaching_swarm, COURSE_OUTLINE_AGENT, DATA_CLEANING_AGENT, MASTER_AGENT, QUIZ_AGENT,
    TOPIC_EXPLAINER, WEB_SCRAPING_AGENT,
};
