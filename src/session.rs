//! Sessions and their persisted snapshots

use crate::state_machine::{Message, SwarmState};
use crate::swarm::AgentName;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Current snapshot format version
pub const SNAPSHOT_VERSION: u32 = 1;

/// One `(source, text)` pair of the visible transcript
pub type ConversationEntry = (String, String);

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SnapshotError {
    #[error("Malformed snapshot: {0}")]
    Malformed(String),
    #[error("Unsupported snapshot version {0}")]
    UnsupportedVersion(u32),
    #[error("Snapshot was saved mid-chain while {0} held control")]
    InterruptedChain(AgentName),
    #[error("Snapshot references unknown agent {0}")]
    UnknownAgent(AgentName),
    #[error("Snapshot state disagrees with its history about where to resume")]
    ResumePointMismatch,
}

/// Serialized form of a session: the state plus the full transcript.
///
/// The transcript alone determines the resume point; the state is kept so
/// that a restore can be validated against it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub version: u32,
    pub state: SwarmState,
    pub history: Vec<Message>,
}

impl Snapshot {
    pub fn to_json(&self) -> Result<String, SnapshotError> {
        serde_json::to_string(self).map_err(|e| SnapshotError::Malformed(e.to_string()))
    }

    pub fn from_json(json: &str) -> Result<Self, SnapshotError> {
        serde_json::from_str(json).map_err(|e| SnapshotError::Malformed(e.to_string()))
    }
}

/// A tutoring session held in memory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub id: String,
    pub title: String,
    pub state: SwarmState,
    /// Append-only transcript
    pub history: Vec<Message>,
}

impl Session {
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            state: SwarmState::default(),
            history: Vec::new(),
        }
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            version: SNAPSHOT_VERSION,
            state: self.state.clone(),
            history: self.history.clone(),
        }
    }

    /// Content messages of the whole transcript
    pub fn conversation(&self) -> Vec<ConversationEntry> {
        conversation_of(&self.history)
    }
}

/// Project a slice of messages onto the visible `(source, text)` transcript
pub fn conversation_of(messages: &[Message]) -> Vec<ConversationEntry> {
    messages
        .iter()
        .filter_map(Message::as_content)
        .map(|(source, text)| (source.to_string(), text.to_string()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state_machine::ResumePoint;
    use crate::swarm::Participant;
    use chrono::{DateTime, Utc};

    fn at() -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000, 0).unwrap()
    }

    #[test]
    fn test_conversation_skips_handoffs() {
        let mut session = Session::new("s1", "Rust ownership");
        session.history = vec![
            Message::content("user", "https://doc.rust-lang.org/book/ch04-01.html", at()),
            Message::content(AgentName::new("master_agent"), "Fetching that page.", at()),
            Message::handoff(AgentName::new("master_agent"), "web_scraping_agent", None, at()),
        ];

        assert_eq!(
            session.conversation(),
            vec![
                (
                    "user".to_string(),
                    "https://doc.rust-lang.org/book/ch04-01.html".to_string()
                ),
                ("master_agent".to_string(), "Fetching that page.".to_string()),
            ]
        );
    }

    #[test]
    fn test_snapshot_json_shape() {
        let mut session = Session::new("s1", "t");
        session.history.push(Message::handoff(
            AgentName::new("quiz_agent"),
            Participant::User,
            None,
            at(),
        ));
        session.state = SwarmState::AwaitingUserInput {
            resume_point: Some(ResumePoint {
                source: AgentName::new("quiz_agent"),
                target: Participant::User,
            }),
        };

        let json = session.snapshot().to_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["version"], 1);
        assert_eq!(value["state"]["type"], "awaiting_user_input");
        assert_eq!(value["history"][0]["type"], "handoff");

        assert_eq!(Snapshot::from_json(&json).unwrap(), session.snapshot());
    }

    #[test]
    fn test_garbage_is_malformed() {
        assert!(matches!(
            Snapshot::from_json("{\"version\": 1, \"state\": 7}"),
            Err(SnapshotError::Malformed(_))
        ));
    }
}
