//! Session recovery from persisted snapshots
//!
//! A snapshot is only accepted when it is consistent with the running swarm:
//! known version, no agent mid-chain, only registered agents, and a state
//! whose resume point agrees with the one recoverable from the transcript.

use crate::session::{Session, Snapshot, SnapshotError, SNAPSHOT_VERSION};
use crate::state_machine::{Message, ResumePoint, SwarmState};
use crate::swarm::AgentRegistry;

/// Rebuild a session from its stored row
pub fn restore(
    id: &str,
    title: &str,
    snapshot_json: &str,
    registry: &AgentRegistry,
) -> Result<Session, SnapshotError> {
    let snapshot = Snapshot::from_json(snapshot_json)?;
    validate(&snapshot, registry)?;

    Ok(Session {
        id: id.to_string(),
        title: title.to_string(),
        state: snapshot.state,
        history: snapshot.history,
    })
}

fn validate(snapshot: &Snapshot, registry: &AgentRegistry) -> Result<(), SnapshotError> {
    if snapshot.version != SNAPSHOT_VERSION {
        return Err(SnapshotError::UnsupportedVersion(snapshot.version));
    }

    // Only committed states are ever saved, so a running agent means the
    // snapshot was written by something else.
    if let SwarmState::AgentRunning { agent, .. } = &snapshot.state {
        return Err(SnapshotError::InterruptedChain(agent.clone()));
    }

    for message in &snapshot.history {
        let target = match message {
            Message::Content { .. } => None,
            Message::Handoff { target, .. } => Some(target),
        };
        for participant in std::iter::once(message.source()).chain(target) {
            if let Some(agent) = participant.as_agent() {
                if !registry.contains(agent) {
                    return Err(SnapshotError::UnknownAgent(agent.clone()));
                }
            }
        }
    }

    if snapshot.state.resume_point() != ResumePoint::from_history(&snapshot.history).as_ref() {
        return Err(SnapshotError::ResumePointMismatch);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state_machine::StopReason;
    use crate::swarm::{teaching_swarm, AgentName, Participant, QUIZ_AGENT};
    use chrono::{DateTime, Utc};

    fn at() -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000, 0).unwrap()
    }

    fn quiz_session() -> Session {
        let mut session = Session::new("s-1", "Ownership quiz");
        session.history = vec![
            Message::content(Participant::User, "start", at()),
            Message::content(AgentName::new(QUIZ_AGENT), "Q1: what moves?", at()),
            Message::handoff(AgentName::new(QUIZ_AGENT), Participant::User, None, at()),
        ];
        session.state = SwarmState::AwaitingUserInput {
            resume_point: Some(ResumePoint {
                source: AgentName::new(QUIZ_AGENT),
                target: Participant::User,
            }),
        };
        session
    }

    fn restore_session(session: &Session) -> Result<Session, SnapshotError> {
        let json = session.snapshot().to_json().unwrap();
        restore(&session.id, &session.title, &json, &teaching_swarm().unwrap())
    }

    #[test]
    fn test_restore_round_trip() {
        let session = quiz_session();
        assert_eq!(restore_session(&session).unwrap(), session);
    }

    #[test]
    fn test_restore_terminated_session() {
        let mut session = quiz_session();
        session.state = SwarmState::Terminated {
            reason: StopReason::TextMention,
            resume_point: session.state.resume_point().cloned(),
        };
        assert_eq!(restore_session(&session).unwrap(), session);
    }

    #[test]
    fn test_rejects_running_state() {
        let mut session = quiz_session();
        session.state = SwarmState::AgentRunning {
            agent: AgentName::new(QUIZ_AGENT),
            auto_turns: 1,
            resume_point: None,
        };
        assert_eq!(
            restore_session(&session),
            Err(SnapshotError::InterruptedChain(AgentName::new(QUIZ_AGENT)))
        );
    }

    #[test]
    fn test_rejects_unknown_agent() {
        let mut session = quiz_session();
        session
            .history
            .push(Message::content(AgentName::new("ghost_agent"), "boo", at()));
        assert_eq!(
            restore_session(&session),
            Err(SnapshotError::UnknownAgent(AgentName::new("ghost_agent")))
        );
    }

    #[test]
    fn test_rejects_resume_point_mismatch() {
        let mut session = quiz_session();
        session.state = SwarmState::AwaitingUserInput { resume_point: None };
        assert_eq!(
            restore_session(&session),
            Err(SnapshotError::ResumePointMismatch)
        );
    }

    #[test]
    fn test_rejects_unknown_version_and_garbage() {
        let registry = teaching_swarm().unwrap();
        let json = r#"{"version":2,"state":{"type":"awaiting_user_input"},"history":[]}"#;
        assert_eq!(
            restore("s", "t", json, &registry),
            Err(SnapshotError::UnsupportedVersion(2))
        );
        assert!(matches!(
            restore("s", "t", "not json", &registry),
            Err(SnapshotError::Malformed(_))
        ));
    }
}
