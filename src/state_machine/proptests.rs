//! Property-based tests for the state machine
//!
//! These tests drive the transition function with arbitrary event sequences
//! against the tutoring topology and check the invariants that must hold
//! after every accepted step.

use super::event::HandoffDirective;
use super::state::*;
use super::transition::*;
use super::*;
use crate::swarm::{teaching_swarm, AgentName, AgentRegistry, Participant};
use chrono::{DateTime, Utc};
use proptest::prelude::*;
use std::sync::Arc;

// ============================================================================
// Test Helpers
// ============================================================================

fn test_context(max_auto_turns: u32) -> SwarmContext {
    SwarmContext::new(Arc::new(teaching_swarm().unwrap())).with_max_auto_turns(max_auto_turns)
}

fn at() -> DateTime<Utc> {
    DateTime::from_timestamp(1_700_000_000, 0).unwrap()
}

const PARTICIPANTS: [&str; 7] = [
    "user",
    "master_agent",
    "web_scraping_agent",
    "data_cleaning_agent",
    "course_outline_agent",
    "topic_explainer",
    "quiz_agent",
];

/// Abstract step; turn steps are bound to whichever agent holds control
#[derive(Debug, Clone)]
enum Step {
    User(String),
    Turn {
        messages: Vec<String>,
        target: Option<usize>,
        terminate: bool,
        /// Report the turn as coming from a different participant
        impostor: Option<usize>,
    },
}

impl Step {
    fn into_event(self, state: &SwarmState) -> Event {
        match self {
            Step::User(text) => Event::UserMessage {
                text,
                received_at: at(),
            },
            Step::Turn {
                messages,
                target,
                terminate,
                impostor,
            } => {
                let agent = match (impostor, state.control_holder()) {
                    (Some(i), _) => AgentName::new(PARTICIPANTS[i]),
                    (None, Participant::Agent(name)) => name,
                    (None, Participant::User) => AgentName::new("master_agent"),
                };
                Event::TurnCompleted {
                    agent,
                    output: TurnOutput {
                        messages,
                        handoff: target.map(|i| HandoffDirective::to(PARTICIPANTS[i])),
                        terminate,
                    },
                    completed_at: at(),
                }
            }
        }
    }
}

// ============================================================================
// Arbitrary Generators
// ============================================================================

fn arb_text() -> impl Strategy<Value = String> {
    prop_oneof![
        8 => "[a-z ]{0,20}",
        1 => Just("done TERMINATE".to_string()),
    ]
}

fn arb_step() -> impl Strategy<Value = Step> {
    prop_oneof![
        1 => arb_text().prop_map(Step::User),
        4 => (
            proptest::collection::vec(arb_text(), 0..3),
            proptest::option::weighted(0.9, 0..PARTICIPANTS.len()),
            proptest::bool::weighted(0.05),
            proptest::option::weighted(0.05, 1..PARTICIPANTS.len()),
        )
            .prop_map(|(messages, target, terminate, impostor)| Step::Turn {
                messages,
                target,
                terminate,
                impostor,
            }),
    ]
}

// ============================================================================
// Invariant checks
// ============================================================================

fn control_is_defined(state: &SwarmState, registry: &AgentRegistry) -> bool {
    match state.control_holder() {
        Participant::User => !state.is_running(),
        Participant::Agent(name) => registry.contains(&name),
    }
}

fn appended_handoffs_are_legal(effects: &[Effect], registry: &AgentRegistry) -> bool {
    effects.iter().all(|effect| match effect {
        Effect::AppendMessage(Message::Handoff {
            source: Participant::Agent(source),
            target,
            ..
        }) => registry.validate_handoff(source, target).is_ok(),
        _ => true,
    })
}

fn apply(history: &mut Vec<Message>, effects: &[Effect]) {
    for effect in effects {
        if let Effect::AppendMessage(message) = effect {
            history.push(message.clone());
        }
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    // Control is never undefined and no illegal handoff is ever accepted
    #[test]
    fn prop_control_defined_and_handoffs_legal(
        steps in proptest::collection::vec(arb_step(), 0..40),
        max_auto_turns in 1u32..15,
    ) {
        let ctx = test_context(max_auto_turns);
        let mut state = SwarmState::default();

        for step in steps {
            let event = step.into_event(&state);
            if let Ok(result) = transition(&state, &ctx, event) {
                prop_assert!(
                    appended_handoffs_are_legal(&result.effects, &ctx.registry),
                    "illegal handoff accepted: {:?}",
                    result.effects
                );
                state = result.new_state;
                prop_assert!(control_is_defined(&state, &ctx.registry), "bad state {:?}", state);
            }
        }
    }

    // The stored resume point always agrees with the one rebuilt from history
    #[test]
    fn prop_resume_point_matches_history(
        steps in proptest::collection::vec(arb_step(), 0..40),
    ) {
        let ctx = test_context(12);
        let mut state = SwarmState::default();
        let mut history = Vec::new();

        for step in steps {
            let event = step.into_event(&state);
            if let Ok(result) = transition(&state, &ctx, event) {
                apply(&mut history, &result.effects);
                state = result.new_state;
                prop_assert_eq!(
                    state.resume_point().cloned(),
                    ResumePoint::from_history(&history)
                );
            }
        }
    }

    // Every transition out of a running chain either schedules the next turn
    // or commits, never both and never neither
    #[test]
    fn prop_chain_steps_run_or_commit(
        steps in proptest::collection::vec(arb_step(), 0..40),
        max_auto_turns in 1u32..15,
    ) {
        let ctx = test_context(max_auto_turns);
        let mut state = SwarmState::default();

        for step in steps {
            let event = step.into_event(&state);
            if let Ok(result) = transition(&state, &ctx, event) {
                let runs = result
                    .effects
                    .iter()
                    .filter(|e| matches!(e, Effect::RunTurn { .. }))
                    .count();
                let commits = result
                    .effects
                    .iter()
                    .filter(|e| matches!(e, Effect::Commit))
                    .count();
                prop_assert_eq!(runs + commits, 1);
                prop_assert_eq!(runs == 1, result.new_state.is_running());
                state = result.new_state;
            }
        }
    }

    // A running chain never exceeds the automatic turn budget
    #[test]
    fn prop_auto_turns_bounded(
        steps in proptest::collection::vec(arb_step(), 0..60),
        max_auto_turns in 1u32..6,
    ) {
        let ctx = test_context(max_auto_turns);
        let mut state = SwarmState::default();

        for step in steps {
            let event = step.into_event(&state);
            if let Ok(result) = transition(&state, &ctx, event) {
                state = result.new_state;
                if let SwarmState::AgentRunning { auto_turns, .. } = &state {
                    prop_assert!(*auto_turns < max_auto_turns);
                }
            }
        }
    }

    // User input is only ever accepted when the user holds control
    #[test]
    fn prop_user_message_requires_user_control(
        steps in proptest::collection::vec(arb_step(), 0..30),
        text in "[a-z]{1,10}",
    ) {
        let ctx = test_context(12);
        let mut state = SwarmState::default();

        for step in steps {
            let event = step.into_event(&state);
            if let Ok(result) = transition(&state, &ctx, event) {
                state = result.new_state;
            }
        }

        let outcome = transition(&state, &ctx, Step::User(text).into_event(&state));
        if state.is_running() {
            prop_assert_eq!(outcome.unwrap_err(), TransitionError::AgentBusy);
        } else {
            prop_assert!(outcome.is_ok());
        }
    }
}
