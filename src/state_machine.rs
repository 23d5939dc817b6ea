//! Core handoff state machine
//!
//! Implements the Elm Architecture pattern with pure state transitions: the
//! runtime feeds events in, executes the returned effects, and feeds turn
//! results back until a stop condition commits the session.

mod effect;
pub mod event;
pub mod state;
pub(crate) mod transition;

#[cfg(test)]
mod proptests;

pub use effect::Effect;
pub use event::{Event, HandoffDirective, TurnOutput};
pub use state::{
    Message, ResumePoint, StopReason, SwarmContext, SwarmState, TerminationCondition,
    DEFAULT_MAX_AUTO_TURNS, DEFAULT_TERMINATION_MARKER,
};
pub use transition::{transition, TransitionError};
