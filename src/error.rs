//! Rejection taxonomy for session intents.
//!
//! Nothing here is fatal: a rejected intent degrades to "request ignored" on
//! the authority and the caller observes the outcome through the next
//! replicated snapshot, never through an error channel.

use thiserror::Error;

use crate::state::lifecycle::{InvalidTransition, Phase};

/// Reasons the authority drops an intent without mutating session state.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Reject {
    /// The session already holds the configured maximum of participants.
    #[error("session is full")]
    SessionFull,
    /// The participant is already part of the session.
    #[error("participant {0} already joined")]
    AlreadyJoined(i32),
    /// The participant is not part of the session.
    #[error("participant {0} is not in the session")]
    UnknownParticipant(i32),
    /// The requested team index is outside the configured team count.
    #[error("team {0} does not exist")]
    InvalidTeam(i8),
    /// The requested team already holds its configured maximum of members.
    #[error("team {0} is full")]
    TeamFull(i8),
    /// Team selection was requested in a free-for-all session.
    #[error("teams are disabled for this session")]
    TeamsDisabled,
    /// The intent is not valid in the current lifecycle phase.
    #[error("not allowed while the session is {0:?}")]
    WrongPhase(Phase),
    /// The session does not meet the readiness predicate yet.
    #[error("session is not ready to start")]
    NotReady,
    /// No node currently holds authority, so the intent has nowhere to go.
    #[error("no node currently holds authority")]
    NoAuthority,
}

impl From<InvalidTransition> for Reject {
    fn from(err: InvalidTransition) -> Self {
        Reject::WrongPhase(err.from)
    }
}
