//! Lifecycle state machine: four phases anchored to the wall clock.
//!
//! Timed phases store the timestamp at which they began; remaining time is
//! re-derived from that anchor on every query, which keeps the computation
//! idempotent across nodes and immune to replication jitter.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::SessionConfig;

/// High-level phases a session can be in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Phase {
    /// Participants gather; the session can be configured and started.
    Waiting,
    /// Countdown before play begins; scores have been reset.
    Countdown,
    /// Play is in progress and scores accumulate.
    Active,
    /// Final standings are shown before the reset back to waiting.
    Ended,
}

/// Events that can be applied to the state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleEvent {
    /// A start was requested while waiting (readiness is checked upstream).
    RequestStart,
    /// The countdown duration elapsed.
    CountdownElapsed,
    /// The active duration elapsed.
    ActiveElapsed,
    /// An early end was requested during countdown or play.
    EndEarly,
    /// The participant count fell below the configured minimum.
    Abort,
    /// The post-game grace delay elapsed.
    GraceElapsed,
}

/// Error returned when attempting to apply an invalid transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("invalid transition: {event:?} cannot be applied while in {from:?}")]
pub struct InvalidTransition {
    /// The phase the state machine was in when the invalid event was received.
    pub from: Phase,
    /// The event that cannot be applied from this phase.
    pub event: LifecycleEvent,
}

/// Lifecycle state machine for one session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lifecycle {
    phase: Phase,
    anchor_ms: u64,
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self {
            phase: Phase::Waiting,
            anchor_ms: 0,
        }
    }
}

impl Lifecycle {
    /// Create a new state machine initialised in the waiting phase.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inspect the current phase.
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Wall-clock timestamp at which the current timed phase began.
    pub fn anchor_ms(&self) -> u64 {
        self.anchor_ms
    }

    /// Adopt replicated phase and anchor wholesale, replacing local state.
    pub(crate) fn restore(&mut self, phase: Phase, anchor_ms: u64) {
        self.phase = phase;
        self.anchor_ms = anchor_ms;
    }

    /// Apply an event, anchoring the new phase at `now_ms`.
    pub fn apply(&mut self, event: LifecycleEvent, now_ms: u64) -> Result<Phase, InvalidTransition> {
        let next = self.compute_transition(event)?;
        self.phase = next;
        self.anchor_ms = now_ms;
        Ok(next)
    }

    /// Remaining time in the current timed phase, or `None` while waiting.
    pub fn remaining_ms(&self, now_ms: u64, config: &SessionConfig) -> Option<u64> {
        let duration = config.phase_duration_ms(self.phase)?;
        Some(duration.saturating_sub(now_ms.saturating_sub(self.anchor_ms)))
    }

    /// Automatic event due at `now_ms`, if the current phase has timed out.
    ///
    /// Only the authority polls this, on its periodic tick.
    pub fn poll_due(&self, now_ms: u64, config: &SessionConfig) -> Option<LifecycleEvent> {
        let duration = config.phase_duration_ms(self.phase)?;
        if now_ms.saturating_sub(self.anchor_ms) < duration {
            return None;
        }
        match self.phase {
            Phase::Countdown => Some(LifecycleEvent::CountdownElapsed),
            Phase::Active => Some(LifecycleEvent::ActiveElapsed),
            Phase::Ended => Some(LifecycleEvent::GraceElapsed),
            Phase::Waiting => None,
        }
    }

    /// Compute a transition from an event if the transition is valid.
    fn compute_transition(&self, event: LifecycleEvent) -> Result<Phase, InvalidTransition> {
        let next = match (self.phase, event) {
            (Phase::Waiting, LifecycleEvent::RequestStart) => Phase::Countdown,
            (Phase::Countdown, LifecycleEvent::CountdownElapsed) => Phase::Active,
            (Phase::Countdown | Phase::Active, LifecycleEvent::EndEarly) => Phase::Ended,
            (Phase::Countdown | Phase::Active, LifecycleEvent::Abort) => Phase::Waiting,
            (Phase::Active, LifecycleEvent::ActiveElapsed) => Phase::Ended,
            (Phase::Ended, LifecycleEvent::GraceElapsed) => Phase::Waiting,
            (from, event) => return Err(InvalidTransition { from, event }),
        };
        Ok(next)
    }
}
