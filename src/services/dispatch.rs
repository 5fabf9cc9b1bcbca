//! Callback dispatch: snapshot application and transition detection.
//!
//! Lifecycle callbacks fire only here, from the comparison of the
//! just-received snapshot against the last-observed one. A direct signal can
//! race ahead of the replicated fields that caused it; deriving callbacks
//! from the replicated state alone makes duplicate or early delivery
//! harmless. Catch-up snapshots adopt state as a baseline without firing
//! anything, so a late joiner never replays a round's side effects.

use tracing::{debug, warn};

use crate::config::MAX_PARTICIPANTS;
use crate::events::SessionEvent;
use crate::state::SharedNode;
use crate::state::lifecycle::Phase;
use crate::wire::WireSnapshot;

/// Apply a received snapshot to the local replica.
///
/// The snapshot always wins: registry and lifecycle state are replaced
/// wholesale, never merged. With `baseline` set (late-join catch-up) the
/// state is adopted silently.
pub async fn apply_snapshot(state: &SharedNode, snapshot: WireSnapshot, baseline: bool) {
    let (phase, anchor_ms, roster) = match snapshot.decode() {
        Ok(parts) => parts,
        Err(err) => {
            warn!(node = state.id(), %err, "dropping undecodable snapshot");
            return;
        }
    };

    let previous = {
        let mut slot = state.last_snapshot().write().await;
        slot.replace(snapshot)
    };
    {
        let mut guard = state.roster().write().await;
        *guard = roster;
    }
    {
        let mut guard = state.lifecycle().write().await;
        guard.restore(phase, anchor_ms);
    }

    let Some(previous) = previous.filter(|_| !baseline) else {
        debug!(node = state.id(), ?phase, "adopted snapshot as baseline");
        return;
    };

    if previous.phase != phase {
        if let Some(event) = phase_entry_event(phase) {
            fire(state, event).await;
        }
    }

    for id in occupied_ids(&snapshot) {
        if !occupied_ids(&previous).any(|known| known == id) {
            fire(state, SessionEvent::ParticipantJoined).await;
        }
    }
    for id in occupied_ids(&previous) {
        if !occupied_ids(&snapshot).any(|known| known == id) {
            fire(state, SessionEvent::ParticipantLeft).await;
        }
    }
}

/// Callback tag associated with entering a phase, if any.
fn phase_entry_event(phase: Phase) -> Option<SessionEvent> {
    match phase {
        Phase::Countdown => Some(SessionEvent::CountdownBegun),
        Phase::Active => Some(SessionEvent::Started),
        Phase::Ended => Some(SessionEvent::Ended),
        Phase::Waiting => None,
    }
}

/// Occupied participant ids of a snapshot, in slot order.
fn occupied_ids(snapshot: &WireSnapshot) -> impl Iterator<Item = i32> + '_ {
    snapshot
        .slots
        .iter()
        .take((snapshot.count as usize).min(MAX_PARTICIPANTS))
        .map(|slot| slot.id)
}

/// Deliver an event to the registered observers and the broadcast hub.
pub(crate) async fn fire(state: &SharedNode, event: SessionEvent) {
    debug!(node = state.id(), ?event, "dispatching session event");
    state.observers().read().await.notify_all(event);
    state.hub().broadcast(event);
}

/// Fire the time warning once per phase anchor when the remaining active
/// time drops below the configured threshold. Runs on every node's watcher
/// tick; the anchor replicates with the snapshot, so each node derives the
/// same moment independently.
pub(crate) async fn check_time_warning(state: &SharedNode) {
    let config = state.config();
    let now_ms = state.clock().now_ms();
    let (phase, anchor_ms, remaining) = {
        let lifecycle = state.lifecycle().read().await;
        (
            lifecycle.phase(),
            lifecycle.anchor_ms(),
            lifecycle.remaining_ms(now_ms, config),
        )
    };
    if phase != Phase::Active {
        return;
    }
    let Some(remaining) = remaining else { return };
    if remaining > config.time_warning_ms {
        return;
    }
    {
        let mut warned = state.warned_anchor().write().await;
        if *warned == Some(anchor_ms) {
            return;
        }
        *warned = Some(anchor_ms);
    }
    fire(state, SessionEvent::TimeWarning).await;
}
