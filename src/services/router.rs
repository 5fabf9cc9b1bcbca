//! Command router: the single path through which session state mutates.
//!
//! Any node may submit an intent. The authority enqueues its own intents to
//! its inbox so they take the same ordered path as forwarded ones; a
//! non-authority node forwards to the current holder and returns immediately.
//! The authority validates against the lifecycle machine and the registry,
//! applies, and publishes a fresh snapshot to every node, itself included.
//! A rejected intent is a logged no-op: callers observe success only through
//! the next snapshot.

use tracing::{debug, info};

use crate::config::SessionConfig;
use crate::error::Reject;
use crate::net::NodeId;
use crate::state::SharedNode;
use crate::state::lifecycle::{Lifecycle, LifecycleEvent, Phase};
use crate::state::roster::Roster;
use crate::wire::{Envelope, Intent, WireSnapshot};

/// Submit an intent from the local node.
///
/// The authority sends to its own inbox instead of applying in place:
/// mutation stays single-file behind the event loop, and a local request
/// cannot overtake a remote one that was forwarded earlier.
pub async fn submit(state: &SharedNode, intent: Intent) {
    let target = if state.is_authority().await {
        Some(state.id())
    } else {
        state.authority().read().await.holder()
    };
    match target {
        Some(holder) => {
            state.net().send(
                holder,
                Envelope::Intent {
                    from: state.id(),
                    intent,
                },
            );
        }
        // Authority-unavailable degrades to a dropped no-op, never a crash.
        None => debug!(node = state.id(), ?intent, "dropping intent; no authority"),
    }
}

/// Handle an intent arriving on the inbox, local or forwarded.
pub(crate) async fn handle_intent(state: &SharedNode, from: NodeId, intent: Intent) {
    if !state.is_authority().await {
        debug!(
            node = state.id(),
            from,
            ?intent,
            "ignoring intent; not authority"
        );
        return;
    }
    let now_ms = state.clock().now_ms();
    let mut roster = state.roster().write().await;
    let mut lifecycle = state.lifecycle().write().await;
    match apply_intent(&mut roster, &mut lifecycle, state.config(), from, intent, now_ms) {
        Ok(()) => publish_locked(state, &roster, &lifecycle),
        Err(reject) => debug!(node = state.id(), from, ?intent, %reject, "intent rejected"),
    }
}

/// Mutate registry and lifecycle according to one validated intent.
fn apply_intent(
    roster: &mut Roster,
    lifecycle: &mut Lifecycle,
    config: &SessionConfig,
    from: NodeId,
    intent: Intent,
    now_ms: u64,
) -> Result<(), Reject> {
    match intent {
        Intent::Join => roster.add(from, config),
        Intent::Leave => {
            roster.remove(from)?;
            abort_if_below_min(lifecycle, roster, config, now_ms);
            Ok(())
        }
        Intent::JoinTeam { team } => roster.set_team(from, team, config),
        Intent::AdjustScore { id, delta } => {
            ensure_phase(lifecycle, Phase::Active)?;
            roster.adjust_score(id, delta)
        }
        Intent::SetScore { id, value } => {
            ensure_phase(lifecycle, Phase::Active)?;
            roster.set_score(id, value)
        }
        Intent::Start => {
            ensure_phase(lifecycle, Phase::Waiting)?;
            if !roster.is_ready(config) {
                return Err(Reject::NotReady);
            }
            lifecycle.apply(LifecycleEvent::RequestStart, now_ms)?;
            roster.reset_scores();
            Ok(())
        }
        Intent::EndEarly => {
            lifecycle.apply(LifecycleEvent::EndEarly, now_ms)?;
            Ok(())
        }
    }
}

fn ensure_phase(lifecycle: &Lifecycle, expected: Phase) -> Result<(), Reject> {
    if lifecycle.phase() != expected {
        return Err(Reject::WrongPhase(lifecycle.phase()));
    }
    Ok(())
}

/// Abort to waiting when the participant count fell below the minimum during
/// a countdown or active phase. The abort path never passes through ended.
pub(crate) fn abort_if_below_min(
    lifecycle: &mut Lifecycle,
    roster: &Roster,
    config: &SessionConfig,
    now_ms: u64,
) -> bool {
    if !matches!(lifecycle.phase(), Phase::Countdown | Phase::Active) {
        return false;
    }
    if roster.len() >= config.min_participants as usize {
        return false;
    }
    let aborted = lifecycle.apply(LifecycleEvent::Abort, now_ms).is_ok();
    if aborted {
        info!("participants below minimum; aborting to waiting");
    }
    aborted
}

/// Encode the node's current state into a snapshot.
pub(crate) async fn current_snapshot(state: &SharedNode) -> WireSnapshot {
    let roster = state.roster().read().await;
    let lifecycle = state.lifecycle().read().await;
    WireSnapshot::encode(lifecycle.phase(), lifecycle.anchor_ms(), &roster)
}

/// Encode and broadcast the given state while its locks are still held, so a
/// later mutation on another task cannot publish ahead of this one.
///
/// The authority consumes its own snapshot exactly like an observer would,
/// so its callbacks fire from the same transition-detection path.
pub(crate) fn publish_locked(state: &SharedNode, roster: &Roster, lifecycle: &Lifecycle) {
    let snapshot = WireSnapshot::encode(lifecycle.phase(), lifecycle.anchor_ms(), roster);
    state.net().broadcast(Envelope::Snapshot(snapshot));
}

/// Publish the current state to every node, the authority itself included.
pub(crate) async fn publish(state: &SharedNode) {
    let roster = state.roster().read().await;
    let lifecycle = state.lifecycle().read().await;
    publish_locked(state, &roster, &lifecycle);
}

/// Evaluate due time-based transitions. Called from the authority tick only.
pub(crate) async fn run_due_transitions(state: &SharedNode) {
    if !state.is_authority().await {
        return;
    }
    let now_ms = state.clock().now_ms();
    let config = state.config();
    let mut roster = state.roster().write().await;
    let mut lifecycle = state.lifecycle().write().await;
    let changed = if abort_if_below_min(&mut lifecycle, &roster, config, now_ms) {
        true
    } else if let Some(event) = lifecycle.poll_due(now_ms, config) {
        match lifecycle.apply(event, now_ms) {
            Ok(next) => {
                if event == LifecycleEvent::GraceElapsed {
                    // Back to waiting: scores clear, membership stays.
                    roster.reset_scores();
                }
                info!(?event, ?next, "timed lifecycle transition");
                true
            }
            Err(err) => {
                debug!(%err, "due event no longer applicable");
                false
            }
        }
    } else {
        false
    };
    if changed {
        publish_locked(state, &roster, &lifecycle);
    }
}

/// Re-check session invariants after gaining authority mid-phase.
///
/// A node promoted during countdown or active play must not resume the tick
/// on top of an already-violated invariant; it aborts to waiting first.
pub(crate) async fn revalidate_after_promotion(state: &SharedNode) {
    let now_ms = state.clock().now_ms();
    let config = state.config();
    let roster = state.roster().read().await;
    let mut lifecycle = state.lifecycle().write().await;
    let violated = match lifecycle.phase() {
        Phase::Countdown => {
            !roster.is_ready(config) || roster.len() < config.min_participants as usize
        }
        Phase::Active => roster.len() < config.min_participants as usize,
        Phase::Waiting | Phase::Ended => false,
    };
    if violated && lifecycle.apply(LifecycleEvent::Abort, now_ms).is_ok() {
        info!("invariant violated at promotion; aborting to waiting");
    }
}
