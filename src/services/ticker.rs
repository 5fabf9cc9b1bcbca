//! Periodic timers: the authority tick and the per-node warning watcher.
//!
//! The authority tick carries the generation it was spawned under and exits
//! the moment a newer tick exists. Guard flags alone are not enough: a node
//! that loses and regains authority inside one interval would leave the old
//! loop alive next to the new one, and the session would be ticked twice.

use std::time::Duration;

use tokio::time::sleep;
use tracing::debug;

use crate::services::{dispatch, router};
use crate::state::SharedNode;

/// Interval between evaluations of time-based transitions.
pub const TICK_INTERVAL: Duration = Duration::from_secs(1);

/// Spawn the authority tick. Runs only while the node holds authority and
/// remains active; stops on its own when either guard drops or a newer tick
/// has been spawned.
pub(crate) fn spawn_authority_tick(state: SharedNode) {
    let generation = state.next_tick_generation();
    tokio::spawn(async move {
        loop {
            sleep(TICK_INTERVAL).await;
            if stale(&state, generation) {
                break;
            }
            router::run_due_transitions(&state).await;
            if stale(&state, generation) {
                break;
            }
        }
        debug!(node = state.id(), generation, "authority tick stopped");
    });
}

fn stale(state: &SharedNode, generation: u64) -> bool {
    state.tick_generation() != generation || !state.is_active() || !state.is_authority_live()
}

/// Spawn the per-node watcher that derives the time warning locally.
///
/// Non-authority nodes never evaluate transitions, but every node re-derives
/// remaining time from the replicated anchor so its own observers get the
/// warning without an extra message.
pub(crate) fn spawn_warning_watch(state: SharedNode) {
    tokio::spawn(async move {
        loop {
            sleep(TICK_INTERVAL).await;
            if !state.is_active() {
                break;
            }
            dispatch::check_time_warning(&state).await;
        }
        debug!(node = state.id(), "warning watch stopped");
    });
}
