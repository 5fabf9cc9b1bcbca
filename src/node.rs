//! A session node: one participant or spectator process attached to the
//! shared session.
//!
//! Each node runs a single event-loop task over an ordered inbox, so no two
//! handlers on the same node ever execute concurrently. The public surface
//! splits into read-only queries for presentation collaborators and
//! fire-and-forget intents whose outcome is observed through the next
//! replicated snapshot.

use std::collections::BTreeSet;
use std::sync::Arc;

use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info};
use uuid::Uuid;

use crate::clock::Clock;
use crate::config::SessionConfig;
use crate::events::{SessionEvent, SessionObserver};
use crate::net::{Network, NodeId};
use crate::services::{dispatch, router, ticker};
use crate::state::authority::promotion_candidate;
use crate::state::lifecycle::Phase;
use crate::state::roster::ParticipantEntry;
use crate::state::{NodeState, SharedNode};
use crate::wire::{Envelope, Intent};

/// Handle to a running session node.
pub struct SessionNode {
    state: SharedNode,
}

impl SessionNode {
    /// Attach a new node to the session and start its event loop.
    ///
    /// The first node to attach to an empty session claims authority.
    pub async fn spawn(id: NodeId, config: SessionConfig, clock: Clock, net: Arc<Network>) -> Self {
        let config = config.sanitized();
        let (inbox, existing) = net.register(id);
        let mut connected: BTreeSet<NodeId> = existing.iter().copied().collect();
        connected.insert(id);
        let state = NodeState::new(id, config, clock, net, connected);

        if existing.is_empty() {
            become_authority(&state).await;
        }

        tokio::spawn(run_loop(state.clone(), inbox));
        ticker::spawn_warning_watch(state.clone());
        Self { state }
    }

    /// Identifier of this node.
    pub fn id(&self) -> NodeId {
        self.state.id()
    }

    /// Identifier of the session, shared by every node on the same transport.
    pub fn session_id(&self) -> Uuid {
        self.state.session_id()
    }

    /// Immutable configuration this node was attached with.
    pub fn config(&self) -> &SessionConfig {
        self.state.config()
    }

    // --- intent surface (fire and forget) -------------------------------

    /// Request to join the session as a participant.
    pub async fn join(&self) {
        router::submit(&self.state, Intent::Join).await;
    }

    /// Request to leave the session, staying connected as a spectator.
    pub async fn leave(&self) {
        router::submit(&self.state, Intent::Leave).await;
    }

    /// Request to move onto the given team.
    pub async fn join_team(&self, team: i8) {
        router::submit(&self.state, Intent::JoinTeam { team }).await;
    }

    /// Request a score adjustment for a participant.
    pub async fn adjust_score(&self, id: i32, delta: i32) {
        router::submit(&self.state, Intent::AdjustScore { id, delta }).await;
    }

    /// Request an absolute score for a participant.
    pub async fn set_score(&self, id: i32, value: i32) {
        router::submit(&self.state, Intent::SetScore { id, value }).await;
    }

    /// Request the countdown to begin.
    pub async fn start(&self) {
        router::submit(&self.state, Intent::Start).await;
    }

    /// Request an early end of the current round.
    pub async fn end_early(&self) {
        router::submit(&self.state, Intent::EndEarly).await;
    }

    /// Hand authority to another node.
    ///
    /// The local node stops mutating the moment the transfer is initiated;
    /// the target begins only once it has received the handoff.
    pub async fn transfer_authority(&self, target: NodeId) {
        {
            let mut authority = self.state.authority().write().await;
            if !authority.is_authority() {
                debug!(node = self.state.id(), "ignoring transfer; not authority");
                return;
            }
            authority.record_holder(target);
        }
        self.state.set_authority_live(false);
        info!(node = self.state.id(), target, "transferring authority");
        self.state.net().send(target, Envelope::TransferAuthority);
    }

    // --- query surface (read only) --------------------------------------

    /// Current lifecycle phase.
    pub async fn phase(&self) -> Phase {
        self.state.lifecycle().read().await.phase()
    }

    /// Remaining time in the current timed phase, derived from the anchor.
    pub async fn remaining_ms(&self) -> Option<u64> {
        let now_ms = self.state.clock().now_ms();
        self.state
            .lifecycle()
            .read()
            .await
            .remaining_ms(now_ms, self.state.config())
    }

    /// Active participants in insertion order.
    pub async fn participants(&self) -> Vec<(i32, ParticipantEntry)> {
        self.state
            .roster()
            .read()
            .await
            .entries()
            .map(|(id, entry)| (id, *entry))
            .collect()
    }

    /// Score of a participant, if joined.
    pub async fn score_of(&self, id: i32) -> Option<i32> {
        self.state.roster().read().await.get(id).map(|entry| entry.score)
    }

    /// Team of a participant, if joined.
    pub async fn team_of(&self, id: i32) -> Option<i8> {
        self.state.roster().read().await.get(id).map(|entry| entry.team)
    }

    /// Aggregate score of a team.
    pub async fn team_score(&self, team: i8) -> i32 {
        self.state.roster().read().await.team_score(team)
    }

    /// Display name of a team.
    pub fn team_name(&self, team: i8) -> Option<&str> {
        self.state.config().team_name(team)
    }

    /// Whether the session currently satisfies the readiness predicate.
    pub async fn is_ready(&self) -> bool {
        self.state.roster().read().await.is_ready(self.state.config())
    }

    /// Whether this node currently holds authority.
    pub async fn is_authority(&self) -> bool {
        self.state.is_authority().await
    }

    // --- observer surface ------------------------------------------------

    /// Register a lifecycle observer, returning its slot for removal.
    pub async fn register_observer(&self, observer: Arc<dyn SessionObserver>) -> usize {
        self.state.observers().write().await.register(observer)
    }

    /// Remove a previously registered observer.
    pub async fn unregister_observer(&self, slot: usize) {
        self.state.observers().write().await.unregister(slot);
    }

    /// Subscribe to the event stream mirroring observer notifications.
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.state.hub().subscribe()
    }

    /// Detach from the session and stop every background task.
    pub async fn shutdown(&self) {
        info!(node = self.state.id(), "shutting down node");
        self.state.set_active(false);
        self.state.set_authority_live(false);
        self.state.net().deregister(self.state.id());
    }
}

/// Single-threaded event loop draining this node's inbox in order.
async fn run_loop(state: SharedNode, mut inbox: mpsc::UnboundedReceiver<Envelope>) {
    while let Some(envelope) = inbox.recv().await {
        if !state.is_active() {
            break;
        }
        handle(&state, envelope).await;
    }
    debug!(node = state.id(), "node loop stopped");
}

async fn handle(state: &SharedNode, envelope: Envelope) {
    match envelope {
        Envelope::Intent { from, intent } => router::handle_intent(state, from, intent).await,
        Envelope::Snapshot(snapshot) => dispatch::apply_snapshot(state, snapshot, false).await,
        Envelope::CatchUp(snapshot) => dispatch::apply_snapshot(state, snapshot, true).await,
        Envelope::NodeJoined(node) => {
            state.connected().write().await.insert(node);
            if state.is_authority().await {
                // Late joiners learn the holder first, then the full state;
                // per-pair ordering keeps that sequence intact.
                state
                    .net()
                    .send(node, Envelope::AuthorityClaimed(state.id()));
                let snapshot = router::current_snapshot(state).await;
                state.net().send(node, Envelope::CatchUp(snapshot));
            }
        }
        Envelope::NodeLeft(node) => handle_node_left(state, node).await,
        Envelope::AuthorityClaimed(node) => {
            if node != state.id() {
                state.authority().write().await.record_holder(node);
                state.set_authority_live(false);
            }
        }
        Envelope::TransferAuthority => become_authority(state).await,
    }
}

/// React to a node disconnecting: update membership, promote a successor if
/// the authority departed, and clean up the departed participant's entry.
async fn handle_node_left(state: &SharedNode, node: NodeId) {
    state.connected().write().await.remove(&node);

    let holder_departed = state.authority().read().await.holder() == Some(node);
    if holder_departed {
        state.authority().write().await.release();
        let candidate = {
            let roster = state.roster().read().await;
            let connected = state.connected().read().await;
            promotion_candidate(&roster, &connected)
        };
        if candidate == Some(state.id()) {
            become_authority(state).await;
        }
        // Otherwise the holder stays unknown until the successor's claim
        // arrives; intents submitted in the gap drop as no-ops.
    }

    if state.is_authority().await {
        let mut roster = state.roster().write().await;
        let mut lifecycle = state.lifecycle().write().await;
        if roster.contains(node) {
            let _ = roster.remove(node);
            let now_ms = state.clock().now_ms();
            router::abort_if_below_min(&mut lifecycle, &roster, state.config(), now_ms);
            router::publish_locked(state, &roster, &lifecycle);
        }
    }
}

/// Take authority on this node: claim, announce, re-validate, resume the tick.
pub(crate) async fn become_authority(state: &SharedNode) {
    state.authority().write().await.claim();
    state.set_authority_live(true);
    info!(node = state.id(), "gained session authority");
    state
        .net()
        .broadcast(Envelope::AuthorityClaimed(state.id()));
    router::revalidate_after_promotion(state).await;
    router::publish(state).await;
    ticker::spawn_authority_tick(state.clone());
}
