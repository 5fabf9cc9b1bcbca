//! Per-node session state: the registry, lifecycle machine, authority view,
//! and the channels that coordinate the node's background tasks.

pub mod authority;
pub mod lifecycle;
pub mod roster;

use std::collections::BTreeSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::{RwLock, watch};
use uuid::Uuid;

use crate::clock::Clock;
use crate::config::SessionConfig;
use crate::events::{EventHub, ObserverRegistry};
use crate::net::{Network, NodeId};
use crate::state::authority::AuthorityManager;
use crate::state::lifecycle::Lifecycle;
use crate::state::roster::Roster;
use crate::wire::WireSnapshot;

/// Shared handle to one node's session state.
pub type SharedNode = Arc<NodeState>;

/// Default capacity of the event broadcast hub.
const EVENT_HUB_CAPACITY: usize = 16;

/// Everything one node knows about the session it participates in.
///
/// Mutable fields are only written by the authority (directly) or by
/// snapshot application (on every node); presentation collaborators read
/// through the query surface on [`crate::node::SessionNode`].
pub struct NodeState {
    id: NodeId,
    config: SessionConfig,
    clock: Clock,
    net: Arc<Network>,
    roster: RwLock<Roster>,
    lifecycle: RwLock<Lifecycle>,
    authority: RwLock<AuthorityManager>,
    connected: RwLock<BTreeSet<NodeId>>,
    last_snapshot: RwLock<Option<WireSnapshot>>,
    observers: RwLock<ObserverRegistry>,
    hub: EventHub,
    warned_anchor: RwLock<Option<u64>>,
    active: watch::Sender<bool>,
    authority_live: watch::Sender<bool>,
    tick_generation: AtomicU64,
}

impl NodeState {
    /// Build the state for a freshly attached node.
    pub fn new(
        id: NodeId,
        config: SessionConfig,
        clock: Clock,
        net: Arc<Network>,
        connected: BTreeSet<NodeId>,
    ) -> SharedNode {
        let (active_tx, _rx) = watch::channel(true);
        let (authority_live_tx, _rx) = watch::channel(false);
        Arc::new(Self {
            id,
            config,
            clock,
            net,
            roster: RwLock::new(Roster::new()),
            lifecycle: RwLock::new(Lifecycle::new()),
            authority: RwLock::new(AuthorityManager::new(id)),
            connected: RwLock::new(connected),
            last_snapshot: RwLock::new(None),
            observers: RwLock::new(ObserverRegistry::default()),
            hub: EventHub::new(EVENT_HUB_CAPACITY),
            warned_anchor: RwLock::new(None),
            active: active_tx,
            authority_live: authority_live_tx,
            tick_generation: AtomicU64::new(0),
        })
    }

    /// Identifier of this node.
    pub fn id(&self) -> NodeId {
        self.id
    }

    /// Identifier of the session this node participates in, shared by every
    /// node on the same transport.
    pub fn session_id(&self) -> Uuid {
        self.net.session_id()
    }

    /// Immutable session configuration.
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Wall clock shared with the other components.
    pub fn clock(&self) -> &Clock {
        &self.clock
    }

    /// Transport handle used to reach the other nodes.
    pub fn net(&self) -> &Arc<Network> {
        &self.net
    }

    /// Local replica of the participant registry.
    pub fn roster(&self) -> &RwLock<Roster> {
        &self.roster
    }

    /// Local replica of the lifecycle state machine.
    pub fn lifecycle(&self) -> &RwLock<Lifecycle> {
        &self.lifecycle
    }

    /// This node's view of who holds authority.
    pub fn authority(&self) -> &RwLock<AuthorityManager> {
        &self.authority
    }

    /// Identifiers of the nodes currently connected to the session.
    pub fn connected(&self) -> &RwLock<BTreeSet<NodeId>> {
        &self.connected
    }

    /// The last snapshot applied locally, used for transition detection.
    pub fn last_snapshot(&self) -> &RwLock<Option<WireSnapshot>> {
        &self.last_snapshot
    }

    /// Registered lifecycle observers.
    pub fn observers(&self) -> &RwLock<ObserverRegistry> {
        &self.observers
    }

    /// Broadcast hub mirroring observer notifications.
    pub fn hub(&self) -> &EventHub {
        &self.hub
    }

    /// Anchor for which the time warning already fired, if any.
    pub(crate) fn warned_anchor(&self) -> &RwLock<Option<u64>> {
        &self.warned_anchor
    }

    /// Whether the local node currently holds authority.
    pub async fn is_authority(&self) -> bool {
        self.authority.read().await.is_authority()
    }

    /// Whether the node is still running its event loop and timers.
    pub fn is_active(&self) -> bool {
        *self.active.borrow()
    }

    /// Flip the activation flag; timers observe it before re-arming.
    pub(crate) fn set_active(&self, value: bool) {
        self.active.send_replace(value);
    }

    /// Whether the authority tick is allowed to keep re-arming.
    pub(crate) fn is_authority_live(&self) -> bool {
        *self.authority_live.borrow()
    }

    /// Flip the authority-tick flag on authority gain or loss.
    pub(crate) fn set_authority_live(&self, value: bool) {
        self.authority_live.send_replace(value);
    }

    /// Bump the tick generation, invalidating every previously spawned tick.
    pub(crate) fn next_tick_generation(&self) -> u64 {
        self.tick_generation.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Generation of the most recently spawned authority tick.
    pub(crate) fn tick_generation(&self) -> u64 {
        self.tick_generation.load(Ordering::SeqCst)
    }
}
