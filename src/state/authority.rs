//! Authority tracking: which node currently owns session mutation.
//!
//! Authority is a capability attached to a node identity, transferable and
//! never shared. Every mutating entry point checks `is_authority` before
//! writing; everything else goes through intent forwarding.

use std::collections::BTreeSet;

use crate::net::NodeId;
use crate::state::roster::Roster;

/// Per-node view of who holds session authority.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorityManager {
    local: NodeId,
    holder: Option<NodeId>,
}

impl AuthorityManager {
    /// Track authority from the perspective of `local`.
    pub fn new(local: NodeId) -> Self {
        Self { local, holder: None }
    }

    /// Whether the local node currently holds authority.
    pub fn is_authority(&self) -> bool {
        self.holder == Some(self.local)
    }

    /// The node currently holding authority, if any is known.
    pub fn holder(&self) -> Option<NodeId> {
        self.holder
    }

    /// Take authority for the local node.
    pub fn claim(&mut self) {
        self.holder = Some(self.local);
    }

    /// Record that another node announced holding authority.
    pub fn record_holder(&mut self, node: NodeId) {
        self.holder = Some(node);
    }

    /// Forget the current holder, leaving authority unclaimed.
    pub fn release(&mut self) {
        self.holder = None;
    }
}

/// Deterministic successor selection after the authority departs.
///
/// Prefers the lowest participant id among active participants that are still
/// connected; falls back to the lowest-id connected node (a spectator); yields
/// `None` when no node remains, leaving authority unclaimed until the next
/// join. Every node computes the same answer from its replicated state, so no
/// coordination round is needed.
pub fn promotion_candidate(roster: &Roster, connected: &BTreeSet<NodeId>) -> Option<NodeId> {
    roster
        .entries()
        .map(|(id, _)| id)
        .filter(|id| connected.contains(id))
        .min()
        .or_else(|| connected.iter().copied().next())
}
