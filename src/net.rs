//! In-process transport standing in for the layer below the replication
//! boundary.
//!
//! Delivery between any two nodes is reliable and ordered (one unbounded
//! channel per recipient); delivery across recipients is independent.
//! Registration and removal fan out membership signals so every node keeps a
//! consistent connected set.

use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::debug;
use uuid::Uuid;

use crate::wire::Envelope;

/// Stable identifier of a connected node. A node that joins the session as a
/// participant uses the same id for its participant entry.
pub type NodeId = i32;

/// Registry of per-node inboxes keyed by node identifier.
///
/// One network carries exactly one session; the session identity lives here
/// so every attached node reports the same id.
pub struct Network {
    session_id: Uuid,
    links: DashMap<NodeId, mpsc::UnboundedSender<Envelope>>,
}

impl Network {
    /// Create an empty network shared between nodes.
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            session_id: Uuid::new_v4(),
            links: DashMap::new(),
        })
    }

    /// Identifier of the session this transport carries.
    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    /// Attach a node, returning its inbox and the nodes already connected.
    ///
    /// Everyone already attached is told about the newcomer.
    pub fn register(&self, id: NodeId) -> (mpsc::UnboundedReceiver<Envelope>, Vec<NodeId>) {
        let existing: Vec<NodeId> = self.links.iter().map(|entry| *entry.key()).collect();
        let (tx, rx) = mpsc::unbounded_channel();
        self.links.insert(id, tx);
        for member in &existing {
            self.send(*member, Envelope::NodeJoined(id));
        }
        (rx, existing)
    }

    /// Detach a node and tell every remaining node it left.
    pub fn deregister(&self, id: NodeId) {
        self.links.remove(&id);
        self.broadcast(Envelope::NodeLeft(id));
    }

    /// Deliver an envelope to one node, dropping it if the node is gone.
    pub fn send(&self, to: NodeId, envelope: Envelope) {
        let Some(link) = self.links.get(&to) else {
            debug!(to, ?envelope, "dropping envelope for unknown node");
            return;
        };
        if link.send(envelope).is_err() {
            debug!(to, "dropping envelope for closed node inbox");
        }
    }

    /// Deliver an envelope to every attached node, the sender included.
    pub fn broadcast(&self, envelope: Envelope) {
        for link in self.links.iter() {
            if link.value().send(envelope.clone()).is_err() {
                debug!(to = *link.key(), "dropping broadcast for closed node inbox");
            }
        }
    }

    /// Identifiers of every attached node.
    pub fn members(&self) -> Vec<NodeId> {
        self.links.iter().map(|entry| *entry.key()).collect()
    }
}
