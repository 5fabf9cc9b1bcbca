//! Wire-level types: mutation intents and the envelopes nodes exchange.

pub mod snapshot;

use serde::{Deserialize, Serialize};

pub use self::snapshot::{CodecError, SLOT_EMPTY_ID, WireSlot, WireSnapshot};
use crate::net::NodeId;

/// A requested mutation, issued by any node and applied only by the authority.
///
/// `Join`, `Leave` and `JoinTeam` act on the sender's own identity; the score
/// intents name their target explicitly so game logic on the authority can
/// award points to anyone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Intent {
    /// Join the session as a participant.
    Join,
    /// Leave the session, keeping the node connected as a spectator.
    Leave,
    /// Pick a team (team mode only).
    JoinTeam {
        /// Team index to join.
        team: i8,
    },
    /// Add a delta to a participant's score.
    AdjustScore {
        /// Target participant.
        id: i32,
        /// Signed score change.
        delta: i32,
    },
    /// Overwrite a participant's score.
    SetScore {
        /// Target participant.
        id: i32,
        /// New score value.
        value: i32,
    },
    /// Begin the countdown, if the session is waiting and ready.
    Start,
    /// End the round early from countdown or active play.
    EndEarly,
}

/// Messages delivered to a node's inbox by the transport layer.
///
/// Delivery between any two nodes is ordered and reliable; delivery across
/// nodes is independent.
#[derive(Debug, Clone)]
pub enum Envelope {
    /// A mutation request forwarded to the authority.
    Intent {
        /// Node that issued the intent.
        from: NodeId,
        /// The requested mutation.
        intent: Intent,
    },
    /// A freshly published replicated snapshot.
    Snapshot(WireSnapshot),
    /// A catch-up snapshot for a late joiner, applied as a silent baseline.
    CatchUp(WireSnapshot),
    /// A node connected to the session.
    NodeJoined(NodeId),
    /// A node disconnected from the session.
    NodeLeft(NodeId),
    /// The named node announced that it holds authority.
    AuthorityClaimed(NodeId),
    /// The current holder hands authority to the receiving node.
    TransferAuthority,
}
