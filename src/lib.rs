//! quickmatch: session authority and state replication for short-lived,
//! small-group multiplayer sessions.
//!
//! One node holds authority and is the single writer of session state; every
//! other node interacts through fire-and-forget intents and observes outcomes
//! via replicated snapshots. The lifecycle (waiting, countdown, active,
//! ended) is anchored to the wall clock so every node derives remaining time
//! independently, and all lifecycle callbacks fire from snapshot diffing so
//! late joiners and racing signals cannot duplicate side effects.

pub mod clock;
pub mod config;
pub mod error;
pub mod events;
pub mod net;
pub mod node;
pub mod services;
pub mod state;
pub mod wire;

pub use clock::Clock;
pub use config::SessionConfig;
pub use error::Reject;
pub use events::{SessionEvent, SessionObserver};
pub use net::{Network, NodeId};
pub use node::SessionNode;
pub use state::lifecycle::Phase;
