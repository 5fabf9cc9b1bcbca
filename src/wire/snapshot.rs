//! Replication codec: the bounded wire form of session + participant state.
//!
//! The snapshot is the only cross-node shared resource. It is produced by the
//! authority on every mutation and consumed by every node, the authority
//! included, so local writes and replicated writes take the same path. It is
//! always replaced wholesale, never merged.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::MAX_PARTICIPANTS;
use crate::state::lifecycle::Phase;
use crate::state::roster::{ParticipantEntry, Roster};

/// Participant id carried by unused snapshot slots.
pub const SLOT_EMPTY_ID: i32 = -1;

/// One fixed participant slot of the wire snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireSlot {
    /// Participant id, or [`SLOT_EMPTY_ID`] when the slot is unused.
    pub id: i32,
    /// Team index or sentinel.
    pub team: i8,
    /// Current score.
    pub score: i32,
}

impl WireSlot {
    const EMPTY: Self = Self {
        id: SLOT_EMPTY_ID,
        team: 0,
        score: 0,
    };
}

/// Complete replicated representation of a session at one instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireSnapshot {
    /// Lifecycle phase at the time of encoding.
    pub phase: Phase,
    /// Wall-clock anchor of the current timed phase.
    pub anchor_ms: u64,
    /// Number of occupied slots, counted from the front.
    pub count: u8,
    /// Fixed participant slots in roster insertion order.
    pub slots: [WireSlot; MAX_PARTICIPANTS],
}

/// Errors produced while reconstructing state from a snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum CodecError {
    /// The slot count exceeds the fixed capacity.
    #[error("slot count {0} exceeds capacity {MAX_PARTICIPANTS}")]
    CountOutOfRange(u8),
    /// An occupied slot carries the empty-slot sentinel id.
    #[error("occupied slot {0} carries the empty sentinel id")]
    EmptySlot(usize),
    /// Two occupied slots carry the same participant id.
    #[error("duplicate participant id {0} in snapshot")]
    DuplicateId(i32),
}

impl WireSnapshot {
    /// Serialize lifecycle and registry state into the bounded wire form.
    ///
    /// Total for every valid in-bounds state; the registry's insertion order
    /// is preserved in the slot order.
    pub fn encode(phase: Phase, anchor_ms: u64, roster: &Roster) -> Self {
        let mut slots = [WireSlot::EMPTY; MAX_PARTICIPANTS];
        let mut count = 0u8;
        for (slot, (id, entry)) in slots.iter_mut().zip(roster.entries()) {
            *slot = WireSlot {
                id,
                team: entry.team,
                score: entry.score,
            };
            count += 1;
        }
        Self {
            phase,
            anchor_ms,
            count,
            slots,
        }
    }

    /// Reconstruct lifecycle and registry state from the wire form.
    ///
    /// Assumes whole-snapshot delivery from the transport; a snapshot that
    /// fails to decode is dropped and the next one wins.
    pub fn decode(&self) -> Result<(Phase, u64, Roster), CodecError> {
        if self.count as usize > MAX_PARTICIPANTS {
            return Err(CodecError::CountOutOfRange(self.count));
        }
        let mut entries = Vec::with_capacity(self.count as usize);
        for (index, slot) in self.slots.iter().take(self.count as usize).enumerate() {
            if slot.id == SLOT_EMPTY_ID {
                return Err(CodecError::EmptySlot(index));
            }
            if entries.iter().any(|(id, _)| *id == slot.id) {
                return Err(CodecError::DuplicateId(slot.id));
            }
            entries.push((
                slot.id,
                ParticipantEntry {
                    team: slot.team,
                    score: slot.score,
                },
            ));
        }
        Ok((self.phase, self.anchor_ms, Roster::restore(entries)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SessionConfig;

    fn sample_roster() -> Roster {
        let config = SessionConfig::default();
        let mut roster = Roster::new();
        for id in [5, 2, 9] {
            roster.add(id, &config).unwrap();
        }
        roster.adjust_score(2, 7).unwrap();
        roster.adjust_score(9, -3).unwrap();
        roster
    }

    #[test]
    fn round_trip_preserves_state_and_order() {
        let roster = sample_roster();
        let snapshot = WireSnapshot::encode(Phase::Active, 42_000, &roster);
        let (phase, anchor_ms, decoded) = snapshot.decode().unwrap();
        assert_eq!(phase, Phase::Active);
        assert_eq!(anchor_ms, 42_000);
        assert_eq!(decoded, roster);
        let order: Vec<i32> = decoded.entries().map(|(id, _)| id).collect();
        assert_eq!(order, vec![5, 2, 9]);
    }

    #[test]
    fn round_trip_survives_a_middle_removal() {
        let mut roster = sample_roster();
        roster.remove(2).unwrap();
        let snapshot = WireSnapshot::encode(Phase::Waiting, 0, &roster);
        let (_, _, decoded) = snapshot.decode().unwrap();
        let order: Vec<i32> = decoded.entries().map(|(id, _)| id).collect();
        assert_eq!(order, vec![5, 9]);
    }

    #[test]
    fn unused_slots_carry_the_sentinel() {
        let snapshot = WireSnapshot::encode(Phase::Waiting, 0, &sample_roster());
        assert_eq!(snapshot.count, 3);
        for slot in &snapshot.slots[3..] {
            assert_eq!(slot.id, SLOT_EMPTY_ID);
        }
    }

    #[test]
    fn full_registry_round_trips() {
        let config = SessionConfig::default();
        let mut roster = Roster::new();
        for id in 0..config.max_participants as i32 {
            roster.add(id, &config).unwrap();
        }
        let snapshot = WireSnapshot::encode(Phase::Countdown, 9, &roster);
        assert_eq!(snapshot.count as usize, MAX_PARTICIPANTS);
        let (_, _, decoded) = snapshot.decode().unwrap();
        assert_eq!(decoded, roster);
    }

    #[test]
    fn decode_rejects_corrupt_snapshots() {
        let mut snapshot = WireSnapshot::encode(Phase::Waiting, 0, &sample_roster());
        snapshot.count = 9;
        assert_eq!(snapshot.decode(), Err(CodecError::CountOutOfRange(9)));

        let mut snapshot = WireSnapshot::encode(Phase::Waiting, 0, &sample_roster());
        snapshot.slots[1].id = SLOT_EMPTY_ID;
        assert_eq!(snapshot.decode(), Err(CodecError::EmptySlot(1)));

        let mut snapshot = WireSnapshot::encode(Phase::Waiting, 0, &sample_roster());
        snapshot.slots[1].id = 5;
        assert_eq!(snapshot.decode(), Err(CodecError::DuplicateId(5)));
    }

    #[test]
    fn snapshot_serializes_as_json() {
        let snapshot = WireSnapshot::encode(Phase::Active, 1_234, &sample_roster());
        let json = serde_json::to_string(&snapshot).unwrap();
        let back: WireSnapshot = serde_json::from_str(&json).unwrap();
        assert_eq!(back, snapshot);
    }
}
