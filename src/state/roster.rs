//! Participant registry: an insertion-ordered, capacity-bounded mapping of
//! participant id to team and score.
//!
//! Insertion order is significant: it drives rank display and the default
//! authority-promotion tie-break, and it must survive removals and codec
//! round-trips. Removal therefore shifts entries down instead of swapping
//! with the last slot.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::config::{MAX_PARTICIPANTS, SessionConfig};
use crate::error::Reject;

/// Team value for a participant in a free-for-all session.
pub const TEAM_FFA: i8 = -1;
/// Team value for a participant who has not picked a team yet.
pub const TEAM_UNASSIGNED: i8 = -2;

/// Team and score tracked for one joined participant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParticipantEntry {
    /// Team index, or one of the [`TEAM_FFA`] / [`TEAM_UNASSIGNED`] sentinels.
    pub team: i8,
    /// Running score, reset to zero on every transition into countdown.
    pub score: i32,
}

/// Insertion-ordered participant registry, bounded by [`MAX_PARTICIPANTS`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Roster {
    entries: IndexMap<i32, ParticipantEntry>,
}

impl Roster {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a registry from decoded entries, preserving the given order.
    pub(crate) fn restore(entries: impl IntoIterator<Item = (i32, ParticipantEntry)>) -> Self {
        Self {
            entries: entries.into_iter().collect(),
        }
    }

    /// Number of joined participants.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the registry holds no participants.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether the participant is part of the session.
    pub fn contains(&self, id: i32) -> bool {
        self.entries.contains_key(&id)
    }

    /// Entry of a participant, if joined.
    pub fn get(&self, id: i32) -> Option<&ParticipantEntry> {
        self.entries.get(&id)
    }

    /// Participants in insertion order.
    pub fn entries(&self) -> impl Iterator<Item = (i32, &ParticipantEntry)> {
        self.entries.iter().map(|(id, entry)| (*id, entry))
    }

    /// Lowest participant id, used as the authority-promotion tie-break.
    pub fn lowest_id(&self) -> Option<i32> {
        self.entries.keys().copied().min()
    }

    /// Add a participant with a zero score and the mode's initial team value.
    ///
    /// Capacity is the configured maximum, itself capped at
    /// [`MAX_PARTICIPANTS`]; a session configured for fewer seats rejects the
    /// join the moment they are taken.
    pub fn add(&mut self, id: i32, config: &SessionConfig) -> Result<(), Reject> {
        if self.entries.contains_key(&id) {
            return Err(Reject::AlreadyJoined(id));
        }
        let capacity = (config.max_participants as usize).min(MAX_PARTICIPANTS);
        if self.entries.len() >= capacity {
            return Err(Reject::SessionFull);
        }
        let team = if config.teams_enabled { TEAM_UNASSIGNED } else { TEAM_FFA };
        self.entries.insert(id, ParticipantEntry { team, score: 0 });
        Ok(())
    }

    /// Remove a participant, preserving the relative order of the rest.
    pub fn remove(&mut self, id: i32) -> Result<ParticipantEntry, Reject> {
        self.entries
            .shift_remove(&id)
            .ok_or(Reject::UnknownParticipant(id))
    }

    /// Move a participant onto a team, enforcing the team's capacity.
    pub fn set_team(&mut self, id: i32, team: i8, config: &SessionConfig) -> Result<(), Reject> {
        if !config.teams_enabled {
            return Err(Reject::TeamsDisabled);
        }
        if !(0..config.team_count as i8).contains(&team) {
            return Err(Reject::InvalidTeam(team));
        }
        if !self.entries.contains_key(&id) {
            return Err(Reject::UnknownParticipant(id));
        }
        let rule = config.team_rule(team).ok_or(Reject::InvalidTeam(team))?;
        let occupancy = self
            .entries
            .iter()
            .filter(|(member, entry)| **member != id && entry.team == team)
            .count();
        if occupancy >= rule.max as usize {
            return Err(Reject::TeamFull(team));
        }
        if let Some(entry) = self.entries.get_mut(&id) {
            entry.team = team;
        }
        Ok(())
    }

    /// Add `delta` to a participant's score, saturating at the `i32` bounds.
    pub fn adjust_score(&mut self, id: i32, delta: i32) -> Result<(), Reject> {
        let entry = self
            .entries
            .get_mut(&id)
            .ok_or(Reject::UnknownParticipant(id))?;
        entry.score = entry.score.saturating_add(delta);
        Ok(())
    }

    /// Overwrite a participant's score.
    pub fn set_score(&mut self, id: i32, value: i32) -> Result<(), Reject> {
        let entry = self
            .entries
            .get_mut(&id)
            .ok_or(Reject::UnknownParticipant(id))?;
        entry.score = value;
        Ok(())
    }

    /// Reset every participant's score to zero, keeping membership.
    pub fn reset_scores(&mut self) {
        for entry in self.entries.values_mut() {
            entry.score = 0;
        }
    }

    /// Number of participants currently on the given team.
    pub fn team_members(&self, team: i8) -> usize {
        self.entries.values().filter(|entry| entry.team == team).count()
    }

    /// Sum of the scores of the given team's members.
    pub fn team_score(&self, team: i8) -> i32 {
        self.entries
            .values()
            .filter(|entry| entry.team == team)
            .map(|entry| entry.score)
            .sum()
    }

    /// Readiness predicate gating the waiting-to-countdown transition.
    ///
    /// True when the participant count meets the configured minimum and, in
    /// team mode, at least two distinct teams are occupied with each occupied
    /// team's membership inside its configured bounds.
    pub fn is_ready(&self, config: &SessionConfig) -> bool {
        if self.entries.len() < config.min_participants as usize {
            return false;
        }
        if !config.teams_enabled {
            return true;
        }
        let mut occupied = 0usize;
        for team in 0..config.team_count as i8 {
            let members = self.team_members(team);
            if members == 0 {
                continue;
            }
            occupied += 1;
            let Some(rule) = config.team_rule(team) else {
                return false;
            };
            if members < rule.min as usize || members > rule.max as usize {
                return false;
            }
        }
        occupied >= 2
    }
}
