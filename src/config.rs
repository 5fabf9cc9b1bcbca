//! Session configuration: participant bounds, team setup, and phase durations.
//!
//! Configuration is fixed once a session is created. Inconsistent values are
//! corrected to safe defaults and logged rather than treated as fatal, since
//! the session must remain usable no matter what the host supplied.

use std::{env, fs, io::ErrorKind, path::PathBuf};

use serde::Deserialize;
use tracing::{info, warn};

/// Hard upper bound on participants in a session.
pub const MAX_PARTICIPANTS: usize = 8;
/// Hard upper bound on the number of teams.
pub const MAX_TEAMS: usize = 4;
/// Hard upper bound on a session's active phase (ten minutes).
pub const MAX_ACTIVE_MS: u64 = 600_000;

/// Default location on disk where the session looks for the JSON configuration.
const DEFAULT_CONFIG_PATH: &str = "config/session.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "QUICKMATCH_CONFIG_PATH";

const DEFAULT_COUNTDOWN_MS: u64 = 5_000;
const DEFAULT_ACTIVE_MS: u64 = 300_000;
const DEFAULT_GRACE_MS: u64 = 10_000;
const DEFAULT_TIME_WARNING_MS: u64 = 10_000;

/// Membership bounds for a single team.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct TeamRule {
    /// Minimum members for the team to count as validly occupied.
    pub min: u8,
    /// Maximum members the team accepts.
    pub max: u8,
}

impl Default for TeamRule {
    fn default() -> Self {
        Self {
            min: 1,
            max: MAX_PARTICIPANTS as u8,
        }
    }
}

/// Immutable session configuration, shared by every node of a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// Participants required before the session may start.
    pub min_participants: u8,
    /// Participants accepted at most (capped at [`MAX_PARTICIPANTS`]).
    pub max_participants: u8,
    /// Whether participants group into teams instead of free-for-all.
    pub teams_enabled: bool,
    /// Number of teams when team mode is enabled.
    pub team_count: u8,
    /// Per-team membership bounds, one entry per team.
    pub team_rules: Vec<TeamRule>,
    /// Display names, one entry per team.
    pub team_names: Vec<String>,
    /// Countdown phase length in milliseconds.
    pub countdown_ms: u64,
    /// Active phase length in milliseconds.
    pub active_ms: u64,
    /// Grace delay between the end screen and the reset to waiting.
    pub grace_ms: u64,
    /// Remaining-time threshold at which the time warning fires.
    pub time_warning_ms: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            min_participants: 2,
            max_participants: MAX_PARTICIPANTS as u8,
            teams_enabled: false,
            team_count: 2,
            team_rules: vec![TeamRule::default(); 2],
            team_names: vec!["Team 1".into(), "Team 2".into()],
            countdown_ms: DEFAULT_COUNTDOWN_MS,
            active_ms: DEFAULT_ACTIVE_MS,
            grace_ms: DEFAULT_GRACE_MS,
            time_warning_ms: DEFAULT_TIME_WARNING_MS,
        }
    }
}

impl SessionConfig {
    /// Load the session configuration from disk, falling back to defaults.
    pub fn load() -> Self {
        let path = resolve_config_path();
        match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str::<RawConfig>(&contents) {
                Ok(raw) => {
                    let config = SessionConfig::from(raw).sanitized();
                    info!(path = %path.display(), "loaded session config");
                    config
                }
                Err(err) => {
                    warn!(
                        path = %path.display(),
                        error = %err,
                        "failed to parse config; falling back to defaults"
                    );
                    Self::default()
                }
            },
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!(
                    path = %path.display(),
                    "config file not found; using built-in defaults"
                );
                Self::default()
            }
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "failed to read config; falling back to defaults"
                );
                Self::default()
            }
        }
    }

    /// Correct inconsistent values to safe defaults, logging every fix.
    ///
    /// Never fails: a session with a bad configuration must still be usable.
    pub fn sanitized(mut self) -> Self {
        if self.max_participants == 0 || self.max_participants as usize > MAX_PARTICIPANTS {
            warn!(
                max = self.max_participants,
                cap = MAX_PARTICIPANTS,
                "max participants out of range; clamping"
            );
            self.max_participants = (self.max_participants as usize)
                .clamp(1, MAX_PARTICIPANTS) as u8;
        }
        if self.min_participants == 0 || self.min_participants > self.max_participants {
            warn!(
                min = self.min_participants,
                max = self.max_participants,
                "min participants out of range; clamping"
            );
            self.min_participants = self.min_participants.clamp(1, self.max_participants);
        }

        if self.teams_enabled {
            if !(2..=MAX_TEAMS as u8).contains(&self.team_count) {
                warn!(count = self.team_count, "team count out of range; clamping");
                self.team_count = self.team_count.clamp(2, MAX_TEAMS as u8);
            }
            let count = self.team_count as usize;
            if self.team_rules.len() != count {
                warn!(
                    rules = self.team_rules.len(),
                    teams = count,
                    "team rules do not match team count; padding with defaults"
                );
                self.team_rules.resize(count, TeamRule::default());
            }
            for (index, rule) in self.team_rules.iter_mut().enumerate() {
                if rule.max == 0 || rule.max as usize > MAX_PARTICIPANTS {
                    warn!(team = index, max = rule.max, "team max out of range; clamping");
                    rule.max = (rule.max as usize).clamp(1, MAX_PARTICIPANTS) as u8;
                }
                if rule.min == 0 || rule.min > rule.max {
                    warn!(team = index, min = rule.min, "team min out of range; clamping");
                    rule.min = rule.min.clamp(1, rule.max);
                }
            }
            if self.team_names.len() != count {
                warn!(
                    names = self.team_names.len(),
                    teams = count,
                    "team names do not match team count; padding"
                );
                let existing = self.team_names.len();
                self.team_names
                    .extend((existing..count).map(|index| format!("Team {}", index + 1)));
                self.team_names.truncate(count);
            }
        }

        if self.countdown_ms == 0 {
            warn!("countdown duration is zero; using default");
            self.countdown_ms = DEFAULT_COUNTDOWN_MS;
        }
        if self.active_ms == 0 || self.active_ms > MAX_ACTIVE_MS {
            warn!(active_ms = self.active_ms, "active duration out of range; clamping");
            self.active_ms = if self.active_ms == 0 {
                DEFAULT_ACTIVE_MS
            } else {
                MAX_ACTIVE_MS
            };
        }
        if self.grace_ms == 0 {
            warn!("grace delay is zero; using default");
            self.grace_ms = DEFAULT_GRACE_MS;
        }
        if self.time_warning_ms == 0 || self.time_warning_ms >= self.active_ms {
            warn!(
                threshold = self.time_warning_ms,
                "time warning threshold out of range; using default"
            );
            self.time_warning_ms = DEFAULT_TIME_WARNING_MS.min(self.active_ms);
        }

        self
    }

    /// Display name of a team, if the index is valid for this configuration.
    pub fn team_name(&self, team: i8) -> Option<&str> {
        if team < 0 {
            return None;
        }
        self.team_names.get(team as usize).map(String::as_str)
    }

    /// Membership rule of a team, if the index is valid for this configuration.
    pub fn team_rule(&self, team: i8) -> Option<TeamRule> {
        if team < 0 {
            return None;
        }
        self.team_rules.get(team as usize).copied()
    }

    /// Phase duration for the given lifecycle phase, if the phase is timed.
    pub(crate) fn phase_duration_ms(&self, phase: crate::state::lifecycle::Phase) -> Option<u64> {
        use crate::state::lifecycle::Phase;
        match phase {
            Phase::Countdown => Some(self.countdown_ms),
            Phase::Active => Some(self.active_ms),
            Phase::Ended => Some(self.grace_ms),
            Phase::Waiting => None,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
/// JSON representation of the configuration file.
struct RawConfig {
    min_participants: u8,
    max_participants: u8,
    teams_enabled: bool,
    team_count: u8,
    team_rules: Vec<TeamRule>,
    team_names: Vec<String>,
    countdown_ms: u64,
    active_ms: u64,
    grace_ms: u64,
    time_warning_ms: u64,
}

impl Default for RawConfig {
    fn default() -> Self {
        let config = SessionConfig::default();
        Self {
            min_participants: config.min_participants,
            max_participants: config.max_participants,
            teams_enabled: config.teams_enabled,
            team_count: config.team_count,
            team_rules: config.team_rules,
            team_names: config.team_names,
            countdown_ms: config.countdown_ms,
            active_ms: config.active_ms,
            grace_ms: config.grace_ms,
            time_warning_ms: config.time_warning_ms,
        }
    }
}

impl From<RawConfig> for SessionConfig {
    fn from(raw: RawConfig) -> Self {
        Self {
            min_participants: raw.min_participants,
            max_participants: raw.max_participants,
            teams_enabled: raw.teams_enabled,
            team_count: raw.team_count,
            team_rules: raw.team_rules,
            team_names: raw.team_names,
            countdown_ms: raw.countdown_ms,
            active_ms: raw.active_ms,
            grace_ms: raw.grace_ms,
            time_warning_ms: raw.time_warning_ms,
        }
    }
}

/// Resolve the configuration path taking the environment override into account.
fn resolve_config_path() -> PathBuf {
    env::var_os(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .filter(|path| !path.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}
