use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ── Upstream wire types ────────────────────────────────────────────

/// Game state as reported by the NHL API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum GameState {
    #[serde(rename = "FUT")]
    Future,
    #[serde(rename = "PRE")]
    Pregame,
    #[serde(rename = "LIVE")]
    Live,
    #[serde(rename = "CRIT")]
    Critical,
    #[serde(rename = "FINAL")]
    Final,
    #[serde(rename = "OFF")]
    Official,
    #[default]
    #[serde(other)]
    Unknown,
}

impl GameState {
    /// Puck has dropped and the game is not over yet.
    pub fn is_in_progress(self) -> bool {
        matches!(self, GameState::Live | GameState::Critical)
    }

    /// No further events will be recorded.
    pub fn is_terminal(self) -> bool {
        matches!(self, GameState::Final | GameState::Official)
    }
}

/// Team block shared by the schedule, landing and play-by-play endpoints.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamRef {
    #[serde(default)]
    pub id: Option<u64>,
    #[serde(default)]
    pub abbrev: String,
    #[serde(default)]
    pub score: Option<u32>,
    #[serde(default)]
    pub logo: Option<String>,
}

/// Response of `/club-schedule/{team}/week/now`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ScheduleResponse {
    #[serde(default)]
    pub games: Vec<ScheduledGame>,
}

/// One entry of the club schedule.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduledGame {
    pub id: u64,
    #[serde(rename = "startTimeUTC")]
    pub start_time_utc: DateTime<Utc>,
    #[serde(default)]
    pub game_state: GameState,
    #[serde(default)]
    pub home_team: TeamRef,
    #[serde(default)]
    pub away_team: TeamRef,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PeriodDescriptor {
    #[serde(default)]
    pub number: Option<u32>,
    /// `REG`, `OT` or `SO`.
    #[serde(default)]
    pub period_type: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameClock {
    #[serde(default)]
    pub time_remaining: Option<String>,
    #[serde(default)]
    pub in_intermission: bool,
}

/// Response of `/gamecenter/{id}/landing`: score, period and clock.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LiveStatus {
    pub id: u64,
    #[serde(default)]
    pub game_state: GameState,
    #[serde(default)]
    pub home_team: TeamRef,
    #[serde(default)]
    pub away_team: TeamRef,
    #[serde(default)]
    pub period_descriptor: Option<PeriodDescriptor>,
    #[serde(default)]
    pub clock: Option<GameClock>,
}

/// Response of `/gamecenter/{id}/play-by-play`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventLog {
    #[serde(default)]
    pub id: u64,
    #[serde(default)]
    pub home_team: TeamRef,
    #[serde(default)]
    pub away_team: TeamRef,
    #[serde(default)]
    pub plays: Vec<Play>,
    #[serde(default)]
    pub roster_spots: Vec<RosterSpot>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Play {
    #[serde(default)]
    pub event_id: Option<u64>,
    #[serde(default)]
    pub type_desc_key: String,
    #[serde(default)]
    pub period_descriptor: Option<PeriodDescriptor>,
    #[serde(default)]
    pub time_in_period: Option<String>,
    /// Four digits: away goalie, away skaters, home skaters, home goalie.
    #[serde(default)]
    pub situation_code: Option<String>,
    #[serde(default)]
    pub details: Option<PlayDetails>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayDetails {
    #[serde(default)]
    pub scoring_player_id: Option<u64>,
    #[serde(default)]
    pub assist1_player_id: Option<u64>,
    #[serde(default)]
    pub assist2_player_id: Option<u64>,
    #[serde(default)]
    pub event_owner_team_id: Option<u64>,
    #[serde(default)]
    pub home_score: Option<u32>,
    #[serde(default)]
    pub away_score: Option<u32>,
    #[serde(default)]
    pub shot_type: Option<String>,
    /// e.g. `empty-net`, `penalty-shot`.
    #[serde(default)]
    pub goal_modifier: Option<String>,
    /// Explicit strength tag, when upstream provides one.
    #[serde(default)]
    pub strength: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LocalizedName {
    #[serde(default)]
    pub default: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RosterSpot {
    #[serde(default)]
    pub team_id: Option<u64>,
    pub player_id: u64,
    #[serde(default)]
    pub first_name: LocalizedName,
    #[serde(default)]
    pub last_name: LocalizedName,
    #[serde(default)]
    pub headshot: Option<String>,
}

// ── Domain types ───────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    Home,
    Away,
}

/// Team codes and logos for one game.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Matchup {
    pub home_abbrev: String,
    pub away_abbrev: String,
    pub home_logo: Option<String>,
    pub away_logo: Option<String>,
}

impl Matchup {
    pub fn abbrev(&self, side: Side) -> &str {
        match side {
            Side::Home => &self.home_abbrev,
            Side::Away => &self.away_abbrev,
        }
    }

    pub fn logo(&self, side: Side) -> Option<&str> {
        match side {
            Side::Home => self.home_logo.as_deref(),
            Side::Away => self.away_logo.as_deref(),
        }
    }
}

/// Normalized view of a live-status snapshot.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GameSnapshot {
    pub game_id: u64,
    pub state: GameState,
    pub matchup: Matchup,
    pub home_score: u32,
    pub away_score: u32,
    pub period_label: String,
    pub clock: String,
}

impl GameSnapshot {
    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }
}

/// A goal extracted from the event log.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoringEvent {
    /// Position in the goal-only list; stable as the log grows.
    pub index: usize,
    pub scorer: String,
    pub scorer_headshot: Option<String>,
    pub assists: String,
    pub strength: String,
    pub period: String,
    pub clock: String,
    pub home_score: u32,
    pub away_score: u32,
    pub shot_type: Option<String>,
    pub scoring_side: Option<Side>,
}

/// A discrete fact worth announcing.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Notification {
    Goal {
        game_id: u64,
        matchup: Matchup,
        goal: ScoringEvent,
    },
    PeriodChange {
        game_id: u64,
        matchup: Matchup,
        home_score: u32,
        away_score: u32,
        period: String,
    },
    GameEnd {
        game_id: u64,
        matchup: Matchup,
        home_score: u32,
        away_score: u32,
        period: String,
    },
}

// ── Outbound payload ───────────────────────────────────────────────

/// Discord embed payload.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Embed {
    pub title: String,
    pub color: u32,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<EmbedField>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<EmbedThumbnail>,
    pub timestamp: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EmbedField {
    pub name: String,
    pub value: String,
    pub inline: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EmbedThumbnail {
    pub url: String,
}
