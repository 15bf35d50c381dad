use std::collections::HashMap;

use crate::types::{
    EventLog, GameSnapshot, LiveStatus, Matchup, PeriodDescriptor, Play, RosterSpot,
    ScoringEvent, Side,
};

pub const UNKNOWN_SCORER: &str = "Unknown";
pub const UNASSISTED: &str = "Unassisted";
pub const EVEN_STRENGTH: &str = "EV";
pub const DEFAULT_PERIOD: &str = "P1";
pub const UNKNOWN_CLOCK: &str = "TBD";

/// Clock value recorded once a game has reached a terminal state.
pub const FINAL_CLOCK: &str = "Final";

const GOAL_TYPE: &str = "goal";

/// Filter the event log down to goals, preserving upstream order.
///
/// `ScoringEvent::index` is the position within the goal-only list, so
/// appending plays to the log never shifts the index of an earlier goal.
pub fn extract_scoring_events(log: &EventLog) -> Vec<ScoringEvent> {
    let roster: HashMap<u64, &RosterSpot> =
        log.roster_spots.iter().map(|r| (r.player_id, r)).collect();

    log.plays
        .iter()
        .filter(|p| p.type_desc_key.eq_ignore_ascii_case(GOAL_TYPE))
        .enumerate()
        .map(|(index, play)| build_scoring_event(index, play, log, &roster))
        .collect()
}

fn build_scoring_event(
    index: usize,
    play: &Play,
    log: &EventLog,
    roster: &HashMap<u64, &RosterSpot>,
) -> ScoringEvent {
    let details = play.details.clone().unwrap_or_default();

    let scoring_side = details.event_owner_team_id.and_then(|team| {
        if log.home_team.id == Some(team) {
            Some(Side::Home)
        } else if log.away_team.id == Some(team) {
            Some(Side::Away)
        } else {
            None
        }
    });

    let scorer_spot = details.scoring_player_id.and_then(|id| roster.get(&id));
    let scorer = scorer_spot
        .and_then(|spot| player_name(spot))
        .unwrap_or_else(|| UNKNOWN_SCORER.to_string());
    let scorer_headshot = scorer_spot
        .and_then(|spot| spot.headshot.as_deref())
        .and_then(non_blank)
        .map(str::to_string);

    let assist_names: Vec<String> = [details.assist1_player_id, details.assist2_player_id]
        .into_iter()
        .flatten()
        .filter_map(|id| roster.get(&id).and_then(|spot| player_name(spot)))
        .collect();
    let assists = if assist_names.is_empty() {
        UNASSISTED.to_string()
    } else {
        assist_names.join(", ")
    };

    let clock = play
        .time_in_period
        .as_deref()
        .and_then(non_blank)
        .unwrap_or(UNKNOWN_CLOCK)
        .to_string();

    let shot_type = details
        .shot_type
        .as_deref()
        .and_then(non_blank)
        .map(str::to_string);

    ScoringEvent {
        index,
        scorer,
        scorer_headshot,
        assists,
        strength: classify_strength(play, scoring_side),
        period: format_period_label(play.period_descriptor.as_ref()),
        clock,
        home_score: details.home_score.unwrap_or(0),
        away_score: details.away_score.unwrap_or(0),
        shot_type,
        scoring_side,
    }
}

/// Decide the strength label of a goal.
///
/// Precedence, first match wins: explicit strength tag, penalty-shot tag,
/// empty-net tag, then the situation code. Anything undecidable is `EV`.
pub fn classify_strength(play: &Play, scoring_side: Option<Side>) -> String {
    let details = play.details.as_ref();

    if let Some(tag) = details
        .and_then(|d| d.strength.as_deref())
        .and_then(non_blank)
    {
        return tag.to_uppercase();
    }

    let shot_type = details.and_then(|d| d.shot_type.as_deref());
    let modifier = details.and_then(|d| d.goal_modifier.as_deref());

    if [shot_type, modifier]
        .into_iter()
        .flatten()
        .any(|tag| tag_is(tag, "penalty-shot"))
    {
        return "PS".to_string();
    }

    if modifier.is_some_and(|tag| tag_is(tag, "empty-net")) {
        return "EN".to_string();
    }

    strength_from_situation(play.situation_code.as_deref(), scoring_side).to_string()
}

/// Compare the skater counts of a situation code from the scoring side's view.
fn strength_from_situation(code: Option<&str>, scoring_side: Option<Side>) -> &'static str {
    let Some((away, home)) = code.and_then(skater_counts) else {
        return EVEN_STRENGTH;
    };
    if away == home {
        return EVEN_STRENGTH;
    }
    let (own, other) = match scoring_side {
        Some(Side::Home) => (home, away),
        Some(Side::Away) => (away, home),
        None => return EVEN_STRENGTH,
    };
    if own > other { "PP" } else { "SH" }
}

/// `(away, home)` skater counts. Two-character codes carry only the skater
/// pair; four-character codes wrap it in the goalie digits.
fn skater_counts(code: &str) -> Option<(u32, u32)> {
    let digits: Vec<u32> = code
        .trim()
        .chars()
        .map(|c| c.to_digit(10))
        .collect::<Option<_>>()?;
    match digits.as_slice() {
        [away, home] => Some((*away, *home)),
        [_, away, home, _] => Some((*away, *home)),
        _ => None,
    }
}

/// `P<n>` for regulation, `OT` / `SO` for overtime and shootout.
pub fn format_period_label(descriptor: Option<&PeriodDescriptor>) -> String {
    let Some(descriptor) = descriptor else {
        return DEFAULT_PERIOD.to_string();
    };
    match descriptor.period_type.as_deref().map(str::trim) {
        Some(t) if t.eq_ignore_ascii_case("OT") => "OT".to_string(),
        Some(t) if t.eq_ignore_ascii_case("SO") => "SO".to_string(),
        _ => match descriptor.number {
            Some(n) if n > 0 => format!("P{n}"),
            _ => DEFAULT_PERIOD.to_string(),
        },
    }
}

/// Normalize a live-status response into a `GameSnapshot`.
pub fn extract_snapshot(status: &LiveStatus) -> GameSnapshot {
    let clock = if status.game_state.is_terminal() {
        FINAL_CLOCK.to_string()
    } else {
        status
            .clock
            .as_ref()
            .and_then(|c| c.time_remaining.as_deref())
            .and_then(non_blank)
            .unwrap_or(UNKNOWN_CLOCK)
            .to_string()
    };

    GameSnapshot {
        game_id: status.id,
        state: status.game_state,
        matchup: Matchup {
            home_abbrev: status.home_team.abbrev.clone(),
            away_abbrev: status.away_team.abbrev.clone(),
            home_logo: status.home_team.logo.clone(),
            away_logo: status.away_team.logo.clone(),
        },
        home_score: status.home_team.score.unwrap_or(0),
        away_score: status.away_team.score.unwrap_or(0),
        period_label: format_period_label(status.period_descriptor.as_ref()),
        clock,
    }
}

fn player_name(spot: &RosterSpot) -> Option<String> {
    let parts: Vec<&str> = [&spot.first_name.default, &spot.last_name.default]
        .into_iter()
        .filter_map(|s| non_blank(s))
        .collect();
    if parts.is_empty() {
        None
    } else {
        Some(parts.join(" "))
    }
}

fn non_blank(s: &str) -> Option<&str> {
    let trimmed = s.trim();
    if trimmed.is_empty() { None } else { Some(trimmed) }
}

/// Case-insensitive tag match that treats `_` and spaces as `-`.
fn tag_is(tag: &str, expected: &str) -> bool {
    let normalized: String = tag
        .trim()
        .chars()
        .map(|c| match c {
            '_' | ' ' => '-',
            c => c.to_ascii_lowercase(),
        })
        .collect();
    normalized == expected
}
