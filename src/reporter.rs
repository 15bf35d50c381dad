use chrono::{DateTime, Utc};

use crate::types::{Embed, EmbedField, EmbedThumbnail, Matchup, Notification, ScoringEvent};

pub const GOAL_COLOR: u32 = 0x2ECC71;
pub const PERIOD_CHANGE_COLOR: u32 = 0x3498DB;
pub const GAME_END_COLOR: u32 = 0xE74C3C;

/// Render a notification as a channel embed stamped with `at`.
pub fn format_notification(notification: &Notification, at: DateTime<Utc>) -> Embed {
    match notification {
        Notification::Goal { matchup, goal, .. } => format_goal(matchup, goal, at),
        Notification::PeriodChange {
            matchup,
            home_score,
            away_score,
            period,
            ..
        } => format_period_change(matchup, *home_score, *away_score, period, at),
        Notification::GameEnd {
            matchup,
            home_score,
            away_score,
            period,
            ..
        } => format_game_end(matchup, *home_score, *away_score, period, at),
    }
}

pub fn format_goal(matchup: &Matchup, goal: &ScoringEvent, at: DateTime<Utc>) -> Embed {
    let scoring_team = goal
        .scoring_side
        .map(|side| matchup.abbrev(side).to_string())
        .filter(|abbrev| !abbrev.is_empty());
    let title = match &scoring_team {
        Some(team) => format!(
            "{} | {team} GOAL!",
            score_line(matchup, goal.home_score, goal.away_score)
        ),
        None => format!("{} | GOAL!", score_line(matchup, goal.home_score, goal.away_score)),
    };

    let mut fields = vec![
        field("Scorer", &goal.scorer, true),
        field("Assists", &goal.assists, true),
        field("Strength", &goal.strength, true),
        field("Period/Time", &format!("{} {}", goal.period, goal.clock), true),
    ];
    if let Some(shot_type) = &goal.shot_type {
        fields.push(field("Shot Type", &capitalize(shot_type), true));
    }

    let thumbnail = goal
        .scorer_headshot
        .clone()
        .or_else(|| {
            goal.scoring_side
                .and_then(|side| matchup.logo(side))
                .map(str::to_string)
        })
        .map(|url| EmbedThumbnail { url });

    Embed {
        title,
        color: GOAL_COLOR,
        fields,
        thumbnail,
        timestamp: at.to_rfc3339(),
    }
}

pub fn format_period_change(
    matchup: &Matchup,
    home_score: u32,
    away_score: u32,
    period: &str,
    at: DateTime<Utc>,
) -> Embed {
    Embed {
        title: format!(
            "{} | Start of {}",
            score_line(matchup, home_score, away_score),
            period_name(period)
        ),
        color: PERIOD_CHANGE_COLOR,
        fields: Vec::new(),
        thumbnail: None,
        timestamp: at.to_rfc3339(),
    }
}

pub fn format_game_end(
    matchup: &Matchup,
    home_score: u32,
    away_score: u32,
    period: &str,
    at: DateTime<Utc>,
) -> Embed {
    let suffix = match period {
        "OT" => " (OT)",
        "SO" => " (SO)",
        _ => "",
    };
    let winner_logo = match home_score.cmp(&away_score) {
        std::cmp::Ordering::Greater => matchup.home_logo.clone(),
        std::cmp::Ordering::Less => matchup.away_logo.clone(),
        std::cmp::Ordering::Equal => None,
    };
    Embed {
        title: format!(
            "FINAL{suffix}: {}",
            score_line(matchup, home_score, away_score)
        ),
        color: GAME_END_COLOR,
        fields: Vec::new(),
        thumbnail: winner_logo.map(|url| EmbedThumbnail { url }),
        timestamp: at.to_rfc3339(),
    }
}

/// One-line plain-text rendering, used for logs.
pub fn summary_line(notification: &Notification) -> String {
    match notification {
        Notification::Goal { game_id, matchup, goal } => format!(
            "[{game_id}] goal #{} {} by {} ({}, {} {})",
            goal.index,
            score_line(matchup, goal.home_score, goal.away_score),
            goal.scorer,
            goal.strength,
            goal.period,
            goal.clock
        ),
        Notification::PeriodChange {
            game_id, period, ..
        } => format!("[{game_id}] period change -> {period}"),
        Notification::GameEnd {
            game_id,
            matchup,
            home_score,
            away_score,
            ..
        } => format!(
            "[{game_id}] final {}",
            score_line(matchup, *home_score, *away_score)
        ),
    }
}

/// Emit an embed as a single JSON line to stdout.
pub fn report_embed(channel_id: &str, embed: &Embed) {
    let line = serde_json::json!({ "channel_id": channel_id, "embed": embed });
    println!("{line}");
}

/// `AWAY a - h HOME`
fn score_line(matchup: &Matchup, home_score: u32, away_score: u32) -> String {
    format!(
        "{} {away_score} - {home_score} {}",
        team_or_placeholder(&matchup.away_abbrev, "AWAY"),
        team_or_placeholder(&matchup.home_abbrev, "HOME")
    )
}

fn team_or_placeholder<'a>(abbrev: &'a str, placeholder: &'a str) -> &'a str {
    if abbrev.trim().is_empty() { placeholder } else { abbrev }
}

fn period_name(label: &str) -> String {
    match label {
        "OT" => "Overtime".to_string(),
        "SO" => "Shootout".to_string(),
        _ => match label.strip_prefix('P').and_then(|n| n.parse::<u32>().ok()) {
            Some(1) => "1st Period".to_string(),
            Some(2) => "2nd Period".to_string(),
            Some(3) => "3rd Period".to_string(),
            Some(n) => format!("{n}th Period"),
            None => label.to_string(),
        },
    }
}

fn field(name: &str, value: &str, inline: bool) -> EmbedField {
    EmbedField {
        name: name.to_string(),
        value: value.to_string(),
        inline,
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
