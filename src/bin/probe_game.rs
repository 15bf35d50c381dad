//! Probe: one game's landing + play-by-play
//!
//! Fetches a game through the same client the notifier uses and prints:
//! - The normalized snapshot (score, period, clock, state)
//! - Every extracted goal with its strength classification
//! - The embeds that would be posted for each goal
//!
//! Without `--game`, probes the team's current live game (or the most
//! recent game in this week's schedule).

use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;

use puck_notifier::NHL_API_BASE;
use puck_notifier::api::{GameFeed, NhlClient};
use puck_notifier::extract::{extract_scoring_events, extract_snapshot};
use puck_notifier::reporter::format_goal;

#[derive(Parser)]
#[command(name = "probe_game", about = "Inspect the upstream feed for one game")]
struct Cli {
    /// Game id, e.g. 2024020500
    #[arg(long)]
    game: Option<u64>,

    /// Team code used to find a game when --game is omitted
    #[arg(long, default_value = "TOR")]
    team: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let client = NhlClient::new(
        NHL_API_BASE,
        &cli.team,
        Duration::from_secs(10),
        chrono::Duration::hours(6),
    )?;

    let game_id = match cli.game {
        Some(id) => id,
        None => find_game(&client).await.context("no game found for team")?,
    };

    println!("=== Probe: game {game_id} ===");
    println!();

    let status = client
        .fetch_live_status(game_id)
        .await
        .context("landing endpoint returned no data")?;
    let snapshot = extract_snapshot(&status);
    println!("--- Snapshot ---");
    println!("{}", serde_json::to_string_pretty(&snapshot)?);
    println!();

    let log = client
        .fetch_event_log(game_id)
        .await
        .context("play-by-play endpoint returned no data")?;
    let goals = extract_scoring_events(&log);
    println!("--- Event log: {} plays, {} goals ---", log.plays.len(), goals.len());
    for goal in &goals {
        println!(
            "  #{:<2} {:>3} {:<6} {:<4} {}-{}  {} ({})",
            goal.index,
            goal.period,
            goal.clock,
            goal.strength,
            goal.away_score,
            goal.home_score,
            goal.scorer,
            goal.assists,
        );
    }
    println!();

    println!("--- Goal embeds ---");
    let now = Utc::now();
    for goal in &goals {
        let embed = format_goal(&snapshot.matchup, goal, now);
        println!("{}", serde_json::to_string(&embed)?);
    }

    Ok(())
}

/// The live game, else the latest game of the week that has started.
async fn find_game(client: &NhlClient) -> Option<u64> {
    if let Some(game) = client.fetch_current_live_game().await {
        println!("Live game: {}", game.id);
        return Some(game.id);
    }
    let now = Utc::now();
    let games = client.fetch_schedule().await?;
    games
        .iter()
        .filter(|g| g.start_time_utc <= now)
        .max_by_key(|g| g.start_time_utc)
        .map(|g| {
            println!("No live game, using most recent: {}", g.id);
            g.id
        })
}
