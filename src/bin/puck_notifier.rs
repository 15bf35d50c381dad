use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};

use puck_notifier::api::{GameFeed, NhlClient};
use puck_notifier::config::{AppConfig, CONFIG_PATH};
use puck_notifier::dispatch::{ChannelSink, DestinationRegistry, Dispatcher, DiscordSink, StdoutSink};
use puck_notifier::engine::Poller;

#[derive(Parser)]
#[command(name = "puck-notifier", about = "Live NHL game notifications for Discord channels")]
struct Args {
    /// Path to the TOML config file
    #[arg(long, default_value = CONFIG_PATH)]
    config: PathBuf,

    /// Print embeds to stdout instead of posting them
    #[arg(long)]
    dry_run: bool,

    /// Run a single poll cycle and exit
    #[arg(long, conflicts_with = "next")]
    once: bool,

    /// Print the next scheduled game and exit
    #[arg(long)]
    next: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let config = AppConfig::load(&args.config)?;
    info!("Loaded config from {}", args.config.display());
    let settings = &config.settings;

    let feed = NhlClient::new(
        &settings.api_base,
        &config.team.abbrev,
        settings.http_timeout(),
        settings.max_game_duration(),
    )?;

    if args.next {
        match feed.fetch_next_scheduled_game().await {
            Some(game) => println!(
                "{} @ {} at {} (game {})",
                game.away_team.abbrev,
                game.home_team.abbrev,
                game.start_time_utc.to_rfc3339(),
                game.id
            ),
            None => println!("No upcoming game for {} in the current schedule window", config.team.abbrev),
        }
        return Ok(());
    }

    let registry = Arc::new(DestinationRegistry::new());
    for dest in &config.destinations {
        if let Some(previous) = registry.configure(&dest.guild_id, &dest.channel_id) {
            warn!(
                "Guild {} listed more than once; channel {} replaces {previous}",
                dest.guild_id, dest.channel_id
            );
        }
    }
    if registry.is_empty() {
        warn!("No destinations configured; notifications will be dropped");
    }

    let sink: Box<dyn ChannelSink> = if args.dry_run {
        Box::new(StdoutSink)
    } else {
        let token = config
            .discord_token()
            .context("no Discord token: set DISCORD_TOKEN or discord.token, or use --dry-run")?;
        Box::new(DiscordSink::new(token, settings.http_timeout())?)
    };

    let poller = Poller::new(feed, Dispatcher::new(registry.clone(), sink))
        .with_cursor_seed(settings.cursor_seed)
        .with_max_game_duration(settings.max_game_duration());

    let mode = if args.dry_run { "dry-run" } else { "live" };
    info!(
        "Starting puck-notifier ({mode}): team={} destinations={} poll={}ms seed={:?}",
        config.team.abbrev,
        registry.len(),
        settings.poll_interval_ms,
        settings.cursor_seed,
    );

    if args.once {
        if let Some(report) = poller.run_cycle().await {
            info!(
                "Cycle done: {} game(s) polled, {} notification(s)",
                report.games_polled,
                report.notifications.len()
            );
        }
        return Ok(());
    }

    match poller.feed().fetch_next_scheduled_game().await {
        Some(game) => info!(
            "Next game: {} @ {} at {}",
            game.away_team.abbrev,
            game.home_team.abbrev,
            game.start_time_utc.to_rfc3339()
        ),
        None => info!("No upcoming game in the current schedule window"),
    }

    info!("Entering polling loop. Press Ctrl+C to stop.");

    poller
        .run_poll_loop(settings.poll_interval(), async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!("Failed to listen for Ctrl+C: {e}");
                std::future::pending::<()>().await;
            }
        })
        .await;

    let tracked = poller.tracked_games().await;
    if !tracked.is_empty() {
        info!("Exiting with {} game(s) still tracked: {tracked:?}", tracked.len());
    }

    Ok(())
}
