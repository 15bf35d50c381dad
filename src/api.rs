use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};
use url::Url;

use crate::types::{EventLog, LiveStatus, ScheduleResponse, ScheduledGame};

/// Read-only view of the upstream game feed.
///
/// Every fetch folds transport errors, non-success statuses and malformed
/// bodies into `None`; callers retry on the next cycle.
#[async_trait]
pub trait GameFeed: Send + Sync {
    /// The tracked team's game that is in progress right now.
    async fn fetch_current_live_game(&self) -> Option<ScheduledGame>;

    /// The tracked team's earliest game starting after now.
    async fn fetch_next_scheduled_game(&self) -> Option<ScheduledGame>;

    async fn fetch_live_status(&self, game_id: u64) -> Option<LiveStatus>;

    async fn fetch_event_log(&self, game_id: u64) -> Option<EventLog>;
}

/// HTTP client for the public NHL web API.
pub struct NhlClient {
    http: reqwest::Client,
    base: Url,
    team: String,
    max_game_duration: chrono::Duration,
}

impl NhlClient {
    pub fn new(
        api_base: &str,
        team: &str,
        timeout: Duration,
        max_game_duration: chrono::Duration,
    ) -> Result<Self> {
        // `Url::join` replaces the last segment unless the base ends in '/'.
        let mut base = api_base.trim_end_matches('/').to_string();
        base.push('/');
        let base = Url::parse(&base).with_context(|| format!("invalid API base {api_base}"))?;
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build upstream HTTP client")?;
        Ok(Self {
            http,
            base,
            team: team.to_uppercase(),
            max_game_duration,
        })
    }

    /// Fetch the tracked team's schedule window (current week).
    pub async fn fetch_schedule(&self) -> Option<Vec<ScheduledGame>> {
        let path = format!("club-schedule/{}/week/now", self.team);
        let schedule: ScheduleResponse = self.get_json(&path).await?;
        debug!("Fetched {} scheduled games for {}", schedule.games.len(), self.team);
        Some(schedule.games)
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Option<T> {
        match self.try_get_json(path).await {
            Ok(value) => Some(value),
            Err(e) => {
                warn!("Upstream fetch {path} failed: {e:#}");
                None
            }
        }
    }

    async fn try_get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = self
            .base
            .join(path)
            .with_context(|| format!("invalid path {path}"))?;
        let resp = self
            .http
            .get(url)
            .send()
            .await
            .context("request failed")?
            .error_for_status()?;
        let body = resp.json::<T>().await.context("malformed body")?;
        Ok(body)
    }
}

#[async_trait]
impl GameFeed for NhlClient {
    async fn fetch_current_live_game(&self) -> Option<ScheduledGame> {
        let games = self.fetch_schedule().await?;
        select_live_game(&games, Utc::now(), self.max_game_duration).cloned()
    }

    async fn fetch_next_scheduled_game(&self) -> Option<ScheduledGame> {
        let games = self.fetch_schedule().await?;
        select_next_game(&games, Utc::now()).cloned()
    }

    async fn fetch_live_status(&self, game_id: u64) -> Option<LiveStatus> {
        self.get_json(&format!("gamecenter/{game_id}/landing")).await
    }

    async fn fetch_event_log(&self, game_id: u64) -> Option<EventLog> {
        self.get_json(&format!("gamecenter/{game_id}/play-by-play"))
            .await
    }
}

/// Pick the game that is live at `now`.
///
/// A game qualifies when its start has passed, `start + max_duration` has
/// not, and its reported state is in progress. Earliest start wins.
pub fn select_live_game(
    games: &[ScheduledGame],
    now: DateTime<Utc>,
    max_duration: chrono::Duration,
) -> Option<&ScheduledGame> {
    games
        .iter()
        .filter(|g| g.start_time_utc <= now)
        .filter(|g| g.start_time_utc + max_duration > now)
        .filter(|g| g.game_state.is_in_progress())
        .min_by_key(|g| g.start_time_utc)
}

/// Pick the earliest game starting strictly after `now`.
pub fn select_next_game(games: &[ScheduledGame], now: DateTime<Utc>) -> Option<&ScheduledGame> {
    games
        .iter()
        .filter(|g| g.start_time_utc > now)
        .min_by_key(|g| g.start_time_utc)
}
