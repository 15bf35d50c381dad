use std::time::Duration;

use anyhow::Result;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::api::GameFeed;
use crate::dispatch::Dispatcher;
use crate::extract::{extract_scoring_events, extract_snapshot};
use crate::reporter::{format_notification, summary_line};
use crate::state::{CursorSeed, TrackingRecord, TrackingStore};
use crate::types::{GameSnapshot, Notification, ScoringEvent};

/// Result of diffing one successful poll against a tracking record.
#[derive(Debug, Clone, PartialEq)]
pub struct GameDiff {
    /// In emission order: goals by ascending index, then period change,
    /// then game end.
    pub notifications: Vec<Notification>,
    /// Updated record, or `None` when the game just ended.
    pub record: Option<TrackingRecord>,
}

/// Compare the current snapshot and goal list with what was already
/// announced.
///
/// `goals` must be in ascending index order, as returned by
/// `extract_scoring_events`.
pub fn diff_game(
    record: &TrackingRecord,
    snapshot: &GameSnapshot,
    goals: &[ScoringEvent],
    now: DateTime<Utc>,
) -> GameDiff {
    let mut notifications = Vec::new();
    let mut next = record.clone();

    for goal in goals
        .iter()
        .filter(|g| g.index as i64 > record.last_processed_event_index)
    {
        notifications.push(Notification::Goal {
            game_id: snapshot.game_id,
            matchup: snapshot.matchup.clone(),
            goal: goal.clone(),
        });
        next.advance_cursor(goal.index as i64);
    }

    if !record.last_period_label.is_empty() && record.last_period_label != snapshot.period_label {
        notifications.push(Notification::PeriodChange {
            game_id: snapshot.game_id,
            matchup: snapshot.matchup.clone(),
            home_score: snapshot.home_score,
            away_score: snapshot.away_score,
            period: snapshot.period_label.clone(),
        });
    }

    if snapshot.is_terminal() && !record.saw_final() {
        notifications.push(Notification::GameEnd {
            game_id: snapshot.game_id,
            matchup: snapshot.matchup.clone(),
            home_score: snapshot.home_score,
            away_score: snapshot.away_score,
            period: snapshot.period_label.clone(),
        });
        return GameDiff {
            notifications,
            record: None,
        };
    }

    next.refresh(snapshot, now);
    GameDiff {
        notifications,
        record: Some(next),
    }
}

/// What one poll cycle produced.
#[derive(Debug, Clone, Default)]
pub struct CycleReport {
    /// Games whose status and event log were both fetched.
    pub games_polled: usize,
    pub notifications: Vec<Notification>,
}

/// Drives poll cycles: fetch, extract, diff, dispatch.
pub struct Poller<F> {
    feed: F,
    dispatcher: Dispatcher,
    /// Doubles as the in-flight guard: a cycle holds it end to end.
    store: Mutex<TrackingStore>,
    cursor_seed: CursorSeed,
    max_game_duration: chrono::Duration,
}

impl<F: GameFeed> Poller<F> {
    pub fn new(feed: F, dispatcher: Dispatcher) -> Self {
        Self {
            feed,
            dispatcher,
            store: Mutex::new(TrackingStore::new()),
            cursor_seed: CursorSeed::default(),
            max_game_duration: chrono::Duration::hours(6),
        }
    }

    pub fn with_cursor_seed(mut self, seed: CursorSeed) -> Self {
        self.cursor_seed = seed;
        self
    }

    pub fn with_max_game_duration(mut self, max: chrono::Duration) -> Self {
        self.max_game_duration = max;
        self
    }

    pub fn feed(&self) -> &F {
        &self.feed
    }

    /// Current record for a game, if tracked.
    pub async fn record(&self, game_id: u64) -> Option<TrackingRecord> {
        self.store.lock().await.get(game_id).cloned()
    }

    pub async fn tracked_games(&self) -> Vec<u64> {
        self.store.lock().await.game_ids()
    }

    /// Run one cycle, or skip if the previous one is still running.
    ///
    /// Never fails: errors are logged and the cycle counts as a no-op.
    pub async fn run_cycle(&self) -> Option<CycleReport> {
        let Ok(mut store) = self.store.try_lock() else {
            warn!("Previous poll cycle still running, skipping tick");
            return None;
        };
        match self.cycle(&mut store).await {
            Ok(report) => Some(report),
            Err(e) => {
                warn!("Poll cycle error: {e:#}");
                None
            }
        }
    }

    /// Run a cycle every `every` until `shutdown` resolves.
    ///
    /// Ticks that fall due while a cycle runs are skipped, never queued.
    /// Shutdown is observed mid-cycle too: the in-flight cycle is dropped,
    /// and since records are committed before dispatch, at worst its
    /// remaining posts are lost.
    pub async fn run_poll_loop<S>(&self, every: Duration, shutdown: S)
    where
        S: Future<Output = ()>,
    {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("Shutdown signal received");
                    break;
                }
                _ = ticker.tick() => {
                    tokio::select! {
                        _ = &mut shutdown => {
                            info!("Shutdown signal received, abandoning in-flight cycle");
                            break;
                        }
                        report = self.run_cycle() => {
                            if let Some(report) = report
                                && !report.notifications.is_empty()
                            {
                                info!(
                                    "Cycle done: {} notification(s) across {} game(s)",
                                    report.notifications.len(),
                                    report.games_polled
                                );
                            }
                        }
                    }
                }
            }
        }
    }

    async fn cycle(&self, store: &mut TrackingStore) -> Result<CycleReport> {
        let mut report = CycleReport::default();
        let now = Utc::now();

        for game_id in store.evict_stale(now, self.max_game_duration) {
            info!("Dropping stale tracking record for game {game_id}");
        }

        let mut candidates = store.game_ids();
        match self.feed.fetch_current_live_game().await {
            Some(game) if store.has_ended(game.id) => {
                debug!("Game {} already announced as ended", game.id);
            }
            Some(game) => {
                let (_, created) = store.ensure(game.id, now);
                if created {
                    info!(
                        "Tracking game {} ({} @ {})",
                        game.id, game.away_team.abbrev, game.home_team.abbrev
                    );
                }
                if !candidates.contains(&game.id) {
                    candidates.push(game.id);
                }
            }
            None => debug!("No live game"),
        }

        for game_id in candidates {
            if let Some(mut notifications) = self.poll_game(store, game_id).await? {
                report.games_polled += 1;
                report.notifications.append(&mut notifications);
            }
        }

        Ok(report)
    }

    /// Poll one tracked game. `None` when upstream data was incomplete, in
    /// which case the record is left untouched.
    async fn poll_game(
        &self,
        store: &mut TrackingStore,
        game_id: u64,
    ) -> Result<Option<Vec<Notification>>> {
        let Some(status) = self.feed.fetch_live_status(game_id).await else {
            debug!("No live status for game {game_id}, retrying next cycle");
            return Ok(None);
        };
        let Some(log) = self.feed.fetch_event_log(game_id).await else {
            debug!("No event log for game {game_id}, retrying next cycle");
            return Ok(None);
        };
        anyhow::ensure!(
            status.id == game_id,
            "live status for game {game_id} describes game {}",
            status.id
        );

        let snapshot = extract_snapshot(&status);
        let goals = extract_scoring_events(&log);
        let mut record = store.get(game_id).cloned().unwrap_or_default();

        if record.last_update_time.is_none() && self.cursor_seed == CursorSeed::SkipExisting {
            record.advance_cursor(goals.len() as i64 - 1);
            info!(
                "Game {game_id}: skipping {} goal(s) scored before tracking started",
                goals.len()
            );
        }

        let now = Utc::now();
        let diff = diff_game(&record, &snapshot, &goals, now);

        // Commit before sending: a crash mid-send loses a post rather than
        // repeating one.
        match diff.record {
            Some(next) => store.insert(game_id, next),
            None => {
                store.finish(game_id, now);
                info!("Game {game_id} ended, tracking stopped");
            }
        }

        for notification in &diff.notifications {
            info!("{}", summary_line(notification));
            let embed = format_notification(notification, now);
            self.dispatcher.broadcast(&embed).await;
        }

        Ok(Some(diff.notifications))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex as StdMutex};

    use async_trait::async_trait;
    use serde_json::json;
    use tokio::sync::Notify;

    use crate::dispatch::{ChannelSink, DestinationRegistry};
    use crate::types::{Embed, EventLog, GameState, LiveStatus, Matchup, ScheduledGame};

    const GAME: u64 = 2024020500;

    // ── fakes ──────────────────────────────────────────────────────

    #[derive(Default)]
    struct FakeFeedState {
        live: Option<ScheduledGame>,
        status: HashMap<u64, LiveStatus>,
        log: HashMap<u64, EventLog>,
        status_calls: u32,
    }

    #[derive(Default)]
    struct FakeFeed {
        state: StdMutex<FakeFeedState>,
        gate: Option<(Notify, Notify)>,
    }

    impl FakeFeed {
        fn gated() -> Self {
            Self {
                gate: Some((Notify::new(), Notify::new())),
                ..Self::default()
            }
        }

        fn set_live(&self, state: &str) {
            self.state.lock().unwrap().live = Some(make_scheduled(state));
        }

        fn clear_live(&self) {
            self.state.lock().unwrap().live = None;
        }

        fn set_status(&self, state: &str, period: u32, home: u32, away: u32) {
            self.state
                .lock()
                .unwrap()
                .status
                .insert(GAME, make_status(state, period, home, away));
        }

        fn clear_status(&self) {
            self.state.lock().unwrap().status.clear();
        }

        fn set_goals(&self, count: usize) {
            self.state.lock().unwrap().log.insert(GAME, make_log(count));
        }

        fn clear_log(&self) {
            self.state.lock().unwrap().log.clear();
        }

        fn status_calls(&self) -> u32 {
            self.state.lock().unwrap().status_calls
        }
    }

    #[async_trait]
    impl GameFeed for Arc<FakeFeed> {
        async fn fetch_current_live_game(&self) -> Option<ScheduledGame> {
            if let Some((entered, release)) = &self.gate {
                entered.notify_one();
                release.notified().await;
            }
            self.state.lock().unwrap().live.clone()
        }

        async fn fetch_next_scheduled_game(&self) -> Option<ScheduledGame> {
            None
        }

        async fn fetch_live_status(&self, game_id: u64) -> Option<LiveStatus> {
            let mut state = self.state.lock().unwrap();
            state.status_calls += 1;
            state.status.get(&game_id).cloned()
        }

        async fn fetch_event_log(&self, game_id: u64) -> Option<EventLog> {
            self.state.lock().unwrap().log.get(&game_id).cloned()
        }
    }

    #[derive(Default)]
    struct RecordingSink {
        titles: StdMutex<Vec<String>>,
        fail: bool,
    }

    #[async_trait]
    impl ChannelSink for Arc<RecordingSink> {
        async fn send(&self, _channel_id: &str, embed: &Embed) -> anyhow::Result<()> {
            if self.fail {
                anyhow::bail!("403 Forbidden");
            }
            self.titles.lock().unwrap().push(embed.title.clone());
            Ok(())
        }
    }

    fn make_scheduled(state: &str) -> ScheduledGame {
        serde_json::from_value(json!({
            "id": GAME,
            "startTimeUTC": "2024-10-09T23:00:00Z",
            "gameState": state,
            "homeTeam": { "id": 10, "abbrev": "TOR" },
            "awayTeam": { "id": 8, "abbrev": "MTL" }
        }))
        .expect("valid test ScheduledGame JSON")
    }

    fn make_status(state: &str, period: u32, home: u32, away: u32) -> LiveStatus {
        serde_json::from_value(json!({
            "id": GAME,
            "gameState": state,
            "homeTeam": { "id": 10, "abbrev": "TOR", "score": home },
            "awayTeam": { "id": 8, "abbrev": "MTL", "score": away },
            "periodDescriptor": { "number": period, "periodType": "REG" },
            "clock": { "timeRemaining": "10:00", "inIntermission": false }
        }))
        .expect("valid test LiveStatus JSON")
    }

    /// A log with `count` home goals interleaved with other plays.
    fn make_log(count: usize) -> EventLog {
        let mut plays = Vec::new();
        for i in 0..count {
            plays.push(json!({ "typeDescKey": "faceoff" }));
            plays.push(json!({
                "typeDescKey": "goal",
                "periodDescriptor": { "number": 1, "periodType": "REG" },
                "timeInPeriod": format!("0{i}:00"),
                "situationCode": "1551",
                "details": {
                    "scoringPlayerId": 1,
                    "eventOwnerTeamId": 10,
                    "homeScore": i + 1,
                    "awayScore": 0
                }
            }));
        }
        serde_json::from_value(json!({
            "id": GAME,
            "homeTeam": { "id": 10, "abbrev": "TOR" },
            "awayTeam": { "id": 8, "abbrev": "MTL" },
            "plays": plays,
            "rosterSpots": [
                { "teamId": 10, "playerId": 1, "firstName": { "default": "Auston" }, "lastName": { "default": "Matthews" } }
            ]
        }))
        .expect("valid test EventLog JSON")
    }

    fn make_poller(feed: &Arc<FakeFeed>, sink: &Arc<RecordingSink>) -> Poller<Arc<FakeFeed>> {
        let registry = Arc::new(DestinationRegistry::new());
        registry.configure("g1", "c1");
        let dispatcher = Dispatcher::new(registry, Box::new(sink.clone()));
        Poller::new(feed.clone(), dispatcher)
    }

    fn goal_indices(report: &CycleReport) -> Vec<usize> {
        report
            .notifications
            .iter()
            .filter_map(|n| match n {
                Notification::Goal { goal, .. } => Some(goal.index),
                _ => None,
            })
            .collect()
    }

    fn live_feed(goals: usize) -> Arc<FakeFeed> {
        let feed = Arc::new(FakeFeed::default());
        feed.set_live("LIVE");
        feed.set_status("LIVE", 1, goals as u32, 0);
        feed.set_goals(goals);
        feed
    }

    // ── diff_game ──────────────────────────────────────────────────

    fn make_snapshot(state: GameState, period: &str, clock: &str) -> GameSnapshot {
        GameSnapshot {
            game_id: GAME,
            state,
            matchup: Matchup::default(),
            home_score: 0,
            away_score: 0,
            period_label: period.to_string(),
            clock: clock.to_string(),
        }
    }

    #[test]
    fn diff_emits_only_goals_past_cursor() {
        let goals = extract_scoring_events(&make_log(3));
        let mut record = TrackingRecord::new();
        record.advance_cursor(0);
        let diff = diff_game(&record, &make_snapshot(GameState::Live, "P1", "10:00"), &goals, Utc::now());
        let indices: Vec<usize> = diff
            .notifications
            .iter()
            .filter_map(|n| match n {
                Notification::Goal { goal, .. } => Some(goal.index),
                _ => None,
            })
            .collect();
        assert_eq!(indices, vec![1, 2]);
        assert_eq!(diff.record.unwrap().last_processed_event_index, 2);
    }

    #[test]
    fn diff_first_observation_has_no_period_change() {
        let diff = diff_game(
            &TrackingRecord::new(),
            &make_snapshot(GameState::Live, "P2", "10:00"),
            &[],
            Utc::now(),
        );
        assert!(diff.notifications.is_empty());
        let record = diff.record.unwrap();
        assert_eq!(record.last_period_label, "P2");
        assert_eq!(record.last_processed_event_index, -1);
        assert!(record.last_update_time.is_some());
    }

    #[test]
    fn diff_terminal_only_once() {
        let mut record = TrackingRecord::new();
        record.last_period_label = "P3".to_string();
        let snapshot = make_snapshot(GameState::Final, "P3", "Final");

        let diff = diff_game(&record, &snapshot, &[], Utc::now());
        assert_eq!(diff.notifications.len(), 1);
        assert!(matches!(diff.notifications[0], Notification::GameEnd { .. }));
        assert!(diff.record.is_none());

        // A record that already saw the sentinel does not fire again.
        record.last_clock_value = "Final".to_string();
        let diff = diff_game(&record, &snapshot, &[], Utc::now());
        assert!(diff.notifications.is_empty());
        assert!(diff.record.is_some());
    }

    // ── Poller ─────────────────────────────────────────────────────

    #[tokio::test]
    async fn announces_each_goal_once_then_replays_after_restart() {
        let feed = live_feed(3);
        let sink = Arc::new(RecordingSink::default());
        let poller = make_poller(&feed, &sink);

        let report = poller.run_cycle().await.unwrap();
        assert_eq!(goal_indices(&report), vec![0, 1, 2]);
        assert_eq!(poller.record(GAME).await.unwrap().last_processed_event_index, 2);
        assert_eq!(sink.titles.lock().unwrap().len(), 3);

        let report = poller.run_cycle().await.unwrap();
        assert!(report.notifications.is_empty());
        assert_eq!(sink.titles.lock().unwrap().len(), 3);

        // Fresh store: every goal already in the log is announced again.
        let restarted = make_poller(&feed, &sink);
        let report = restarted.run_cycle().await.unwrap();
        assert_eq!(goal_indices(&report), vec![0, 1, 2]);
    }

    #[tokio::test]
    async fn new_goals_announced_in_order() {
        let feed = live_feed(1);
        let sink = Arc::new(RecordingSink::default());
        let poller = make_poller(&feed, &sink);

        assert_eq!(goal_indices(&poller.run_cycle().await.unwrap()), vec![0]);

        feed.set_goals(4);
        let report = poller.run_cycle().await.unwrap();
        assert_eq!(goal_indices(&report), vec![1, 2, 3]);
        let titles = sink.titles.lock().unwrap().clone();
        assert_eq!(titles.len(), 4);
        assert_eq!(titles[1], "MTL 0 - 2 TOR | TOR GOAL!");
        assert_eq!(titles[3], "MTL 0 - 4 TOR | TOR GOAL!");
    }

    #[tokio::test]
    async fn cursor_never_moves_back_when_log_shrinks() {
        let feed = live_feed(3);
        let sink = Arc::new(RecordingSink::default());
        let poller = make_poller(&feed, &sink);
        poller.run_cycle().await.unwrap();

        feed.set_goals(1);
        let report = poller.run_cycle().await.unwrap();
        assert!(report.notifications.is_empty());
        assert_eq!(poller.record(GAME).await.unwrap().last_processed_event_index, 2);

        feed.set_goals(4);
        let report = poller.run_cycle().await.unwrap();
        assert_eq!(goal_indices(&report), vec![3]);
    }

    #[tokio::test]
    async fn partial_data_leaves_record_untouched() {
        let feed = live_feed(2);
        feed.clear_log();
        let sink = Arc::new(RecordingSink::default());
        let poller = make_poller(&feed, &sink);

        let report = poller.run_cycle().await.unwrap();
        assert_eq!(report.games_polled, 0);
        assert!(report.notifications.is_empty());
        assert_eq!(poller.record(GAME).await.unwrap(), TrackingRecord::new());

        feed.set_goals(2);
        feed.clear_status();
        poller.run_cycle().await.unwrap();
        assert_eq!(poller.record(GAME).await.unwrap(), TrackingRecord::new());

        feed.set_status("LIVE", 1, 2, 0);
        let report = poller.run_cycle().await.unwrap();
        assert_eq!(report.games_polled, 1);
        assert_eq!(goal_indices(&report), vec![0, 1]);
    }

    #[tokio::test]
    async fn idle_when_nothing_is_live() {
        let feed = Arc::new(FakeFeed::default());
        let sink = Arc::new(RecordingSink::default());
        let poller = make_poller(&feed, &sink);

        let report = poller.run_cycle().await.unwrap();
        assert_eq!(report.games_polled, 0);
        assert!(poller.tracked_games().await.is_empty());
        assert_eq!(feed.status_calls(), 0);
    }

    #[tokio::test]
    async fn period_change_announced() {
        let feed = live_feed(0);
        let sink = Arc::new(RecordingSink::default());
        let poller = make_poller(&feed, &sink);
        assert!(poller.run_cycle().await.unwrap().notifications.is_empty());

        feed.set_status("LIVE", 2, 0, 0);
        let report = poller.run_cycle().await.unwrap();
        assert_eq!(report.notifications.len(), 1);
        assert!(matches!(
            &report.notifications[0],
            Notification::PeriodChange { period, .. } if period == "P2"
        ));

        assert!(poller.run_cycle().await.unwrap().notifications.is_empty());
    }

    #[tokio::test]
    async fn game_end_fires_once_after_game_leaves_live_window() {
        let feed = live_feed(2);
        let sink = Arc::new(RecordingSink::default());
        let poller = make_poller(&feed, &sink);
        poller.run_cycle().await.unwrap();

        // Schedule no longer reports the game as live; the tracked record
        // keeps it polled until the end is seen.
        feed.clear_live();
        feed.set_status("FINAL", 3, 2, 0);
        let report = poller.run_cycle().await.unwrap();
        assert_eq!(report.notifications.len(), 2);
        assert!(matches!(report.notifications[0], Notification::PeriodChange { .. }));
        assert!(matches!(
            report.notifications[1],
            Notification::GameEnd { home_score: 2, away_score: 0, .. }
        ));
        assert!(poller.record(GAME).await.is_none());

        for _ in 0..3 {
            let report = poller.run_cycle().await.unwrap();
            assert!(report.notifications.is_empty());
        }
        let titles = sink.titles.lock().unwrap().clone();
        assert_eq!(titles.iter().filter(|t| t.starts_with("FINAL")).count(), 1);
    }

    #[tokio::test]
    async fn ended_game_never_tracked_again() {
        let feed = live_feed(1);
        let sink = Arc::new(RecordingSink::default());
        let poller = make_poller(&feed, &sink);
        poller.run_cycle().await.unwrap();

        // Upstream keeps listing the game as live after it went final.
        feed.set_status("OFF", 1, 1, 0);
        let report = poller.run_cycle().await.unwrap();
        assert!(matches!(report.notifications.last(), Some(Notification::GameEnd { .. })));

        for _ in 0..3 {
            let report = poller.run_cycle().await.unwrap();
            assert!(report.notifications.is_empty());
            assert!(poller.tracked_games().await.is_empty());
        }
    }

    #[tokio::test]
    async fn goals_and_game_end_in_same_cycle() {
        let feed = live_feed(0);
        let sink = Arc::new(RecordingSink::default());
        let poller = make_poller(&feed, &sink);
        poller.run_cycle().await.unwrap();

        feed.set_goals(1);
        feed.set_status("FINAL", 1, 1, 0);
        let report = poller.run_cycle().await.unwrap();
        assert_eq!(report.notifications.len(), 2);
        assert!(matches!(report.notifications[0], Notification::Goal { .. }));
        assert!(matches!(report.notifications[1], Notification::GameEnd { .. }));
    }

    #[tokio::test]
    async fn skip_existing_seed_suppresses_replay() {
        let feed = live_feed(3);
        let sink = Arc::new(RecordingSink::default());
        let poller = make_poller(&feed, &sink).with_cursor_seed(CursorSeed::SkipExisting);

        let report = poller.run_cycle().await.unwrap();
        assert!(report.notifications.is_empty());
        assert_eq!(poller.record(GAME).await.unwrap().last_processed_event_index, 2);

        feed.set_goals(4);
        let report = poller.run_cycle().await.unwrap();
        assert_eq!(goal_indices(&report), vec![3]);
    }

    #[tokio::test]
    async fn delivery_failure_does_not_rewind_cursor() {
        let feed = live_feed(2);
        let sink = Arc::new(RecordingSink {
            fail: true,
            ..RecordingSink::default()
        });
        let poller = make_poller(&feed, &sink);

        let report = poller.run_cycle().await.unwrap();
        assert_eq!(goal_indices(&report), vec![0, 1]);
        assert_eq!(poller.record(GAME).await.unwrap().last_processed_event_index, 1);
        assert!(poller.run_cycle().await.unwrap().notifications.is_empty());
    }

    #[tokio::test]
    async fn mismatched_status_aborts_cycle_without_mutation() {
        let feed = live_feed(2);
        {
            let mut state = feed.state.lock().unwrap();
            let status = state.status.get_mut(&GAME).unwrap();
            status.id = GAME + 1;
        }
        let sink = Arc::new(RecordingSink::default());
        let poller = make_poller(&feed, &sink);

        assert!(poller.run_cycle().await.is_none());
        assert_eq!(poller.record(GAME).await.unwrap(), TrackingRecord::new());
        assert!(sink.titles.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn unpolled_game_evicted_after_max_duration() {
        let feed = live_feed(1);
        feed.clear_status();
        let sink = Arc::new(RecordingSink::default());
        let poller = make_poller(&feed, &sink).with_max_game_duration(chrono::Duration::milliseconds(5));

        let report = poller.run_cycle().await.unwrap();
        assert_eq!(report.games_polled, 0);
        assert_eq!(poller.tracked_games().await, vec![GAME]);
        assert_eq!(feed.status_calls(), 1);

        feed.clear_live();
        tokio::time::sleep(Duration::from_millis(20)).await;
        poller.run_cycle().await.unwrap();
        assert!(poller.tracked_games().await.is_empty());
        assert_eq!(feed.status_calls(), 1);
    }

    #[tokio::test]
    async fn poll_loop_stops_while_cycle_in_flight() {
        let feed = Arc::new(FakeFeed::gated());
        let sink = Arc::new(RecordingSink::default());
        let poller = make_poller(&feed, &sink);
        let (entered, _release) = feed.gate.as_ref().unwrap();

        // Shut down once the first cycle is blocked on the feed.
        let stopped = tokio::time::timeout(
            Duration::from_secs(5),
            poller.run_poll_loop(Duration::from_millis(10), entered.notified()),
        )
        .await;
        assert!(stopped.is_ok());
        // The abandoned cycle released the store.
        assert!(poller.tracked_games().await.is_empty());
    }

    #[tokio::test]
    async fn poll_loop_runs_cycles_until_shutdown() {
        let feed = live_feed(2);
        let sink = Arc::new(RecordingSink::default());
        let poller = make_poller(&feed, &sink);

        poller
            .run_poll_loop(
                Duration::from_millis(5),
                tokio::time::sleep(Duration::from_millis(60)),
            )
            .await;
        assert!(feed.status_calls() >= 2);
        assert_eq!(sink.titles.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn overlapping_cycle_is_skipped() {
        let feed = Arc::new(FakeFeed::gated());
        let sink = Arc::new(RecordingSink::default());
        let poller = make_poller(&feed, &sink);
        let (entered, release) = feed.gate.as_ref().unwrap();

        let (first, second) = tokio::join!(poller.run_cycle(), async {
            entered.notified().await;
            let second = poller.run_cycle().await;
            release.notify_one();
            second
        });
        assert!(first.is_some());
        assert!(second.is_none());
    }
}
