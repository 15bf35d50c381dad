use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::extract::FINAL_CLOCK;
use crate::types::GameSnapshot;

/// Where a freshly created record places its cursor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CursorSeed {
    /// Start at -1: every goal already in the log is announced once.
    #[default]
    Replay,
    /// Start after the goals present when tracking begins.
    SkipExisting,
}

/// Per-game dedup state: what has already been announced.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrackingRecord {
    /// Last fully successful poll; `None` until the first one.
    pub last_update_time: Option<DateTime<Utc>>,
    pub last_period_label: String,
    pub last_home_score: u32,
    pub last_away_score: u32,
    pub last_clock_value: String,
    /// Highest goal index already announced, -1 when none.
    pub last_processed_event_index: i64,
}

impl Default for TrackingRecord {
    fn default() -> Self {
        Self::new()
    }
}

impl TrackingRecord {
    pub fn new() -> Self {
        Self {
            last_update_time: None,
            last_period_label: String::new(),
            last_home_score: 0,
            last_away_score: 0,
            last_clock_value: String::new(),
            last_processed_event_index: -1,
        }
    }

    /// Move the cursor forward; never moves it back.
    pub fn advance_cursor(&mut self, index: i64) {
        self.last_processed_event_index = self.last_processed_event_index.max(index);
    }

    /// Whether the previous poll already saw the game as concluded.
    pub fn saw_final(&self) -> bool {
        self.last_clock_value == FINAL_CLOCK
    }

    /// Copy score, period and clock from the current snapshot.
    pub fn refresh(&mut self, snapshot: &GameSnapshot, now: DateTime<Utc>) {
        self.last_update_time = Some(now);
        self.last_period_label = snapshot.period_label.clone();
        self.last_home_score = snapshot.home_score;
        self.last_away_score = snapshot.away_score;
        self.last_clock_value = snapshot.clock.clone();
    }
}

/// In-memory map of game id → tracking record.
#[derive(Debug, Default)]
pub struct TrackingStore {
    records: HashMap<u64, TrackingRecord>,
    /// When each record was created; ages out records never polled.
    tracked_since: HashMap<u64, DateTime<Utc>>,
    /// Games whose end has been announced, with the time it was. Never
    /// tracked again while present.
    ended: HashMap<u64, DateTime<Utc>>,
}

impl TrackingStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the record for a game, creating a fresh one if absent.
    /// Returns `true` alongside when the record was just created.
    pub fn ensure(&mut self, game_id: u64, now: DateTime<Utc>) -> (&mut TrackingRecord, bool) {
        let created = !self.records.contains_key(&game_id);
        if created {
            self.tracked_since.insert(game_id, now);
        }
        let record = self.records.entry(game_id).or_default();
        (record, created)
    }

    pub fn get(&self, game_id: u64) -> Option<&TrackingRecord> {
        self.records.get(&game_id)
    }

    pub fn insert(&mut self, game_id: u64, record: TrackingRecord) {
        self.records.insert(game_id, record);
    }

    fn remove(&mut self, game_id: u64) -> Option<TrackingRecord> {
        self.tracked_since.remove(&game_id);
        self.records.remove(&game_id)
    }

    /// Destroy the record of a concluded game and remember it ended.
    pub fn finish(&mut self, game_id: u64, now: DateTime<Utc>) -> Option<TrackingRecord> {
        self.ended.insert(game_id, now);
        self.remove(game_id)
    }

    pub fn has_ended(&self, game_id: u64) -> bool {
        self.ended.contains_key(&game_id)
    }

    /// Tracked game ids in ascending order.
    pub fn game_ids(&self) -> Vec<u64> {
        let mut ids: Vec<u64> = self.records.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Drop records older than `max_age` and forget games that ended
    /// longer than `max_age` ago.
    ///
    /// A record's age runs from its last successful poll, or from its
    /// creation when it was never polled. Covers games that vanished from
    /// the live window without reporting a terminal state (postponed,
    /// suspended) and games whose endpoints keep failing. An ended game is
    /// outside the live window by the time it is forgotten.
    pub fn evict_stale(&mut self, now: DateTime<Utc>, max_age: Duration) -> Vec<u64> {
        let mut stale: Vec<u64> = self
            .records
            .iter()
            .filter(|(id, r)| {
                r.last_update_time
                    .or_else(|| self.tracked_since.get(*id).copied())
                    .is_some_and(|t| now - t > max_age)
            })
            .map(|(id, _)| *id)
            .collect();
        stale.sort_unstable();
        for id in &stale {
            self.remove(*id);
        }
        self.ended.retain(|_, ended_at| now - *ended_at <= max_age);
        stale
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
