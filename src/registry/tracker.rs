//! Per-match live state
//!
//! A [`TrackedMatch`] carries the immutable identity of a live match and a
//! lock-protected [`TrackerState`] holding its participants and watchers.

use crate::types::{
    LiveGameInfo, LiveParticipant, MatchId, MatchUpdate, MatchUpdateData, ParticipantData,
    SubscriberId, UpdatePriority,
};
use crate::utils::{elapsed_minutes, timestamp_from_millis, within_window};
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;
use std::collections::HashSet;
use std::time::Duration;

/// Status reported for matches that are still being played
pub const STATUS_IN_PROGRESS: &str = "in_progress";

/// Mutable part of a tracker, guarded by the tracker's own lock
#[derive(Debug, Clone)]
pub struct TrackerState {
    pub participants: Vec<LiveParticipant>,
    pub watchers: HashSet<SubscriberId>,
    pub last_update: DateTime<Utc>,
    pub update_count: u64,
}

/// Live state of one observed match
#[derive(Debug)]
pub struct TrackedMatch {
    match_id: MatchId,
    start_time: DateTime<Utc>,
    game_mode: String,
    state: RwLock<TrackerState>,
}

/// Cloned, lock-free view of a tracker
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrackerSnapshot {
    pub match_id: MatchId,
    pub start_time: DateTime<Utc>,
    pub game_mode: String,
    pub participants: Vec<LiveParticipant>,
    pub watchers: Vec<SubscriberId>,
    pub last_update: DateTime<Utc>,
    pub update_count: u64,
}

/// Fresh participant data produced by a refresh strategy
#[derive(Debug, Clone, Default)]
pub struct RefreshData {
    /// Replacement participant list; None keeps the current one
    pub participants: Option<Vec<LiveParticipant>>,
}

impl TrackedMatch {
    /// Build a tracker seeded from a live game with a single watcher
    pub fn from_live_game(
        match_id: &str,
        game: &LiveGameInfo,
        watcher: &str,
        now: DateTime<Utc>,
    ) -> Self {
        let participants = game
            .participants
            .iter()
            .map(|participant| LiveParticipant::from_live_game(participant, now))
            .collect();

        let mut watchers = HashSet::new();
        watchers.insert(watcher.to_string());

        Self {
            match_id: match_id.to_string(),
            start_time: timestamp_from_millis(game.start_time_ms),
            game_mode: game.game_mode.clone(),
            state: RwLock::new(TrackerState {
                participants,
                watchers,
                last_update: now,
                update_count: 0,
            }),
        }
    }

    pub fn match_id(&self) -> &str {
        &self.match_id
    }

    pub fn start_time(&self) -> DateTime<Utc> {
        self.start_time
    }

    pub fn game_mode(&self) -> &str {
        &self.game_mode
    }

    /// Add a watcher. Returns false if it was already watching.
    pub(crate) fn add_watcher(&self, subscriber_id: &str) -> bool {
        self.state.write().watchers.insert(subscriber_id.to_string())
    }

    /// Remove a watcher and report how many remain
    pub(crate) fn remove_watcher(&self, subscriber_id: &str) -> usize {
        let mut state = self.state.write();
        state.watchers.remove(subscriber_id);
        state.watchers.len()
    }

    pub fn watchers(&self) -> Vec<SubscriberId> {
        let mut watchers: Vec<_> = self.state.read().watchers.iter().cloned().collect();
        watchers.sort();
        watchers
    }

    pub fn watcher_count(&self) -> usize {
        self.state.read().watchers.len()
    }

    pub fn has_watcher(&self, subscriber_id: &str) -> bool {
        self.state.read().watchers.contains(subscriber_id)
    }

    pub fn last_update(&self) -> DateTime<Utc> {
        self.state.read().last_update
    }

    pub fn update_count(&self) -> u64 {
        self.state.read().update_count
    }

    /// Whether the tracker was refreshed less than `interval` before `now`
    pub fn is_fresh(&self, now: DateTime<Utc>, interval: Duration) -> bool {
        within_window(self.last_update(), now, interval)
    }

    /// Copy the current state out of the lock
    pub fn snapshot(&self) -> TrackerSnapshot {
        let state = self.state.read();
        let mut watchers: Vec<_> = state.watchers.iter().cloned().collect();
        watchers.sort();

        TrackerSnapshot {
            match_id: self.match_id.clone(),
            start_time: self.start_time,
            game_mode: self.game_mode.clone(),
            participants: state.participants.clone(),
            watchers,
            last_update: state.last_update,
            update_count: state.update_count,
        }
    }

    /// Apply a refresh under the tracker lock and build one update per watcher
    pub fn apply_refresh(&self, refresh: RefreshData, now: DateTime<Utc>) -> Vec<MatchUpdate> {
        let mut state = self.state.write();

        if let Some(mut participants) = refresh.participants {
            for participant in &mut participants {
                participant.refresh_kda();
                participant.last_update = now;
            }
            state.participants = participants;
        }
        state.update_count += 1;
        state.last_update = now;

        let data = MatchUpdateData {
            game_id: self.match_id.clone(),
            status: STATUS_IN_PROGRESS.to_string(),
            game_time: elapsed_minutes(self.start_time, now),
            participants: state.participants.iter().map(ParticipantData::from).collect(),
        };

        state
            .watchers
            .iter()
            .map(|watcher| MatchUpdate {
                match_id: self.match_id.clone(),
                subscriber_id: Some(watcher.clone()),
                data: data.clone(),
                priority: UpdatePriority::Medium,
            })
            .collect()
    }
}
