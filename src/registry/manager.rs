//! Match registry implementation
//!
//! The registry owns every [`TrackedMatch`] and keeps the invariant that a
//! tracker is reachable iff at least one subscriber watches it.
//!
//! Lock order is registry map, then tracker. Watchers are added while the
//! map's read lock is held and removed while its write lock is held, so the
//! removal of the last watcher and the removal of the tracker happen as one
//! step with respect to concurrent `start_tracking` calls.

use crate::error::{LiveTrackingError, Result};
use crate::metrics::MetricsCollector;
use crate::registry::tracker::{TrackedMatch, TrackerSnapshot};
use crate::source::GameStateSource;
use crate::types::{MatchId, SubscriberId};
use crate::utils::current_timestamp;
use parking_lot::RwLock;
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// How a `start_tracking` call was satisfied
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackingOutcome {
    /// A new tracker was created with the caller as its only watcher
    Created,
    /// The match was already tracked and the caller joined its watchers
    JoinedExisting,
}

impl TrackingOutcome {
    pub fn as_str(self) -> &'static str {
        match self {
            TrackingOutcome::Created => "created",
            TrackingOutcome::JoinedExisting => "joined",
        }
    }
}

/// Registry of live trackers keyed by match id
pub struct MatchRegistry {
    trackers: RwLock<HashMap<MatchId, Arc<TrackedMatch>>>,
    source: Arc<dyn GameStateSource>,
    metrics: Arc<MetricsCollector>,
}

impl MatchRegistry {
    pub fn new(source: Arc<dyn GameStateSource>, metrics: Arc<MetricsCollector>) -> Self {
        Self {
            trackers: RwLock::new(HashMap::new()),
            source,
            metrics,
        }
    }

    /// Start watching a match on behalf of a subscriber
    ///
    /// Joins the existing tracker when the match is already tracked. Otherwise
    /// the live game is fetched with no lock held and a tracker seeded from it
    /// is inserted; a concurrent caller that inserted first wins and this
    /// caller joins its tracker instead.
    pub async fn start_tracking(
        &self,
        match_id: &str,
        subscriber_id: &str,
    ) -> Result<TrackingOutcome> {
        if self.join_existing(match_id, subscriber_id) {
            return self.finish(match_id, subscriber_id, TrackingOutcome::JoinedExisting);
        }

        let game = match self.source.fetch_live_game(subscriber_id).await {
            Ok(game) => game,
            Err(e) => {
                warn!(
                    "Failed to fetch live game for subscriber {} (match {}): {}",
                    subscriber_id, match_id, e
                );
                self.metrics.record_tracking_request("failed");
                return Err(LiveTrackingError::SourceUnavailable {
                    message: e.to_string(),
                }
                .into());
            }
        };

        let tracker = TrackedMatch::from_live_game(match_id, &game, subscriber_id, current_timestamp());

        let outcome = {
            let mut trackers = self.trackers.write();
            match trackers.entry(match_id.to_string()) {
                Entry::Occupied(existing) => {
                    existing.get().add_watcher(subscriber_id);
                    TrackingOutcome::JoinedExisting
                }
                Entry::Vacant(slot) => {
                    slot.insert(Arc::new(tracker));
                    TrackingOutcome::Created
                }
            }
        };

        if outcome == TrackingOutcome::Created {
            info!(
                "Started tracking match {} ({} participants) for subscriber {}",
                match_id,
                game.participants.len(),
                subscriber_id
            );
        }

        self.finish(match_id, subscriber_id, outcome)
    }

    /// Stop watching a match. Removes the tracker once nobody watches it.
    ///
    /// Untracked matches and non-watching subscribers are no-ops.
    pub fn stop_tracking(&self, match_id: &str, subscriber_id: &str) {
        let removed = {
            let mut trackers = self.trackers.write();
            let Some(tracker) = trackers.get(match_id) else {
                debug!("stop_tracking for untracked match {}", match_id);
                return;
            };

            if tracker.remove_watcher(subscriber_id) == 0 {
                trackers.remove(match_id);
                true
            } else {
                false
            }
        };

        if removed {
            self.metrics.record_tracker_removed();
            self.metrics.set_tracked_matches(self.tracked_count());
            info!("Stopped tracking match {}: no watchers left", match_id);
        } else {
            debug!("Subscriber {} stopped watching match {}", subscriber_id, match_id);
        }
    }

    /// Point-in-time copy of the tracked matches
    pub fn snapshot_tracked_matches(&self) -> Vec<(MatchId, Arc<TrackedMatch>)> {
        self.trackers
            .read()
            .iter()
            .map(|(id, tracker)| (id.clone(), tracker.clone()))
            .collect()
    }

    /// Cloned views of every tracker, ordered by match id
    pub fn snapshots(&self) -> Vec<TrackerSnapshot> {
        let mut snapshots: Vec<_> = self
            .snapshot_tracked_matches()
            .into_iter()
            .map(|(_, tracker)| tracker.snapshot())
            .collect();
        snapshots.sort_by(|a, b| a.match_id.cmp(&b.match_id));
        snapshots
    }

    pub fn is_tracked(&self, match_id: &str) -> bool {
        self.trackers.read().contains_key(match_id)
    }

    pub fn tracked_count(&self) -> usize {
        self.trackers.read().len()
    }

    /// Current watchers of a match, empty when untracked
    pub fn watchers(&self, match_id: &str) -> Vec<SubscriberId> {
        self.tracker(match_id)
            .map(|tracker| tracker.watchers())
            .unwrap_or_default()
    }

    pub fn tracker(&self, match_id: &str) -> Option<Arc<TrackedMatch>> {
        self.trackers.read().get(match_id).cloned()
    }

    fn join_existing(&self, match_id: &str, subscriber_id: &str) -> bool {
        let trackers = self.trackers.read();
        match trackers.get(match_id) {
            Some(tracker) => {
                tracker.add_watcher(subscriber_id);
                true
            }
            None => false,
        }
    }

    fn finish(
        &self,
        match_id: &str,
        subscriber_id: &str,
        outcome: TrackingOutcome,
    ) -> Result<TrackingOutcome> {
        if outcome == TrackingOutcome::JoinedExisting {
            debug!("Subscriber {} joined tracked match {}", subscriber_id, match_id);
        }
        self.metrics.record_tracking_request(outcome.as_str());
        self.metrics.set_tracked_matches(self.tracked_count());
        Ok(outcome)
    }
}
