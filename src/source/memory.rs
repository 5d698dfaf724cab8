//! In-memory game-state source
//!
//! Serves live games, histories, match details and historical stats from
//! tables that can be seeded programmatically or loaded from a JSON fixture
//! file. Subscribers and matches can be marked as failing to exercise the
//! error paths of the tracking core.

use crate::error::Result;
use crate::source::{AnalyticsSource, GameStateSource};
use crate::types::{LiveGameInfo, MatchDetail, MatchSummary, PlayerStats};
use anyhow::{anyhow, Context};
use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::Path;

/// Serializable seed data for the in-memory source
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceFixtures {
    /// Live game per subscriber
    pub live_games: HashMap<String, LiveGameInfo>,
    /// Match ids per subscriber, newest first
    pub histories: HashMap<String, Vec<String>>,
    /// Match detail per match id
    pub match_details: HashMap<String, MatchDetail>,
    /// Historical stats per subscriber
    pub player_stats: HashMap<String, PlayerStats>,
}

/// In-memory implementation of both source traits
#[derive(Debug, Default)]
pub struct InMemoryGameSource {
    tables: RwLock<SourceFixtures>,
    failing_subscribers: RwLock<HashSet<String>>,
    failing_matches: RwLock<HashSet<String>>,
}

impl InMemoryGameSource {
    /// Create an empty source
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a source from fixture tables
    pub fn from_fixtures(fixtures: SourceFixtures) -> Self {
        Self {
            tables: RwLock::new(fixtures),
            ..Self::default()
        }
    }

    /// Load fixture tables from a JSON file
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read fixtures {}", path.display()))?;
        let fixtures: SourceFixtures = serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse fixtures {}", path.display()))?;
        Ok(Self::from_fixtures(fixtures))
    }

    /// Set the live game reported for a subscriber
    pub fn set_live_game(&self, subscriber_id: &str, game: LiveGameInfo) {
        self.tables
            .write()
            .live_games
            .insert(subscriber_id.to_string(), game);
    }

    /// Append a finished match to a subscriber's history and store its detail
    pub fn add_match(&self, subscriber_id: &str, detail: MatchDetail) {
        let mut tables = self.tables.write();
        tables
            .histories
            .entry(subscriber_id.to_string())
            .or_default()
            .insert(0, detail.match_id.clone());
        tables.match_details.insert(detail.match_id.clone(), detail);
    }

    /// Record a match in a subscriber's history without any detail behind it
    pub fn add_history_entry(&self, subscriber_id: &str, match_id: &str) {
        self.tables
            .write()
            .histories
            .entry(subscriber_id.to_string())
            .or_default()
            .insert(0, match_id.to_string());
    }

    /// Set historical stats for a subscriber
    pub fn set_player_stats(&self, subscriber_id: &str, stats: PlayerStats) {
        self.tables
            .write()
            .player_stats
            .insert(subscriber_id.to_string(), stats);
    }

    /// Make every lookup for this subscriber fail until cleared
    pub fn fail_subscriber(&self, subscriber_id: &str) {
        self.failing_subscribers
            .write()
            .insert(subscriber_id.to_string());
    }

    /// Make detail lookups for this match fail until cleared
    pub fn fail_match(&self, match_id: &str) {
        self.failing_matches.write().insert(match_id.to_string());
    }

    /// Clear all injected failures
    pub fn clear_failures(&self) {
        self.failing_subscribers.write().clear();
        self.failing_matches.write().clear();
    }

    fn check_subscriber(&self, subscriber_id: &str) -> Result<()> {
        if self.failing_subscribers.read().contains(subscriber_id) {
            return Err(anyhow!("source failure injected for {}", subscriber_id));
        }
        Ok(())
    }
}

#[async_trait]
impl GameStateSource for InMemoryGameSource {
    async fn fetch_live_game(&self, subscriber_id: &str) -> Result<LiveGameInfo> {
        self.check_subscriber(subscriber_id)?;
        self.tables
            .read()
            .live_games
            .get(subscriber_id)
            .cloned()
            .ok_or_else(|| anyhow!("no live game for {}", subscriber_id))
    }

    async fn fetch_match_history(
        &self,
        subscriber_id: &str,
        count: usize,
    ) -> Result<Vec<MatchSummary>> {
        self.check_subscriber(subscriber_id)?;
        let tables = self.tables.read();
        Ok(tables
            .histories
            .get(subscriber_id)
            .map(|ids| {
                ids.iter()
                    .take(count)
                    .map(|match_id| MatchSummary {
                        match_id: match_id.clone(),
                    })
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn fetch_match_detail(&self, match_id: &str) -> Result<MatchDetail> {
        if self.failing_matches.read().contains(match_id) {
            return Err(anyhow!("source failure injected for match {}", match_id));
        }
        self.tables
            .read()
            .match_details
            .get(match_id)
            .cloned()
            .ok_or_else(|| anyhow!("match {} not found", match_id))
    }
}

#[async_trait]
impl AnalyticsSource for InMemoryGameSource {
    async fn player_stats(&self, subscriber_id: &str, _window_days: u32) -> Result<PlayerStats> {
        self.check_subscriber(subscriber_id)?;
        Ok(self
            .tables
            .read()
            .player_stats
            .get(subscriber_id)
            .cloned()
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::MatchParticipantStats;

    fn detail(match_id: &str) -> MatchDetail {
        MatchDetail {
            match_id: match_id.to_string(),
            participants: vec![MatchParticipantStats {
                summoner_id: "u1".to_string(),
                kills: 3,
                ..Default::default()
            }],
        }
    }

    #[tokio::test]
    async fn test_history_newest_first_and_bounded() {
        let source = InMemoryGameSource::new();
        for i in 0..7 {
            source.add_match("u1", detail(&format!("m{}", i)));
        }

        let history = source.fetch_match_history("u1", 5).await.unwrap();
        assert_eq!(history.len(), 5);
        assert_eq!(history[0].match_id, "m6");
        assert_eq!(history[4].match_id, "m2");

        assert!(source.fetch_match_history("nobody", 5).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_missing_live_game_is_an_error() {
        let source = InMemoryGameSource::new();
        assert!(source.fetch_live_game("u1").await.is_err());
    }

    #[tokio::test]
    async fn test_injected_failures() {
        let source = InMemoryGameSource::new();
        source.add_match("u1", detail("m1"));
        source.fail_subscriber("u1");
        source.fail_match("m1");

        assert!(source.fetch_match_history("u1", 5).await.is_err());
        assert!(source.fetch_match_detail("m1").await.is_err());
        assert!(source.player_stats("u1", 30).await.is_err());

        source.clear_failures();
        assert!(source.fetch_match_detail("m1").await.is_ok());
    }

    #[test]
    fn test_fixtures_parse_from_json() {
        let json = r#"{
            "live_games": {
                "u1": {
                    "game_id": "g1",
                    "start_time_ms": 1700000000000,
                    "game_mode": "CLASSIC",
                    "participants": [
                        {"summoner_name": "A", "summoner_id": "u1", "champion_name": "Ahri",
                         "champion_id": 103, "team_id": 100}
                    ]
                }
            },
            "player_stats": {
                "u1": {"average_kda": 2.5, "average_cs": 160.0, "average_vision_score": 20.0}
            }
        }"#;

        let fixtures: SourceFixtures = serde_json::from_str(json).unwrap();
        assert_eq!(fixtures.live_games["u1"].participants.len(), 1);
        assert!(fixtures.histories.is_empty());
        assert_eq!(fixtures.player_stats["u1"].average_kda, 2.5);
    }
}
