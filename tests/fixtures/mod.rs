//! Test fixtures and stub collaborators for integration testing
#![allow(dead_code)]

use async_trait::async_trait;
use matchwatch::config::AppConfig;
use matchwatch::error::Result;
use matchwatch::service::LiveMatchService;
use matchwatch::source::{GameStateSource, InMemoryGameSource};
use matchwatch::transport::Transport;
use matchwatch::types::{
    ConnectionStats, LiveGameInfo, LiveGameParticipant, MatchDetail, MatchParticipantStats,
    MatchSummary, Message, PlayerStats,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// A live game with one participant per team
pub fn two_player_game(game_id: &str) -> LiveGameInfo {
    LiveGameInfo {
        game_id: game_id.to_string(),
        start_time_ms: chrono::Utc::now().timestamp_millis() - 10 * 60 * 1000,
        game_mode: "CLASSIC".to_string(),
        participants: vec![
            LiveGameParticipant {
                summoner_name: "BlueSide".to_string(),
                summoner_id: "u1".to_string(),
                champion_name: "Ahri".to_string(),
                champion_id: 103,
                team_id: 100,
                summoner_spells: vec![4, 14],
                runes: vec![8112],
            },
            LiveGameParticipant {
                summoner_name: "RedSide".to_string(),
                summoner_id: "u9".to_string(),
                champion_name: "Zed".to_string(),
                champion_id: 238,
                team_id: 200,
                summoner_spells: vec![4, 12],
                runes: vec![8010],
            },
        ],
    }
}

/// End-of-game stats for one subscriber
pub fn game_stats(summoner_id: &str, kills: u32, deaths: u32, assists: u32) -> MatchParticipantStats {
    MatchParticipantStats {
        summoner_id: summoner_id.to_string(),
        kills,
        deaths,
        assists,
        total_minions_killed: 160,
        neutral_minions_killed: 20,
        vision_score: 25,
        total_damage_dealt_to_champions: 24_000,
        gold_earned: 11_500,
    }
}

/// Source where u1, u2 and u3 are all in game "g1" and u1 has three finished games
pub fn seeded_source() -> Arc<InMemoryGameSource> {
    let source = Arc::new(InMemoryGameSource::new());
    for user in ["u1", "u2", "u3"] {
        source.set_live_game(user, two_player_game("g1"));
    }
    for (i, (k, d, a)) in [(5, 2, 7), (2, 4, 3), (8, 1, 6)].into_iter().enumerate() {
        source.add_match(
            "u1",
            MatchDetail {
                match_id: format!("m{}", i + 1),
                participants: vec![game_stats("u1", k, d, a), game_stats("u9", 1, 5, 1)],
            },
        );
    }
    source.set_player_stats(
        "u1",
        PlayerStats {
            average_kda: 2.5,
            average_cs: 170.0,
            average_vision_score: 22.0,
        },
    );
    source
}

/// Configuration with short intervals for tests
pub fn fast_config() -> AppConfig {
    let mut config = AppConfig::default();
    config.tracking.poll_interval_seconds = 1;
    config.tracking.summary_interval_seconds = 1;
    config.service.shutdown_timeout_seconds = 5;
    config
}

/// Service wired to the given collaborators
pub fn build_service(
    config: AppConfig,
    source: Arc<InMemoryGameSource>,
    transport: Arc<dyn Transport>,
) -> Arc<LiveMatchService> {
    Arc::new(
        LiveMatchService::new(config, source.clone(), source, transport)
            .expect("Failed to build service"),
    )
}

/// Where a recorded message was sent
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublishTarget {
    User(String),
    Match(String),
}

/// Transport that records every published message
#[derive(Debug, Default)]
pub struct RecordingTransport {
    published: Mutex<Vec<(PublishTarget, Message)>>,
    stats_requests: AtomicUsize,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn published(&self) -> Vec<(PublishTarget, Message)> {
        self.published
            .lock()
            .map(|published| published.clone())
            .unwrap_or_default()
    }

    /// Number of `connection_stats` samples taken so far
    pub fn stats_requests(&self) -> usize {
        self.stats_requests.load(Ordering::SeqCst)
    }

    pub fn count_of_type(&self, type_tag: &str) -> usize {
        self.published()
            .iter()
            .filter(|(_, message)| message.type_tag() == type_tag)
            .count()
    }

    /// Poll until at least `count` messages were recorded or the timeout elapses
    pub async fn wait_for(&self, count: usize, timeout: Duration) -> bool {
        let deadline = tokio::time::Instant::now() + timeout;
        while tokio::time::Instant::now() < deadline {
            if self.published().len() >= count {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        self.published().len() >= count
    }

    fn record(&self, target: PublishTarget, message: &Message) {
        if let Ok(mut published) = self.published.lock() {
            published.push((target, message.clone()));
        }
    }
}

#[async_trait]
impl Transport for RecordingTransport {
    async fn publish_to_user(&self, subscriber_id: &str, message: &Message) -> Result<()> {
        self.record(PublishTarget::User(subscriber_id.to_string()), message);
        Ok(())
    }

    async fn publish_to_match_watchers(&self, match_id: &str, message: &Message) -> Result<()> {
        self.record(PublishTarget::Match(match_id.to_string()), message);
        Ok(())
    }

    async fn connection_stats(&self) -> ConnectionStats {
        self.stats_requests.fetch_add(1, Ordering::SeqCst);
        ConnectionStats {
            active_connections: 3,
            ..ConnectionStats::default()
        }
    }
}

/// Source that delays live-game lookups so concurrent callers overlap
pub struct SlowSource {
    inner: Arc<InMemoryGameSource>,
    delay: Duration,
    live_game_fetches: AtomicUsize,
}

impl SlowSource {
    pub fn new(inner: Arc<InMemoryGameSource>, delay: Duration) -> Self {
        Self {
            inner,
            delay,
            live_game_fetches: AtomicUsize::new(0),
        }
    }

    pub fn live_game_fetches(&self) -> usize {
        self.live_game_fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl GameStateSource for SlowSource {
    async fn fetch_live_game(&self, subscriber_id: &str) -> Result<LiveGameInfo> {
        self.live_game_fetches.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        self.inner.fetch_live_game(subscriber_id).await
    }

    async fn fetch_match_history(&self, subscriber_id: &str, count: usize) -> Result<Vec<MatchSummary>> {
        self.inner.fetch_match_history(subscriber_id, count).await
    }

    async fn fetch_match_detail(&self, match_id: &str) -> Result<MatchDetail> {
        self.inner.fetch_match_detail(match_id).await
    }
}
