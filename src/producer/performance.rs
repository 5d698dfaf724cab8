//! On-demand performance summaries
//!
//! Averages a subscriber's recent games, compares them with the historical
//! averages from the analytics collaborator and picks one improvement
//! suggestion.

use crate::error::{LiveTrackingError, Result};
use crate::source::{AnalyticsSource, GameStateSource};
use crate::types::{MatchParticipantStats, PerformanceUpdate, PerformanceUpdateData, PlayerStats};
use std::sync::Arc;
use tracing::{debug, warn};

/// Assumed game length, in minutes, for per-minute figures
pub const ASSUMED_GAME_MINUTES: f64 = 30.0;

/// Rough damage of the rest of the team, used for the damage share estimate
pub const TEAM_DAMAGE_ESTIMATE: f64 = 40_000.0;

/// Gold earned by a reference game, used for the gold efficiency estimate
pub const REFERENCE_GOLD: f64 = 15_000.0;

/// A stat counts as a deficit below this fraction of its historical average
pub const DEFICIT_THRESHOLD: f64 = 0.9;

/// Coaching tip attached to a performance update
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImprovementSuggestion {
    Positioning,
    Farming,
    Vision,
    KeepItUp,
}

impl ImprovementSuggestion {
    /// Pick the highest-priority deficit: KDA, then CS, then vision
    pub fn for_session(averages: &SessionAverages, historical: &PlayerStats) -> Self {
        let below = |current: f64, average: f64| current < average * DEFICIT_THRESHOLD;

        if below(averages.kda, historical.average_kda) {
            ImprovementSuggestion::Positioning
        } else if below(averages.cs, historical.average_cs) {
            ImprovementSuggestion::Farming
        } else if below(averages.vision_score, historical.average_vision_score) {
            ImprovementSuggestion::Vision
        } else {
            ImprovementSuggestion::KeepItUp
        }
    }

    pub fn message(self) -> &'static str {
        match self {
            ImprovementSuggestion::Positioning => "Focus on positioning and avoid risky trades",
            ImprovementSuggestion::Farming => "Practice last-hitting minions and farming efficiency",
            ImprovementSuggestion::Vision => "Place more wards and buy control wards",
            ImprovementSuggestion::KeepItUp => "Great performance! Keep up the consistency",
        }
    }
}

/// Per-game averages over the games where the subscriber was found
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionAverages {
    pub games: usize,
    pub kda: f64,
    pub cs: f64,
    pub vision_score: f64,
    pub damage: f64,
    pub gold: f64,
}

impl SessionAverages {
    /// Average the given games. Returns None for an empty slice.
    pub fn from_games(games: &[MatchParticipantStats]) -> Option<Self> {
        if games.is_empty() {
            return None;
        }

        let count = games.len() as f64;
        let sum = |f: fn(&MatchParticipantStats) -> f64| games.iter().map(f).sum::<f64>() / count;

        Some(Self {
            games: games.len(),
            kda: sum(|g| g.kda()),
            cs: sum(|g| f64::from(g.creep_score())),
            vision_score: sum(|g| f64::from(g.vision_score)),
            damage: sum(|g| g.total_damage_dealt_to_champions as f64),
            gold: sum(|g| g.gold_earned as f64),
        })
    }

    /// Build the client-facing record against historical stats
    pub fn to_update_data(&self, subscriber_id: &str, historical: &PlayerStats) -> PerformanceUpdateData {
        PerformanceUpdateData {
            user_id: subscriber_id.to_string(),
            current_kda: self.kda,
            average_kda: historical.average_kda,
            cs_per_minute: self.cs / ASSUMED_GAME_MINUTES,
            vision_score: self.vision_score,
            damage_share: self.damage / (self.damage + TEAM_DAMAGE_ESTIMATE) * 100.0,
            gold_efficiency: self.gold / REFERENCE_GOLD * 100.0,
            improvement: ImprovementSuggestion::for_session(self, historical)
                .message()
                .to_string(),
        }
    }
}

/// Builds performance updates from recent history and analytics
pub struct PerformanceProducer {
    source: Arc<dyn GameStateSource>,
    analytics: Arc<dyn AnalyticsSource>,
    history_count: usize,
    window_days: u32,
}

impl PerformanceProducer {
    pub fn new(
        source: Arc<dyn GameStateSource>,
        analytics: Arc<dyn AnalyticsSource>,
        history_count: usize,
        window_days: u32,
    ) -> Self {
        Self {
            source,
            analytics,
            history_count,
            window_days,
        }
    }

    /// Compute the performance update for a subscriber
    ///
    /// Returns `Ok(None)` when none of the recent games carries data for the
    /// subscriber. History failures map to `SourceUnavailable`, analytics
    /// failures to `AnalyticsUnavailable`; a failing match detail only skips
    /// that match.
    pub async fn build_update(&self, subscriber_id: &str) -> Result<Option<PerformanceUpdate>> {
        let history = self
            .source
            .fetch_match_history(subscriber_id, self.history_count)
            .await
            .map_err(|e| LiveTrackingError::SourceUnavailable {
                message: format!("match history for {}: {}", subscriber_id, e),
            })?;

        let mut games = Vec::with_capacity(history.len());
        for summary in &history {
            let detail = match self.source.fetch_match_detail(&summary.match_id).await {
                Ok(detail) => detail,
                Err(e) => {
                    debug!("Skipping match {} for {}: {}", summary.match_id, subscriber_id, e);
                    continue;
                }
            };

            if let Some(stats) = detail
                .participants
                .into_iter()
                .find(|p| p.summoner_id == subscriber_id)
            {
                games.push(stats);
            }
        }

        let Some(averages) = SessionAverages::from_games(&games) else {
            debug!("No recent game data for {}, skipping performance update", subscriber_id);
            return Ok(None);
        };

        let historical = self
            .analytics
            .player_stats(subscriber_id, self.window_days)
            .await
            .map_err(|e| {
                warn!("Failed to get historical stats for {}: {}", subscriber_id, e);
                LiveTrackingError::AnalyticsUnavailable {
                    message: format!("player stats for {}: {}", subscriber_id, e),
                }
            })?;

        Ok(Some(PerformanceUpdate {
            subscriber_id: subscriber_id.to_string(),
            data: averages.to_update_data(subscriber_id, &historical),
        }))
    }
}
