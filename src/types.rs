//! Common types used throughout the live tracking service

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// External game identifier of a live match
pub type MatchId = String;

/// Identity of a subscriber (a user observing updates)
pub type SubscriberId = String;

/// Live game as reported by the game-state source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LiveGameInfo {
    pub game_id: MatchId,
    /// Game start as unix milliseconds
    pub start_time_ms: i64,
    pub game_mode: String,
    pub participants: Vec<LiveGameParticipant>,
}

/// Participant entry of a live game, as reported by the source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LiveGameParticipant {
    pub summoner_name: String,
    pub summoner_id: SubscriberId,
    pub champion_name: String,
    pub champion_id: i64,
    pub team_id: i32,
    #[serde(default)]
    pub summoner_spells: Vec<i64>,
    #[serde(default)]
    pub runes: Vec<i64>,
}

/// Entry of a subscriber's match history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchSummary {
    pub match_id: MatchId,
}

/// Full detail of a finished match
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchDetail {
    pub match_id: MatchId,
    pub participants: Vec<MatchParticipantStats>,
}

/// End-of-game statistics for one participant
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MatchParticipantStats {
    pub summoner_id: SubscriberId,
    pub kills: u32,
    pub deaths: u32,
    pub assists: u32,
    pub total_minions_killed: u32,
    pub neutral_minions_killed: u32,
    pub vision_score: u32,
    pub total_damage_dealt_to_champions: u64,
    pub gold_earned: u64,
}

impl MatchParticipantStats {
    /// Kill/death/assist ratio for this game
    pub fn kda(&self) -> f64 {
        kda_ratio(self.kills, self.deaths, self.assists)
    }

    /// Total creep score (lane minions plus neutral monsters)
    pub fn creep_score(&self) -> u32 {
        self.total_minions_killed
            .saturating_add(self.neutral_minions_killed)
    }
}

/// Historical averages from the analytics collaborator
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlayerStats {
    pub average_kda: f64,
    pub average_cs: f64,
    pub average_vision_score: f64,
}

/// Transport-level connection statistics
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConnectionStats {
    pub active_connections: usize,
    pub total_connections: u64,
    pub messages_delivered: u64,
    pub messages_dropped: u64,
}

/// Live snapshot of one participant held by a tracker
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LiveParticipant {
    pub summoner_name: String,
    pub summoner_id: SubscriberId,
    pub champion_name: String,
    pub champion_id: i64,
    pub team: i32,
    pub position: String,
    pub level: u32,
    pub kills: u32,
    pub deaths: u32,
    pub assists: u32,
    pub cs: u32,
    pub gold: u32,
    pub items: Vec<i64>,
    pub runes: Vec<i64>,
    pub summoner_spells: Vec<i64>,
    pub kda: f64,
    pub last_update: DateTime<Utc>,
}

impl LiveParticipant {
    /// Seed a participant from the source's live-game entry
    pub fn from_live_game(participant: &LiveGameParticipant, now: DateTime<Utc>) -> Self {
        Self {
            summoner_name: participant.summoner_name.clone(),
            summoner_id: participant.summoner_id.clone(),
            champion_name: participant.champion_name.clone(),
            champion_id: participant.champion_id,
            team: participant.team_id,
            position: String::new(),
            level: 1,
            kills: 0,
            deaths: 0,
            assists: 0,
            cs: 0,
            gold: 0,
            items: Vec::new(),
            runes: participant.runes.clone(),
            summoner_spells: participant.summoner_spells.clone(),
            kda: 0.0,
            last_update: now,
        }
    }

    /// Recompute the derived KDA from the combat counters
    pub fn refresh_kda(&mut self) {
        self.kda = kda_ratio(self.kills, self.deaths, self.assists);
    }
}

/// (kills + assists) / deaths, or kills + assists for a deathless game
pub fn kda_ratio(kills: u32, deaths: u32, assists: u32) -> f64 {
    let takedowns = f64::from(kills) + f64::from(assists);
    if deaths > 0 {
        takedowns / f64::from(deaths)
    } else {
        takedowns
    }
}

/// Delivery priority of a match update
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UpdatePriority {
    Low,
    Medium,
    High,
}

/// Participant entry of a match update message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParticipantData {
    pub summoner_name: String,
    pub champion_name: String,
    pub level: u32,
    pub kills: u32,
    pub deaths: u32,
    pub assists: u32,
    pub cs: u32,
    pub gold: u32,
    pub items: Vec<i64>,
    pub kda: f64,
}

impl From<&LiveParticipant> for ParticipantData {
    fn from(participant: &LiveParticipant) -> Self {
        Self {
            summoner_name: participant.summoner_name.clone(),
            champion_name: participant.champion_name.clone(),
            level: participant.level,
            kills: participant.kills,
            deaths: participant.deaths,
            assists: participant.assists,
            cs: participant.cs,
            gold: participant.gold,
            items: participant.items.clone(),
            kda: participant.kda,
        }
    }
}

/// Data record of a `match_update` message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchUpdateData {
    pub game_id: MatchId,
    pub status: String,
    /// Elapsed game time in whole minutes
    pub game_time: i64,
    pub participants: Vec<ParticipantData>,
}

/// Data record of a `performance_update` message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceUpdateData {
    pub user_id: SubscriberId,
    pub current_kda: f64,
    pub average_kda: f64,
    pub cs_per_minute: f64,
    pub vision_score: f64,
    pub damage_share: f64,
    pub gold_efficiency: f64,
    #[serde(rename = "improvement_suggestion")]
    pub improvement: String,
}

/// Promotion series progress
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedSeries {
    pub target: String,
    pub wins: u32,
    pub losses: u32,
    pub progress: String,
}

/// Data record of a `rank_update` message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankUpdateData {
    pub old_rank: String,
    pub new_rank: String,
    #[serde(rename = "lp")]
    pub league_points: i32,
    pub series: Option<RankedSeries>,
}

/// Queue item: a refreshed match state for one recipient
#[derive(Debug, Clone)]
pub struct MatchUpdate {
    pub match_id: MatchId,
    /// Targeted subscriber, if the update is user-specific
    pub subscriber_id: Option<SubscriberId>,
    pub data: MatchUpdateData,
    pub priority: UpdatePriority,
}

/// Queue item: a performance summary for one subscriber
#[derive(Debug, Clone)]
pub struct PerformanceUpdate {
    pub subscriber_id: SubscriberId,
    pub data: PerformanceUpdateData,
}

/// Queue item: a rank change for one subscriber
#[derive(Debug, Clone)]
pub struct RankUpdate {
    pub subscriber_id: SubscriberId,
    pub old_rank: String,
    pub new_rank: String,
    pub league_points: i32,
    pub series: Option<RankedSeries>,
}

/// Type-specific message body, tagged for clients
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum MessageBody {
    MatchUpdate(MatchUpdateData),
    PerformanceUpdate(PerformanceUpdateData),
    RankUpdate(RankUpdateData),
}

impl MessageBody {
    /// The type tag clients see
    pub fn type_tag(&self) -> &'static str {
        match self {
            MessageBody::MatchUpdate(_) => "match_update",
            MessageBody::PerformanceUpdate(_) => "performance_update",
            MessageBody::RankUpdate(_) => "rank_update",
        }
    }
}

/// Message handed to the transport
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<SubscriberId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub match_id: Option<MatchId>,
    #[serde(flatten)]
    pub body: MessageBody,
    pub timestamp: DateTime<Utc>,
}

impl Message {
    pub fn new(user_id: Option<SubscriberId>, match_id: Option<MatchId>, body: MessageBody) -> Self {
        Self {
            id: crate::utils::generate_message_id(),
            user_id,
            match_id,
            body,
            timestamp: crate::utils::current_timestamp(),
        }
    }

    pub fn type_tag(&self) -> &'static str {
        self.body.type_tag()
    }
}

impl From<&MatchUpdate> for Message {
    fn from(update: &MatchUpdate) -> Self {
        Message::new(
            update.subscriber_id.clone(),
            Some(update.data.game_id.clone()),
            MessageBody::MatchUpdate(update.data.clone()),
        )
    }
}

impl From<&PerformanceUpdate> for Message {
    fn from(update: &PerformanceUpdate) -> Self {
        Message::new(
            Some(update.subscriber_id.clone()),
            None,
            MessageBody::PerformanceUpdate(update.data.clone()),
        )
    }
}

impl From<&RankUpdate> for Message {
    fn from(update: &RankUpdate) -> Self {
        Message::new(
            Some(update.subscriber_id.clone()),
            None,
            MessageBody::RankUpdate(RankUpdateData {
                old_rank: update.old_rank.clone(),
                new_rank: update.new_rank.clone(),
                league_points: update.league_points,
                series: update.series.clone(),
            }),
        )
    }
}
