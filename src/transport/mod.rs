//! Outbound publish/subscribe transport
//!
//! Dispatch workers hand finished messages to a [`Transport`]. The in-process
//! [`LocalHub`] keeps per-connection bounded buffers and user/match
//! subscriptions; a networked gateway would implement the same trait.

pub mod hub;

use crate::error::Result;
use crate::types::{ConnectionStats, Message};
use async_trait::async_trait;

pub use hub::{ClientConnection, ConnectionId, LocalHub};

/// Trait for delivering messages to connected clients
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Transport: Send + Sync {
    /// Deliver to every connection of one subscriber
    async fn publish_to_user(&self, subscriber_id: &str, message: &Message) -> Result<()>;

    /// Deliver to every connection watching a match
    async fn publish_to_match_watchers(&self, match_id: &str, message: &Message) -> Result<()>;

    /// Current connection statistics
    async fn connection_stats(&self) -> ConnectionStats;
}
