//! Dispatch workers
//!
//! One worker per update queue. Each worker waits for the next item or the
//! cancellation token, converts the item to a [`Message`] and hands it to the
//! transport. Publish failures are logged and counted; they never stop the
//! worker. Items still buffered when the token fires are discarded.

use crate::metrics::MetricsCollector;
use crate::queue::{MATCH_QUEUE, PERFORMANCE_QUEUE, RANK_QUEUE};
use crate::transport::Transport;
use crate::types::{MatchUpdate, Message, PerformanceUpdate, RankUpdate};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

/// Publish target labels used for metrics
pub const TARGET_USER: &str = "user";
pub const TARGET_MATCH: &str = "match";

/// Shared context of the dispatch workers
#[derive(Clone)]
pub struct Dispatcher {
    transport: Arc<dyn Transport>,
    metrics: Arc<MetricsCollector>,
}

impl Dispatcher {
    pub fn new(transport: Arc<dyn Transport>, metrics: Arc<MetricsCollector>) -> Self {
        Self { transport, metrics }
    }

    /// Publish one match update to its targeted subscriber and to the match watchers
    ///
    /// Both deliveries happen; a client that is the target and also watches the
    /// match receives the message twice.
    pub async fn dispatch_match(&self, update: &MatchUpdate, depth: usize) {
        let message = Message::from(update);

        if let Some(subscriber_id) = &update.subscriber_id {
            self.publish_user(MATCH_QUEUE, subscriber_id, &message, depth)
                .await;
        }

        let result = self
            .transport
            .publish_to_match_watchers(&update.match_id, &message)
            .await;
        if let Err(e) = &result {
            error!(
                "Failed to publish match update for {} to watchers: {}",
                update.match_id, e
            );
        }
        self.metrics
            .record_published(MATCH_QUEUE, TARGET_MATCH, result.is_ok(), depth);
    }

    pub async fn dispatch_performance(&self, update: &PerformanceUpdate, depth: usize) {
        let message = Message::from(update);
        self.publish_user(PERFORMANCE_QUEUE, &update.subscriber_id, &message, depth)
            .await;
    }

    pub async fn dispatch_rank(&self, update: &RankUpdate, depth: usize) {
        let message = Message::from(update);
        self.publish_user(RANK_QUEUE, &update.subscriber_id, &message, depth)
            .await;
    }

    async fn publish_user(&self, queue: &str, subscriber_id: &str, message: &Message, depth: usize) {
        let result = self.transport.publish_to_user(subscriber_id, message).await;
        match &result {
            Ok(()) => debug!(
                "Published {} {} to {}",
                message.type_tag(),
                message.id,
                subscriber_id
            ),
            Err(e) => error!(
                "Failed to publish {} to {}: {}",
                message.type_tag(),
                subscriber_id,
                e
            ),
        }
        self.metrics
            .record_published(queue, TARGET_USER, result.is_ok(), depth);
    }
}

/// Drain the match queue until cancelled
pub async fn run_match_worker(
    dispatcher: Dispatcher,
    mut receiver: mpsc::Receiver<MatchUpdate>,
    cancel: CancellationToken,
) {
    info!("Match dispatch worker started");
    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            item = receiver.recv() => match item {
                Some(update) => dispatcher.dispatch_match(&update, receiver.len()).await,
                None => break,
            },
        }
    }
    info!("Match dispatch worker stopped");
}

/// Drain the performance queue until cancelled
pub async fn run_performance_worker(
    dispatcher: Dispatcher,
    mut receiver: mpsc::Receiver<PerformanceUpdate>,
    cancel: CancellationToken,
) {
    info!("Performance dispatch worker started");
    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            item = receiver.recv() => match item {
                Some(update) => dispatcher.dispatch_performance(&update, receiver.len()).await,
                None => break,
            },
        }
    }
    info!("Performance dispatch worker stopped");
}

/// Drain the rank queue until cancelled
pub async fn run_rank_worker(
    dispatcher: Dispatcher,
    mut receiver: mpsc::Receiver<RankUpdate>,
    cancel: CancellationToken,
) {
    info!("Rank dispatch worker started");
    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            item = receiver.recv() => match item {
                Some(update) => dispatcher.dispatch_rank(&update, receiver.len()).await,
                None => break,
            },
        }
    }
    info!("Rank dispatch worker stopped");
}
