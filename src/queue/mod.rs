//! Bounded, lossy update queues
//!
//! Each queue is a fixed-capacity FIFO with a non-blocking enqueue: when the
//! queue is full the item is dropped (last-value-wins, the next poll supersedes
//! it). Queues are never closed by the service; dispatch workers stop on the
//! cancellation token instead, so a producer racing with shutdown can only ever
//! observe a drop, never a panic.

use crate::config::TrackingSettings;
use crate::metrics::MetricsCollector;
use crate::types::{MatchUpdate, PerformanceUpdate, RankUpdate};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, warn};

pub const MATCH_QUEUE: &str = "match";
pub const PERFORMANCE_QUEUE: &str = "performance";
pub const RANK_QUEUE: &str = "rank";

/// Result of a non-blocking enqueue
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnqueueOutcome {
    Accepted,
    /// Queue was at capacity
    DroppedFull,
    /// Consumer side is gone (service stopped)
    DroppedClosed,
}

impl EnqueueOutcome {
    pub fn is_accepted(self) -> bool {
        self == EnqueueOutcome::Accepted
    }
}

/// A single bounded FIFO with drop-on-full semantics
pub struct UpdateQueue<T> {
    name: &'static str,
    capacity: usize,
    sender: mpsc::Sender<T>,
    receiver: Mutex<Option<mpsc::Receiver<T>>>,
    dropped: AtomicU64,
    metrics: Arc<MetricsCollector>,
}

impl<T> UpdateQueue<T> {
    /// Create a queue. `capacity` must be non-zero (enforced by config validation).
    pub fn new(name: &'static str, capacity: usize, metrics: Arc<MetricsCollector>) -> Self {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        Self {
            name,
            capacity: capacity.max(1),
            sender,
            receiver: Mutex::new(Some(receiver)),
            dropped: AtomicU64::new(0),
            metrics,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Items currently buffered
    pub fn len(&self) -> usize {
        self.capacity - self.sender.capacity()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Items dropped since creation
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Enqueue without blocking, dropping the item if the queue is full
    pub fn try_enqueue(&self, item: T) -> EnqueueOutcome {
        match self.sender.try_send(item) {
            Ok(()) => {
                self.metrics.record_enqueued(self.name, self.len());
                EnqueueOutcome::Accepted
            }
            Err(TrySendError::Full(_)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                self.metrics.record_dropped(self.name);
                warn!(
                    "{} update queue full ({} items), dropping update",
                    self.name, self.capacity
                );
                EnqueueOutcome::DroppedFull
            }
            Err(TrySendError::Closed(_)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                self.metrics.record_dropped(self.name);
                debug!("{} update queue has no consumer, dropping update", self.name);
                EnqueueOutcome::DroppedClosed
            }
        }
    }

    /// Hand the consumer side to a dispatch worker. Returns None once taken.
    pub fn take_receiver(&self) -> Option<mpsc::Receiver<T>> {
        self.receiver.lock().take()
    }
}

/// The three update queues of the service
pub struct UpdateQueues {
    pub matches: UpdateQueue<MatchUpdate>,
    pub performance: UpdateQueue<PerformanceUpdate>,
    pub ranks: UpdateQueue<RankUpdate>,
}

impl UpdateQueues {
    pub fn new(settings: &TrackingSettings, metrics: Arc<MetricsCollector>) -> Self {
        Self {
            matches: UpdateQueue::new(MATCH_QUEUE, settings.match_queue_capacity, metrics.clone()),
            performance: UpdateQueue::new(
                PERFORMANCE_QUEUE,
                settings.performance_queue_capacity,
                metrics.clone(),
            ),
            ranks: UpdateQueue::new(RANK_QUEUE, settings.rank_queue_capacity, metrics),
        }
    }

    /// Depth, capacity and drop count of each queue, in (match, performance, rank) order
    pub fn stats(&self) -> Vec<QueueStats> {
        vec![
            QueueStats::of(&self.matches),
            QueueStats::of(&self.performance),
            QueueStats::of(&self.ranks),
        ]
    }
}

/// Point-in-time view of one queue
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct QueueStats {
    pub name: &'static str,
    pub depth: usize,
    pub capacity: usize,
    pub dropped: u64,
}

impl QueueStats {
    fn of<T>(queue: &UpdateQueue<T>) -> Self {
        Self {
            name: queue.name(),
            depth: queue.len(),
            capacity: queue.capacity(),
            dropped: queue.dropped(),
        }
    }

    /// Fill ratio between 0.0 and 1.0
    pub fn utilization(&self) -> f64 {
        self.depth as f64 / self.capacity as f64
    }
}
