//! Concurrency tests for the registry and the update queues
//!
//! Many tasks hammer the same match or the same queue at once; the registry
//! must end up with exactly one tracker per watched match and enqueue must
//! never block.

mod fixtures;

use futures::future::join_all;
use matchwatch::metrics::MetricsCollector;
use matchwatch::queue::{EnqueueOutcome, UpdateQueue};
use matchwatch::registry::{MatchRegistry, TrackingOutcome};
use std::sync::Arc;
use std::time::Duration;

use fixtures::{seeded_source, two_player_game, SlowSource};

const SUBSCRIBERS: usize = 50;

fn slow_registry(delay: Duration) -> (Arc<MatchRegistry>, Arc<SlowSource>) {
    let inner = seeded_source();
    for i in 0..SUBSCRIBERS {
        inner.set_live_game(&format!("s{}", i), two_player_game("g1"));
    }
    let source = Arc::new(SlowSource::new(inner, delay));
    let registry = Arc::new(MatchRegistry::new(
        source.clone(),
        Arc::new(MetricsCollector::new().unwrap()),
    ));
    (registry, source)
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_start_tracking_creates_one_tracker() {
    let (registry, source) = slow_registry(Duration::from_millis(50));

    let tasks = (0..SUBSCRIBERS).map(|i| {
        let registry = registry.clone();
        tokio::spawn(async move { registry.start_tracking("g1", &format!("s{}", i)).await })
    });
    let outcomes: Vec<TrackingOutcome> = join_all(tasks)
        .await
        .into_iter()
        .map(|joined| joined.unwrap().unwrap())
        .collect();

    let created = outcomes
        .iter()
        .filter(|o| **o == TrackingOutcome::Created)
        .count();
    assert_eq!(created, 1);
    assert_eq!(registry.tracked_count(), 1);
    assert_eq!(registry.watchers("g1").len(), SUBSCRIBERS);
    // Callers that raced past the existence check each fetched once
    assert!(source.live_game_fetches() >= 1);
    assert!(source.live_game_fetches() <= SUBSCRIBERS);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_start_and_stop_leaves_registry_empty() {
    let (registry, _source) = slow_registry(Duration::from_millis(5));

    let tasks = (0..SUBSCRIBERS).map(|i| {
        let registry = registry.clone();
        tokio::spawn(async move {
            let subscriber = format!("s{}", i);
            let match_id = if i % 2 == 0 { "g1" } else { "g2" };
            for _ in 0..5 {
                registry.start_tracking(match_id, &subscriber).await.unwrap();
                tokio::task::yield_now().await;
                registry.stop_tracking(match_id, &subscriber);
            }
        })
    });
    for joined in join_all(tasks).await {
        joined.unwrap();
    }

    assert_eq!(registry.tracked_count(), 0);
    assert!(!registry.is_tracked("g1"));
    assert!(!registry.is_tracked("g2"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_watchers_survive_concurrent_departures() {
    let (registry, _source) = slow_registry(Duration::from_millis(1));

    for i in 0..SUBSCRIBERS {
        registry.start_tracking("g1", &format!("s{}", i)).await.unwrap();
    }

    // Everyone but s0 leaves at once
    let tasks = (1..SUBSCRIBERS).map(|i| {
        let registry = registry.clone();
        tokio::spawn(async move { registry.stop_tracking("g1", &format!("s{}", i)) })
    });
    for joined in join_all(tasks).await {
        joined.unwrap();
    }

    assert!(registry.is_tracked("g1"));
    assert_eq!(registry.watchers("g1"), vec!["s0".to_string()]);

    registry.stop_tracking("g1", "s0");
    assert!(!registry.is_tracked("g1"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_enqueue_never_blocks() {
    const CAPACITY: usize = 100;
    const PRODUCERS: usize = 20;
    const PER_PRODUCER: usize = 50;

    let queue = Arc::new(UpdateQueue::<usize>::new(
        "test",
        CAPACITY,
        Arc::new(MetricsCollector::new().unwrap()),
    ));
    // Keep the receiver alive but never drain it
    let _receiver = queue.take_receiver().unwrap();

    let tasks = (0..PRODUCERS).map(|p| {
        let queue = queue.clone();
        tokio::spawn(async move {
            (0..PER_PRODUCER)
                .map(|i| queue.try_enqueue(p * PER_PRODUCER + i))
                .collect::<Vec<_>>()
        })
    });

    let outcomes: Vec<EnqueueOutcome> =
        tokio::time::timeout(Duration::from_secs(5), join_all(tasks))
            .await
            .expect("enqueue blocked")
            .into_iter()
            .flat_map(|joined| joined.unwrap())
            .collect();

    let accepted = outcomes.iter().filter(|o| o.is_accepted()).count();
    let dropped = outcomes
        .iter()
        .filter(|o| **o == EnqueueOutcome::DroppedFull)
        .count();
    assert_eq!(accepted, CAPACITY);
    assert_eq!(dropped, PRODUCERS * PER_PRODUCER - CAPACITY);
    assert_eq!(queue.len(), CAPACITY);
    assert_eq!(queue.dropped() as usize, dropped);
}
