//! Integration tests for the matchwatch live tracking service
//!
//! These tests run the whole pipeline: registry operations, the polling and
//! performance producers, the bounded queues, the dispatch workers and the
//! in-process hub.

mod fixtures;

use chrono::Utc;
use matchwatch::config::AppConfig;
use matchwatch::error::LiveTrackingError;
use matchwatch::queue::EnqueueOutcome;
use matchwatch::registry::TrackingOutcome;
use matchwatch::service::{LifecycleState, PerformanceOutcome, WORKER_COUNT};
use matchwatch::transport::LocalHub;
use matchwatch::types::{MessageBody, RankedSeries};
use std::sync::Arc;
use std::time::Duration;

use fixtures::{build_service, fast_config, seeded_source, PublishTarget, RecordingTransport};

const RECV_TIMEOUT: Duration = Duration::from_secs(2);

#[tokio::test]
async fn test_track_poll_and_untrack_single_match() {
    let service = build_service(
        fast_config(),
        seeded_source(),
        Arc::new(RecordingTransport::new()),
    );
    let registry = service.registry();

    // Step 1: u1 starts tracking g1
    let outcome = service.start_tracking("g1", "u1").await.unwrap();
    assert_eq!(outcome, TrackingOutcome::Created);
    assert_eq!(registry.watchers("g1"), vec!["u1".to_string()]);

    let snapshot = registry.tracker("g1").unwrap().snapshot();
    assert_eq!(snapshot.participants.len(), 2);
    assert_eq!(snapshot.update_count, 0);

    // Step 2: one poll cycle once the tracker is stale
    let report = service
        .polling()
        .run_cycle_at(Utc::now() + chrono::Duration::seconds(16))
        .await;
    assert_eq!(report.refreshed, 1);
    assert_eq!(report.enqueued, 1);
    assert_eq!(registry.tracker("g1").unwrap().update_count(), 1);
    assert_eq!(service.queues().matches.len(), 1);

    // Step 3: the last watcher leaves
    service.stop_tracking("g1", "u1");
    assert!(!registry.is_tracked("g1"));
}

#[tokio::test]
async fn test_performance_request_without_history_is_noop() {
    let service = build_service(
        fast_config(),
        seeded_source(),
        Arc::new(RecordingTransport::new()),
    );

    let outcome = service.request_performance_update("u2").await.unwrap();

    assert_eq!(outcome, PerformanceOutcome::NoData);
    assert!(service.queues().performance.is_empty());
}

#[tokio::test]
async fn test_source_failure_surfaces_to_caller() {
    let source = seeded_source();
    source.fail_subscriber("u3");
    let service = build_service(fast_config(), source, Arc::new(RecordingTransport::new()));

    let err = service.start_tracking("g1", "u3").await.unwrap_err();
    assert!(matches!(
        err.downcast_ref::<LiveTrackingError>(),
        Some(LiveTrackingError::SourceUnavailable { .. })
    ));
    assert!(!service.registry().is_tracked("g1"));

    let err = service.request_performance_update("u3").await.unwrap_err();
    assert!(matches!(
        err.downcast_ref::<LiveTrackingError>(),
        Some(LiveTrackingError::SourceUnavailable { .. })
    ));
}

#[tokio::test]
async fn test_updates_reach_hub_clients() {
    let hub = Arc::new(LocalHub::new(32));
    let mut player = hub.connect("u1");
    let mut spectator = hub.connect("u2");
    hub.watch_match("u1", "g1");
    hub.watch_match("u2", "g1");

    // default 15s interval keeps the polling worker out of the way
    let service = build_service(AppConfig::default(), seeded_source(), hub.clone());
    service.start().await.unwrap();
    service.start_tracking("g1", "u1").await.unwrap();

    service
        .polling()
        .run_cycle_at(Utc::now() + chrono::Duration::seconds(16))
        .await;

    // u1 is both the target and a watcher, so it sees the update twice
    for _ in 0..2 {
        let message = tokio::time::timeout(RECV_TIMEOUT, player.recv())
            .await
            .expect("no match update for player")
            .unwrap();
        assert_eq!(message.type_tag(), "match_update");
        match &message.body {
            MessageBody::MatchUpdate(data) => {
                assert_eq!(data.game_id, "g1");
                assert_eq!(data.status, "in_progress");
                assert_eq!(data.participants.len(), 2);
                assert!(data.game_time >= 10);
            }
            other => panic!("unexpected body {:?}", other),
        }
    }
    let message = tokio::time::timeout(RECV_TIMEOUT, spectator.recv())
        .await
        .expect("no match update for spectator")
        .unwrap();
    assert_eq!(message.match_id.as_deref(), Some("g1"));

    // Performance and rank updates go to the subscriber only
    let outcome = service.request_performance_update("u1").await.unwrap();
    assert_eq!(outcome, PerformanceOutcome::Enqueued);
    let message = tokio::time::timeout(RECV_TIMEOUT, player.recv())
        .await
        .expect("no performance update")
        .unwrap();
    match &message.body {
        MessageBody::PerformanceUpdate(data) => {
            assert_eq!(data.user_id, "u1");
            assert!(data.cs_per_minute > 0.0);
        }
        other => panic!("unexpected body {:?}", other),
    }

    let outcome = service.notify_rank_change(
        "u2",
        "GOLD I",
        "PLATINUM IV",
        0,
        Some(RankedSeries {
            target: "PLATINUM".to_string(),
            wins: 3,
            losses: 1,
            progress: "WWLW".to_string(),
        }),
    );
    assert!(outcome.is_accepted());
    let message = tokio::time::timeout(RECV_TIMEOUT, spectator.recv())
        .await
        .expect("no rank update")
        .unwrap();
    match &message.body {
        MessageBody::RankUpdate(data) => {
            assert_eq!(data.new_rank, "PLATINUM IV");
            assert_eq!(data.series.as_ref().map(|s| s.wins), Some(3));
        }
        other => panic!("unexpected body {:?}", other),
    }
    assert!(player.try_recv().is_none());

    service.stop().await.unwrap();
}

#[tokio::test]
async fn test_rank_updates_dispatched_in_order() {
    let transport = Arc::new(RecordingTransport::new());
    let service = build_service(fast_config(), seeded_source(), transport.clone());
    service.start().await.unwrap();

    let ranks = ["SILVER II", "SILVER I", "GOLD IV", "GOLD III"];
    for pair in ranks.windows(2) {
        service.notify_rank_change("u1", pair[0], pair[1], 10, None);
    }

    assert!(transport.wait_for(3, RECV_TIMEOUT).await);
    let new_ranks: Vec<String> = transport
        .published()
        .into_iter()
        .map(|(target, message)| {
            assert_eq!(target, PublishTarget::User("u1".to_string()));
            match message.body {
                MessageBody::RankUpdate(data) => data.new_rank,
                other => panic!("unexpected body {:?}", other),
            }
        })
        .collect();
    assert_eq!(new_ranks, vec!["SILVER I", "GOLD IV", "GOLD III"]);

    service.stop().await.unwrap();
}

#[tokio::test]
async fn test_polling_worker_publishes_on_its_own() {
    let transport = Arc::new(RecordingTransport::new());
    let service = build_service(fast_config(), seeded_source(), transport.clone());
    service.start_tracking("g1", "u1").await.unwrap();
    service.start().await.unwrap();

    // the tracker goes stale after one 1s interval and the next tick refreshes it
    assert!(transport.wait_for(2, Duration::from_secs(5)).await);
    assert!(transport.count_of_type("match_update") >= 2);
    assert!(service.registry().tracker("g1").unwrap().update_count() >= 1);

    service.stop().await.unwrap();
}

#[tokio::test]
async fn test_summary_worker_samples_transport() {
    let transport = Arc::new(RecordingTransport::new());
    let service = build_service(fast_config(), seeded_source(), transport.clone());
    service.start().await.unwrap();

    // 1s summary interval
    tokio::time::sleep(Duration::from_millis(1500)).await;
    assert!(transport.stats_requests() >= 1);
    assert_eq!(service.metrics().transport().active_connections.get(), 3);

    service.stop().await.unwrap();
    assert_eq!(service.worker_count(), 0);

    let sampled = transport.stats_requests();
    tokio::time::sleep(Duration::from_millis(1500)).await;
    assert_eq!(transport.stats_requests(), sampled);
}

#[tokio::test]
async fn test_summary_worker_reports_hub_connections() {
    let hub = Arc::new(LocalHub::new(8));
    let _player = hub.connect("u1");
    let _spectator = hub.connect("u2");

    let service = build_service(fast_config(), seeded_source(), hub.clone());
    service.start().await.unwrap();
    tokio::time::sleep(Duration::from_millis(1500)).await;

    assert_eq!(service.metrics().transport().active_connections.get(), 2);
    service.stop().await.unwrap();
}

#[tokio::test]
async fn test_worker_lifecycle() {
    let service = build_service(
        fast_config(),
        seeded_source(),
        Arc::new(RecordingTransport::new()),
    );

    service.start().await.unwrap();
    assert_eq!(service.worker_count(), WORKER_COUNT);
    assert!(service.start().await.is_err());

    service.stop().await.unwrap();
    assert_eq!(service.lifecycle_state(), LifecycleState::Stopped);
    assert_eq!(service.worker_count(), 0);

    let err = service.start().await.unwrap_err();
    assert!(matches!(
        err.downcast_ref::<LiveTrackingError>(),
        Some(LiveTrackingError::Lifecycle { .. })
    ));
}

#[tokio::test]
async fn test_enqueue_after_stop_is_silent_drop() {
    let service = build_service(
        fast_config(),
        seeded_source(),
        Arc::new(RecordingTransport::new()),
    );
    service.start().await.unwrap();
    service.stop().await.unwrap();

    assert_eq!(
        service.notify_rank_change("u1", "GOLD I", "GOLD II", 75, None),
        EnqueueOutcome::DroppedClosed
    );
    assert_eq!(
        service.request_performance_update("u1").await.unwrap(),
        PerformanceOutcome::Dropped
    );

    // Registry operations keep working after shutdown
    service.start_tracking("g1", "u1").await.unwrap();
    let report = service
        .polling()
        .run_cycle_at(Utc::now() + chrono::Duration::seconds(16))
        .await;
    assert_eq!(report.dropped, 1);
}
