//! Integration tests for the request orchestrator.
//!
//! These tests drive the public API end to end with scripted transports:
//! - Deduplication of concurrent identical requests
//! - Per-attempt timeouts and retry exhaustion
//! - Cancellation during retry backoff
//! - Offline queueing, manual replay and automatic replay on reconnect
//! - Cache TTL expiry and network-first fallback
//! - Service wiring from configuration

use holdfast::cache::{CachePolicy, CacheStrategy};
use holdfast::config::{ConfigFile, StorageKind};
use holdfast::connectivity::{ConnectivityMonitor, MockProber, MonitorConfig};
use holdfast::events::Event;
use holdfast::orchestrator::{
    spawn_auto_replay, Orchestrator, OrchestratorBuilder, OrchestratorConfig, RequestOptions,
};
use holdfast::outcome::{FailureKind, Outcome};
use holdfast::queue::{QueueConfig, RequestQueue};
use holdfast::request::{Method, Request};
use holdfast::retry::RetryPolicy;
use holdfast::service::ServiceBuilder;
use holdfast::time::ManualClock;
use holdfast::transport::mock::{MockReply, MockTransport};
use holdfast::transport::{TextDecoder, TransportError};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

// =============================================================================
// Test Helpers
// =============================================================================

fn no_retry_config() -> OrchestratorConfig {
    OrchestratorConfig {
        retry: RetryPolicy::None,
        ..Default::default()
    }
}

/// Orchestrator with a queue and a monitor that has no probe endpoints, so
/// only the manual override can take it offline.
fn offline_capable(
    transport: &MockTransport,
    queue_config: QueueConfig,
) -> (Orchestrator, Arc<RequestQueue>, Arc<ConnectivityMonitor>) {
    let queue = Arc::new(RequestQueue::new(queue_config));
    let monitor = Arc::new(ConnectivityMonitor::new(
        MonitorConfig::default(),
        Arc::new(MockProber::new()),
    ));
    let orchestrator = OrchestratorBuilder::new(Arc::new(transport.clone()))
        .config(no_retry_config())
        .queue(Arc::clone(&queue))
        .monitor(Arc::clone(&monitor))
        .build();
    (orchestrator, queue, monitor)
}

fn post(uri: &str, body: &'static str) -> Request {
    Request::builder(Method::Post, uri).body(body).build()
}

/// Lets spawned cache writes run.
async fn settle() {
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
}

// =============================================================================
// Deduplication
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_concurrent_identical_requests_share_one_call() {
    let transport =
        MockTransport::new().then(MockReply::ok("shared").after(Duration::from_millis(50)));
    let orchestrator = OrchestratorBuilder::new(Arc::new(transport.clone())).build();

    let (first, second): (Outcome<String>, Outcome<String>) = tokio::join!(
        orchestrator.execute(Request::get("/profile"), &TextDecoder),
        orchestrator.execute(Request::get("/profile"), &TextDecoder),
    );

    assert_eq!(first.into_result().unwrap().payload, "shared");
    assert_eq!(second.into_result().unwrap().payload, "shared");
    assert_eq!(transport.calls(), 1);

    let stats = orchestrator.stats();
    assert_eq!(stats.total_requests, 2);
    assert_eq!(stats.deduplicated, 1);
    assert_eq!(stats.successes, 2);
}

#[tokio::test(start_paused = true)]
async fn test_dedup_disabled_sends_every_request() {
    let transport = MockTransport::new()
        .otherwise(MockReply::ok("each").after(Duration::from_millis(50)));
    let orchestrator = OrchestratorBuilder::new(Arc::new(transport.clone())).build();
    let options = RequestOptions::new().dedup(false);

    let (first, second): (Outcome<String>, Outcome<String>) = tokio::join!(
        orchestrator.execute_with(Request::get("/feed"), &TextDecoder, options.clone()),
        orchestrator.execute_with(Request::get("/feed"), &TextDecoder, options),
    );

    assert!(first.is_success());
    assert!(second.is_success());
    assert_eq!(transport.calls(), 2);
    assert_eq!(orchestrator.stats().deduplicated, 0);
}

// =============================================================================
// Timeouts, Retries and Cancellation
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_every_attempt_times_out() {
    let transport =
        MockTransport::new().otherwise(MockReply::ok("late").after(Duration::from_secs(10)));
    let orchestrator = OrchestratorBuilder::new(Arc::new(transport.clone())).build();
    let options = RequestOptions::new()
        .timeout(Duration::from_secs(1))
        .retry(RetryPolicy::fixed(Duration::from_millis(100), 2));

    let outcome: Outcome<String> = orchestrator
        .execute_with(Request::get("/slow"), &TextDecoder, options)
        .await;

    let failure = outcome.into_result().unwrap_err();
    assert_eq!(failure.kind, FailureKind::Timeout);
    assert_eq!(failure.retry_count, 2);
    assert_eq!(transport.calls(), 3);
    assert_eq!(orchestrator.stats().retries, 2);
}

#[tokio::test(start_paused = true)]
async fn test_cancel_by_tag_during_backoff() {
    let transport = MockTransport::new().otherwise(MockReply::status(503));
    let orchestrator = OrchestratorBuilder::new(Arc::new(transport.clone())).build();
    let options = RequestOptions::new().retry(RetryPolicy::fixed(Duration::from_secs(10), 5));
    let request = Request::builder(Method::Get, "/sync").tag("sync").build();

    let runner = orchestrator.clone();
    let handle = tokio::spawn(async move {
        let outcome: Outcome<String> = runner.execute_with(request, &TextDecoder, options).await;
        outcome
    });

    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(orchestrator.in_flight(), 1);
    assert_eq!(orchestrator.cancel_by_tag("sync"), 1);

    let failure = handle.await.unwrap().into_result().unwrap_err();
    assert_eq!(failure.kind, FailureKind::Cancelled);
    assert_eq!(transport.calls(), 1);
    assert_eq!(orchestrator.in_flight(), 0);
    assert_eq!(orchestrator.stats().cancelled, 1);
}

#[tokio::test(start_paused = true)]
async fn test_cancel_by_correlation_id_during_backoff() {
    let transport = MockTransport::new().otherwise(MockReply::status(503));
    let orchestrator = OrchestratorBuilder::new(Arc::new(transport.clone())).build();
    let options = RequestOptions::new().retry(RetryPolicy::fixed(Duration::from_secs(10), 5));
    let request = Request::get("/upload-status");
    let correlation_id = request.correlation_id();

    let runner = orchestrator.clone();
    let handle = tokio::spawn(async move {
        let outcome: Outcome<String> = runner.execute_with(request, &TextDecoder, options).await;
        outcome
    });

    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(orchestrator.in_flight(), 1);
    assert!(orchestrator.cancel_by_correlation_id(correlation_id));

    let failure = handle.await.unwrap().into_result().unwrap_err();
    assert_eq!(failure.kind, FailureKind::Cancelled);
    assert_eq!(failure.meta.correlation_id, correlation_id);
    assert_eq!(transport.calls(), 1);
    assert_eq!(orchestrator.in_flight(), 0);
    assert!(!orchestrator.cancel_by_correlation_id(correlation_id));
}

#[tokio::test(start_paused = true)]
async fn test_cancelled_leader_does_not_cancel_waiter() {
    let transport =
        MockTransport::new().otherwise(MockReply::ok("mine").after(Duration::from_millis(100)));
    let orchestrator = OrchestratorBuilder::new(Arc::new(transport.clone())).build();
    let leader_request = Request::builder(Method::Get, "/doc").tag("leader").build();

    let leader = {
        let orchestrator = orchestrator.clone();
        tokio::spawn(async move {
            let outcome: Outcome<String> = orchestrator.execute(leader_request, &TextDecoder).await;
            outcome
        })
    };
    tokio::time::sleep(Duration::from_millis(10)).await;

    let waiter = {
        let orchestrator = orchestrator.clone();
        tokio::spawn(async move {
            let outcome: Outcome<String> =
                orchestrator.execute(Request::get("/doc"), &TextDecoder).await;
            outcome
        })
    };
    tokio::time::sleep(Duration::from_millis(10)).await;
    orchestrator.cancel_by_tag("leader");

    let leader = leader.await.unwrap().into_result().unwrap_err();
    let waiter = waiter.await.unwrap().into_result().unwrap();

    assert_eq!(leader.kind, FailureKind::Cancelled);
    assert_eq!(waiter.payload, "mine");
    assert_eq!(transport.calls(), 2);
}

// =============================================================================
// Offline Queue
// =============================================================================

#[tokio::test]
async fn test_offline_mutation_is_queued_then_replayed() {
    let transport = MockTransport::new().then(MockReply::status(201));
    let (orchestrator, queue, monitor) = offline_capable(&transport, QueueConfig::default());
    monitor.set_manual_offline(true).await;

    let outcome: Outcome<String> = orchestrator
        .execute(post("/notes", "{\"text\":\"hi\"}"), &TextDecoder)
        .await;

    let failure = outcome.into_result().unwrap_err();
    assert_eq!(failure.kind, FailureKind::QueuedForLater);
    assert!(failure.kind.is_soft());
    assert_eq!(transport.calls(), 0);
    assert_eq!(queue.len().await, 1);
    assert_eq!(orchestrator.stats().queued, 1);

    monitor.set_manual_offline(false).await;
    assert!(!orchestrator.is_offline());
    // Nothing replays without an auto replay task
    assert_eq!(queue.len().await, 1);

    let summary = orchestrator.replay_queue().await.unwrap();

    assert_eq!(summary.succeeded, 1);
    assert_eq!(summary.failed, 0);
    assert_eq!(summary.remaining, 0);
    assert_eq!(transport.calls(), 1);
    let sent = &transport.requests()[0];
    assert_eq!(sent.method(), Method::Post);
    assert_eq!(sent.uri(), "/notes");
}

#[tokio::test]
async fn test_offline_read_without_cache_fails_as_network() {
    let transport = MockTransport::new();
    let (orchestrator, queue, monitor) = offline_capable(&transport, QueueConfig::default());
    monitor.set_manual_offline(true).await;

    let outcome: Outcome<String> = orchestrator.execute(Request::get("/feed"), &TextDecoder).await;

    assert_eq!(outcome.failure_kind(), Some(FailureKind::Network));
    assert_eq!(transport.calls(), 0);
    assert!(queue.is_empty().await);
}

#[tokio::test]
async fn test_queue_at_capacity_evicts_oldest() {
    let transport = MockTransport::new();
    let queue_config = QueueConfig {
        max_size: 2,
        ..Default::default()
    };
    let (orchestrator, queue, monitor) = offline_capable(&transport, queue_config);
    monitor.set_manual_offline(true).await;

    for uri in ["/a", "/b", "/c"] {
        let _: Outcome<String> = orchestrator.execute(post(uri, "x"), &TextDecoder).await;
    }

    let uris: Vec<String> = queue
        .snapshot()
        .await
        .iter()
        .map(|item| item.request.uri().to_string())
        .collect();
    assert_eq!(uris, vec!["/b", "/c"]);
}

#[tokio::test]
async fn test_replay_drops_item_after_attempt_limit() {
    let transport = MockTransport::new().otherwise(MockReply::status(422));
    let queue_config = QueueConfig {
        max_replay_attempts: 2,
        ..Default::default()
    };
    let (orchestrator, queue, monitor) = offline_capable(&transport, queue_config);
    monitor.set_manual_offline(true).await;
    let _: Outcome<String> = orchestrator.execute(post("/bad", "x"), &TextDecoder).await;
    monitor.set_manual_offline(false).await;

    let first = orchestrator.replay_queue().await.unwrap();
    assert_eq!(first.failed, 1);
    assert_eq!(first.dropped, 0);
    assert_eq!(first.remaining, 1);

    let second = orchestrator.replay_queue().await.unwrap();
    assert_eq!(second.failed, 1);
    assert_eq!(second.dropped, 1);
    assert_eq!(second.remaining, 0);
    assert!(queue.is_empty().await);
}

#[tokio::test(start_paused = true)]
async fn test_auto_replay_drains_queue_on_reconnect() {
    let transport = MockTransport::new().otherwise(MockReply::status(204));
    let (orchestrator, queue, monitor) = offline_capable(&transport, QueueConfig::default());
    let mut events = orchestrator.events().subscribe();
    let shutdown = CancellationToken::new();
    monitor.set_manual_offline(true).await;

    let task = spawn_auto_replay(orchestrator.clone(), monitor.subscribe(), shutdown.clone());

    let _: Outcome<String> = orchestrator.execute(post("/one", "1"), &TextDecoder).await;
    let _: Outcome<String> = orchestrator.execute(post("/two", "2"), &TextDecoder).await;
    assert_eq!(queue.len().await, 2);

    monitor.set_manual_offline(false).await;

    let replayed = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            match events.recv().await {
                Ok(Event::ReplayCompleted { succeeded, .. }) => break succeeded,
                Ok(_) => continue,
                Err(e) => panic!("event stream closed: {e}"),
            }
        }
    })
    .await
    .unwrap();

    assert_eq!(replayed, 2);
    assert!(queue.is_empty().await);
    let uris: Vec<String> = transport
        .requests()
        .iter()
        .map(|r| r.uri().to_string())
        .collect();
    assert_eq!(uris, vec!["/one", "/two"]);

    shutdown.cancel();
    task.await.unwrap();
}

// =============================================================================
// Caching
// =============================================================================

#[tokio::test]
async fn test_cache_entry_expires_after_ttl() {
    let transport = MockTransport::new()
        .then(MockReply::ok("v1"))
        .then(MockReply::ok("v2"));
    let clock = ManualClock::new();
    let config = OrchestratorConfig {
        cache: CachePolicy::new(CacheStrategy::CacheFirst).with_ttl(Duration::from_secs(60)),
        ..no_retry_config()
    };
    let orchestrator = OrchestratorBuilder::new(Arc::new(transport.clone()))
        .config(config)
        .clock(Arc::new(clock.clone()))
        .build();

    let first: Outcome<String> = orchestrator.execute(Request::get("/config"), &TextDecoder).await;
    assert!(!first.into_result().unwrap().from_cache);
    settle().await;

    let cached = orchestrator
        .execute(Request::get("/config"), &TextDecoder)
        .await
        .into_result()
        .unwrap();
    assert!(cached.from_cache);
    assert_eq!(cached.payload, "v1");

    clock.advance(Duration::from_secs(61));

    let refreshed = orchestrator
        .execute(Request::get("/config"), &TextDecoder)
        .await
        .into_result()
        .unwrap();
    assert!(!refreshed.from_cache);
    assert_eq!(refreshed.payload, "v2");
    assert_eq!(transport.calls(), 2);
}

#[tokio::test]
async fn test_network_first_falls_back_to_cache() {
    let transport = MockTransport::new()
        .then(MockReply::ok("fresh"))
        .otherwise(MockReply::fail(TransportError::Connect("reset".into())));
    let orchestrator = OrchestratorBuilder::new(Arc::new(transport.clone()))
        .config(no_retry_config())
        .build();

    let first: Outcome<String> = orchestrator.execute(Request::get("/inbox"), &TextDecoder).await;
    assert!(first.is_success());
    settle().await;

    let fallback = orchestrator
        .execute(Request::get("/inbox"), &TextDecoder)
        .await
        .into_result()
        .unwrap();

    assert!(fallback.from_cache);
    assert_eq!(fallback.payload, "fresh");
    assert_eq!(transport.calls(), 2);
    assert_eq!(orchestrator.stats().cache_hits, 1);
}

#[tokio::test]
async fn test_network_only_never_reads_cache() {
    let transport = MockTransport::new()
        .then(MockReply::ok("fresh"))
        .otherwise(MockReply::fail(TransportError::Connect("reset".into())));
    let config = OrchestratorConfig {
        cache: CachePolicy::new(CacheStrategy::NetworkOnly),
        ..no_retry_config()
    };
    let orchestrator = OrchestratorBuilder::new(Arc::new(transport.clone()))
        .config(config)
        .build();

    let _: Outcome<String> = orchestrator.execute(Request::get("/inbox"), &TextDecoder).await;
    settle().await;
    let second: Outcome<String> = orchestrator.execute(Request::get("/inbox"), &TextDecoder).await;

    assert_eq!(second.into_result().unwrap_err().kind, FailureKind::Network);
}

// =============================================================================
// Service
// =============================================================================

fn in_memory_config() -> ConfigFile {
    let mut config = ConfigFile::default();
    config.cache.storage = StorageKind::Memory;
    config.queue.storage = StorageKind::Memory;
    config.connectivity.endpoints = vec!["probe.test:443".to_string()];
    config.logging.log_events = false;
    config
}

#[tokio::test]
async fn test_service_round_trip_and_shutdown() {
    let transport = MockTransport::new().otherwise(MockReply::ok("pong"));
    let prober = MockProber::new();
    prober.reachable("probe.test:443", Duration::from_millis(1));

    let service = ServiceBuilder::new(in_memory_config())
        .with_transport(Arc::new(transport.clone()))
        .with_prober(Arc::new(prober))
        .build()
        .await
        .unwrap();

    let pong: Outcome<String> = service.execute(Request::get("/ping"), &TextDecoder).await;
    assert_eq!(pong.into_result().unwrap().payload, "pong");

    service.set_offline(true).await.unwrap();
    assert!(service.connectivity().unwrap().is_offline());

    let queued: Outcome<String> = service.execute(post("/notes", "x"), &TextDecoder).await;
    assert_eq!(queued.into_result().unwrap_err().kind, FailureKind::QueuedForLater);

    let stats = service.stats();
    assert_eq!(stats.total_requests, 2);
    assert_eq!(stats.queued, 1);

    service.shutdown().await;
    assert!(transport.is_closed());
}

#[tokio::test]
async fn test_service_without_monitor_cannot_go_offline() {
    let mut config = in_memory_config();
    config.connectivity.enabled = false;

    let service = ServiceBuilder::new(config)
        .with_transport(Arc::new(MockTransport::new()))
        .build()
        .await
        .unwrap();

    assert!(service.set_offline(true).await.is_err());
    assert!(service.connectivity().is_none());
    service.shutdown().await;
}
