// Integration tests for the admission dispatcher

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use arena_dispatch::{
    AdmissionDispatcher, BreakerState, CircuitBreaker, CircuitBreakerConfig, DispatcherConfig,
};
use arena_models::ArenaError;

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

fn test_breaker(failure_threshold: u32) -> Arc<CircuitBreaker> {
    init_tracing();
    Arc::new(CircuitBreaker::new(CircuitBreakerConfig {
        failure_threshold,
        success_threshold: 2,
        reset_timeout: Duration::from_secs(30),
    }))
}

fn test_config() -> DispatcherConfig {
    DispatcherConfig {
        max_concurrent: 2,
        interval_cap: 100,
        interval: Duration::from_millis(1000),
        task_timeout: Duration::from_millis(200),
        backlog_limit: 4,
        soft_backlog: 2,
        soft_inflight: 2,
    }
}

#[tokio::test]
async fn test_submit_success_path() {
    let dispatcher = AdmissionDispatcher::new(test_config(), test_breaker(5));

    let result = dispatcher.submit(async { Ok::<_, anyhow::Error>(42u32) }).await;
    assert_eq!(result.unwrap(), 42);

    let stats = dispatcher.stats();
    assert_eq!(stats.submissions, 1);
    assert_eq!(stats.errors, 0);
    assert!((stats.success_rate() - 1.0).abs() < f64::EPSILON);
}

#[tokio::test]
async fn test_task_error_becomes_submission_failed() {
    let dispatcher = AdmissionDispatcher::new(test_config(), test_breaker(5));

    let result = dispatcher
        .submit(async { Err::<u32, _>(anyhow::anyhow!("judge exploded")) })
        .await;

    match result {
        Err(ArenaError::SubmissionFailed { reason }) => {
            assert!(reason.contains("judge exploded"));
        }
        other => panic!("unexpected result: {other:?}"),
    }
    assert_eq!(dispatcher.stats().errors, 1);
}

#[tokio::test]
async fn test_timeout_translation() {
    let dispatcher = AdmissionDispatcher::new(test_config(), test_breaker(5));

    let result = dispatcher
        .submit(async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok::<_, anyhow::Error>(0u32)
        })
        .await;

    match result {
        Err(ArenaError::Timeout { timeout_ms }) => assert_eq!(timeout_ms, 200),
        other => panic!("unexpected result: {other:?}"),
    }
}

#[tokio::test]
async fn test_open_breaker_rejects_without_invoking_task() {
    let breaker = test_breaker(1);
    let dispatcher = AdmissionDispatcher::new(test_config(), breaker.clone());

    // One failure trips the breaker.
    let _ = dispatcher
        .submit(async { Err::<u32, _>(anyhow::anyhow!("down")) })
        .await;
    assert_eq!(breaker.state().await, BreakerState::Open);

    let calls = Arc::new(AtomicU64::new(0));
    let observed = calls.clone();
    let result = dispatcher
        .submit(async move {
            observed.fetch_add(1, Ordering::SeqCst);
            Ok::<_, anyhow::Error>(0u32)
        })
        .await;

    assert!(matches!(result, Err(ArenaError::ServiceUnavailable { .. })));
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_backlog_ceiling_rejects_without_enqueuing() {
    let config = DispatcherConfig {
        max_concurrent: 1,
        backlog_limit: 1,
        ..test_config()
    };
    let dispatcher = Arc::new(AdmissionDispatcher::new(config, test_breaker(5)));

    let (release_tx, release_rx) = tokio::sync::oneshot::channel::<()>();

    // Occupies the single concurrency slot until released.
    let blocker = {
        let dispatcher = dispatcher.clone();
        tokio::spawn(async move {
            dispatcher
                .submit(async move {
                    release_rx.await.ok();
                    Ok::<_, anyhow::Error>(())
                })
                .await
        })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;

    // Fills the backlog (waits on the concurrency slot).
    let queued = {
        let dispatcher = dispatcher.clone();
        tokio::spawn(async move {
            dispatcher
                .submit(async { Ok::<_, anyhow::Error>(()) })
                .await
        })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(dispatcher.stats().queued, 1);

    // Third submission hits the ceiling and never enqueues.
    let result = dispatcher
        .submit(async { Ok::<_, anyhow::Error>(()) })
        .await;
    match result {
        Err(ArenaError::Overloaded { backlog, limit }) => {
            assert_eq!(backlog, 1);
            assert_eq!(limit, 1);
        }
        other => panic!("unexpected result: {other:?}"),
    }
    assert_eq!(dispatcher.stats().queued, 1);

    release_tx.send(()).ok();
    blocker.await.unwrap().unwrap();
    queued.await.unwrap().unwrap();
    dispatcher.wait_until_idle().await;
    assert_eq!(dispatcher.stats().in_flight, 0);
}

#[tokio::test]
async fn test_interval_cap_delays_excess_admissions() {
    let config = DispatcherConfig {
        max_concurrent: 10,
        interval_cap: 2,
        interval: Duration::from_millis(200),
        ..test_config()
    };
    let dispatcher = Arc::new(AdmissionDispatcher::new(config, test_breaker(5)));

    let started = tokio::time::Instant::now();
    let mut handles = Vec::new();
    for _ in 0..3 {
        let dispatcher = dispatcher.clone();
        handles.push(tokio::spawn(async move {
            dispatcher
                .submit(async { Ok::<_, anyhow::Error>(()) })
                .await
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    // The third admission must wait for the second interval window.
    assert!(started.elapsed() >= Duration::from_millis(150));
}

#[tokio::test]
async fn test_pause_holds_queued_work_and_resume_releases_it() {
    let dispatcher = Arc::new(AdmissionDispatcher::new(test_config(), test_breaker(5)));
    dispatcher.pause();

    let handle = {
        let dispatcher = dispatcher.clone();
        tokio::spawn(async move {
            dispatcher
                .submit(async { Ok::<_, anyhow::Error>(7u32) })
                .await
        })
    };

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(dispatcher.stats().queued, 1);
    assert_eq!(dispatcher.stats().in_flight, 0);

    dispatcher.resume();
    assert_eq!(handle.await.unwrap().unwrap(), 7);
}

#[tokio::test]
async fn test_clear_drops_queued_work_only() {
    let dispatcher = Arc::new(AdmissionDispatcher::new(test_config(), test_breaker(5)));
    dispatcher.pause();

    let handle = {
        let dispatcher = dispatcher.clone();
        tokio::spawn(async move {
            dispatcher
                .submit(async { Ok::<_, anyhow::Error>(()) })
                .await
        })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(dispatcher.stats().queued, 1);

    dispatcher.clear();
    let result = handle.await.unwrap();
    match result {
        Err(ArenaError::SubmissionFailed { reason }) => {
            assert!(reason.contains("cleared"));
        }
        other => panic!("unexpected result: {other:?}"),
    }
    assert_eq!(dispatcher.stats().queued, 0);

    // The dispatcher still accepts fresh work afterwards.
    dispatcher.resume();
    dispatcher
        .submit(async { Ok::<_, anyhow::Error>(()) })
        .await
        .unwrap();
}

#[tokio::test]
async fn test_is_healthy_tracks_breaker_state() {
    let breaker = test_breaker(1);
    let dispatcher = AdmissionDispatcher::new(test_config(), breaker.clone());
    assert!(dispatcher.is_healthy().await);

    let _ = dispatcher
        .submit(async { Err::<u32, _>(anyhow::anyhow!("down")) })
        .await;
    assert!(!dispatcher.is_healthy().await);

    dispatcher.reset_breaker().await;
    assert!(dispatcher.is_healthy().await);
}

#[tokio::test]
async fn test_wait_until_idle_resolves_after_drain() {
    let dispatcher = Arc::new(AdmissionDispatcher::new(test_config(), test_breaker(5)));

    let handle = {
        let dispatcher = dispatcher.clone();
        tokio::spawn(async move {
            dispatcher
                .submit(async {
                    tokio::time::sleep(Duration::from_millis(50)).await;
                    Ok::<_, anyhow::Error>(())
                })
                .await
        })
    };

    tokio::time::sleep(Duration::from_millis(10)).await;
    dispatcher.wait_until_idle().await;
    assert_eq!(dispatcher.stats().in_flight, 0);
    handle.await.unwrap().unwrap();
}
