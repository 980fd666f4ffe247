#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use riskgate_core::error::{Result, RiskGateError};
use riskgate_gateway::admission::{
    AdmissionController, AdmissionOutcome, ClientContext, ClientStats, CounterStore, WindowCount,
    REASON_BLOCKED, REASON_ESCALATED, REASON_RATE_LIMITED,
};
use riskgate_gateway::config::{OnStoreError, RateLimitConfig};

fn cfg(limit: u32, window_ms: u64, block_ms: u64) -> RateLimitConfig {
    RateLimitConfig {
        requests_per_window: limit,
        burst: 0,
        window_ms,
        block_duration_ms: block_ms,
        ..RateLimitConfig::default()
    }
}

fn ctx() -> ClientContext {
    ClientContext::default()
}

#[tokio::test]
async fn n_plus_first_request_is_denied_until_window_elapses() {
    let ctl = AdmissionController::new(cfg(3, 200, 60_000)).unwrap();
    for i in 0..3 {
        let d = ctl.allow("c", &ctx()).await;
        assert!(d.allowed, "request {i}");
        assert_eq!(d.remaining, 2 - i);
    }
    let d = ctl.allow("c", &ctx()).await;
    assert!(!d.allowed);
    assert_eq!(d.reason, REASON_RATE_LIMITED);
    assert!(d.retry_after_ms.unwrap() <= 200);

    tokio::time::sleep(Duration::from_millis(250)).await;
    assert!(ctl.allow("c", &ctx()).await.allowed);
}

#[tokio::test]
async fn scenario_ten_per_minute_with_burst_five() {
    let ctl = AdmissionController::new(RateLimitConfig {
        requests_per_window: 10,
        burst: 5,
        window_ms: 60_000,
        block_duration_ms: 900_000,
        ..RateLimitConfig::default()
    })
    .unwrap();
    let client = "203.0.113.5";

    for i in 0..10 {
        assert!(ctl.allow(client, &ctx()).await.allowed, "request {}", i + 1);
    }

    let eleventh = ctl.allow(client, &ctx()).await;
    assert!(!eleventh.allowed);
    assert_eq!(eleventh.reason, REASON_RATE_LIMITED);

    assert_eq!(ctl.allow(client, &ctx()).await.reason, REASON_RATE_LIMITED);

    let third_denial = ctl.allow(client, &ctx()).await;
    assert_eq!(third_denial.outcome, AdmissionOutcome::Escalated);
    assert_eq!(third_denial.reason, REASON_ESCALATED);
    assert_eq!(third_denial.retry_after_ms, Some(900_000));

    assert!(ctl.is_blocked(client).await.unwrap());
    let remaining = ctl.remaining_block_time(client).await.unwrap().unwrap();
    assert!(remaining > 890_000 && remaining <= 900_000);

    let stats = ctl.get_client_stats(client).await.unwrap().unwrap();
    assert!(stats.blocked);
    assert_eq!(stats.denied_requests, 3);
    assert_eq!(stats.backend, "local");
}

#[tokio::test]
async fn blocked_client_is_refused_regardless_of_window() {
    let ctl = AdmissionController::new(cfg(1, 100, 400)).unwrap();
    ctl.allow("c", &ctx()).await;
    for _ in 0..3 {
        ctl.allow("c", &ctx()).await;
    }
    assert!(ctl.is_blocked("c").await.unwrap());

    // the window rolls over but the block holds
    tokio::time::sleep(Duration::from_millis(150)).await;
    let d = ctl.allow("c", &ctx()).await;
    assert_eq!(d.outcome, AdmissionOutcome::Blocked);
    assert_eq!(d.reason, REASON_BLOCKED);
    assert!(d.into_result().is_err());

    // and lapses on its own
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert!(!ctl.is_blocked("c").await.unwrap());
    assert!(ctl.allow("c", &ctx()).await.allowed);
}

#[tokio::test]
async fn allowed_request_resets_the_violation_streak() {
    let ctl = AdmissionController::new(cfg(1, 150, 60_000)).unwrap();
    ctl.allow("c", &ctx()).await;
    ctl.allow("c", &ctx()).await;
    ctl.allow("c", &ctx()).await;
    assert_eq!(ctl.get_client_stats("c").await.unwrap().unwrap().violations, 2);

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(ctl.allow("c", &ctx()).await.allowed);
    assert_eq!(ctl.get_client_stats("c").await.unwrap().unwrap().violations, 0);

    // two more denials stay below the threshold
    assert_eq!(ctl.allow("c", &ctx()).await.outcome, AdmissionOutcome::RateLimited);
    assert_eq!(ctl.allow("c", &ctx()).await.outcome, AdmissionOutcome::RateLimited);
    assert!(!ctl.is_blocked("c").await.unwrap());
}

#[tokio::test]
async fn unblock_clears_block_and_streak() {
    let ctl = AdmissionController::new(cfg(1, 60_000, 60_000)).unwrap();
    for _ in 0..4 {
        ctl.allow("c", &ctx()).await;
    }
    assert!(ctl.is_blocked("c").await.unwrap());

    ctl.unblock("c").await.unwrap();
    assert!(!ctl.is_blocked("c").await.unwrap());
    let stats = ctl.get_client_stats("c").await.unwrap().unwrap();
    assert!(!stats.blocked);
    assert_eq!(stats.violations, 0);
}

#[tokio::test]
async fn clients_are_isolated() {
    let ctl = AdmissionController::new(cfg(1, 60_000, 60_000)).unwrap();
    assert!(ctl.allow("a", &ctx()).await.allowed);
    assert!(!ctl.allow("a", &ctx()).await.allowed);
    assert!(ctl.allow("b", &ctx()).await.allowed);
}

#[tokio::test]
async fn exempt_clients_bypass_admission() {
    let ctl = AdmissionController::new(RateLimitConfig {
        exempt_clients: vec!["10.0.0.1".into()],
        ..cfg(1, 60_000, 60_000)
    })
    .unwrap();
    for _ in 0..5 {
        let d = ctl.allow("10.0.0.1", &ctx()).await;
        assert_eq!(d.outcome, AdmissionOutcome::Exempt);
    }
    assert!(ctl.get_client_stats("10.0.0.1").await.unwrap().is_none());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_requests_admit_exactly_the_limit() {
    const LIMIT: u32 = 25;
    const CALLERS: usize = 200;
    let ctl = Arc::new(AdmissionController::new(cfg(LIMIT, 60_000, 60_000)).unwrap());

    let handles: Vec<_> = (0..CALLERS)
        .map(|_| {
            let ctl = Arc::clone(&ctl);
            tokio::spawn(async move { ctl.allow("hot", &ClientContext::default()).await.allowed })
        })
        .collect();

    let results = futures_util::future::join_all(handles).await;
    let allowed = results.into_iter().map(|r| r.unwrap()).filter(|a| *a).count();
    assert_eq!(allowed, LIMIT as usize);
}

#[tokio::test]
async fn live_config_update_applies_to_next_request() {
    let ctl = AdmissionController::new(cfg(1, 60_000, 60_000)).unwrap();
    assert!(ctl.allow("c", &ctx()).await.allowed);
    assert!(!ctl.allow("c", &ctx()).await.allowed);

    ctl.update_config(cfg(10, 60_000, 60_000)).unwrap();
    assert!(ctl.allow("c", &ctx()).await.allowed);
    assert_eq!(ctl.config().requests_per_window, 10);

    let bad = RateLimitConfig { burst: 50, ..cfg(10, 60_000, 60_000) };
    assert!(matches!(ctl.update_config(bad), Err(RiskGateError::BadRequest(_))));
}

/// Distributed store double: either always fails or never answers.
struct BrokenStore {
    hang: bool,
    calls: AtomicUsize,
}

impl BrokenStore {
    fn failing() -> Arc<Self> {
        Arc::new(Self { hang: false, calls: AtomicUsize::new(0) })
    }

    fn hanging() -> Arc<Self> {
        Arc::new(Self { hang: true, calls: AtomicUsize::new(0) })
    }

    async fn fail<T>(&self) -> Result<T> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.hang {
            std::future::pending::<()>().await;
        }
        Err(RiskGateError::Store("connection refused".into()))
    }
}

#[async_trait]
impl CounterStore for BrokenStore {
    fn name(&self) -> &'static str {
        "broken"
    }
    async fn record(&self, _: &str, _: u64, _: u64, _: &ClientContext) -> Result<WindowCount> {
        self.fail().await
    }
    async fn block_remaining(&self, _: &str, _: u64) -> Result<Option<u64>> {
        self.fail().await
    }
    async fn block(&self, _: &str, _: u64, _: u64) -> Result<()> {
        self.fail().await
    }
    async fn unblock(&self, _: &str) -> Result<()> {
        self.fail().await
    }
    async fn add_violation(&self, _: &str) -> Result<u32> {
        self.fail().await
    }
    async fn reset_violations(&self, _: &str) -> Result<()> {
        self.fail().await
    }
    async fn stats(&self, _: &str, _: u64) -> Result<Option<ClientStats>> {
        self.fail().await
    }
}

fn distributed(policy: OnStoreError, store: Arc<BrokenStore>) -> AdmissionController {
    let cfg = RateLimitConfig {
        distributed: true,
        on_store_error: policy,
        ..cfg(2, 60_000, 60_000)
    };
    let store: Arc<dyn CounterStore> = store;
    AdmissionController::with_store(cfg, Some(store), Duration::from_millis(50)).unwrap()
}

#[tokio::test]
async fn store_failure_falls_back_to_local_counts() {
    let store = BrokenStore::failing();
    let ctl = distributed(OnStoreError::Local, Arc::clone(&store));

    let first = ctl.allow("c", &ctx()).await;
    assert!(first.allowed);
    assert!(first.degraded);
    assert_eq!(first.backend, "local");
    assert!(ctl.allow("c", &ctx()).await.allowed);
    assert_eq!(ctl.allow("c", &ctx()).await.reason, REASON_RATE_LIMITED);
    assert!(store.calls.load(Ordering::SeqCst) >= 3);
}

#[tokio::test]
async fn store_failure_can_fail_open() {
    let ctl = distributed(OnStoreError::Allow, BrokenStore::failing());
    for _ in 0..5 {
        let d = ctl.allow("c", &ctx()).await;
        assert!(d.allowed && d.degraded);
    }
}

#[tokio::test]
async fn store_failure_can_fail_closed() {
    let ctl = distributed(OnStoreError::Deny, BrokenStore::failing());
    let d = ctl.allow("c", &ctx()).await;
    assert!(!d.allowed);
    assert_eq!(d.outcome, AdmissionOutcome::Unavailable);
    let err = d.into_result().unwrap_err();
    assert_eq!(err.client_code().http_status(), 503);
}

#[tokio::test]
async fn hung_store_is_cut_off_by_the_timeout() {
    let ctl = distributed(OnStoreError::Deny, BrokenStore::hanging());
    let started = std::time::Instant::now();
    let d = ctl.allow("c", &ctx()).await;
    assert!(!d.allowed);
    assert!(started.elapsed() < Duration::from_secs(2));
}

#[tokio::test]
async fn unblock_surfaces_store_errors() {
    let ctl = distributed(OnStoreError::Local, BrokenStore::failing());
    assert!(matches!(ctl.unblock("c").await, Err(RiskGateError::Store(_))));
}
