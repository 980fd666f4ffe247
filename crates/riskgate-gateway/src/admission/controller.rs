use std::future::Future;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use serde::Serialize;

use riskgate_core::error::{Result, RiskGateError};

use crate::config::schema::{OnStoreError, RateLimitConfig, StoreConfig};

use super::local::LocalStore;
use super::store::{now_ms, ClientContext, ClientStats, CounterStore};

/// Consecutive over-limit requests that escalate into a block.
pub const ESCALATION_THRESHOLD: u32 = 3;

pub const REASON_BLOCKED: &str = "blocked";
pub const REASON_RATE_LIMITED: &str = "rate limit exceeded";
pub const REASON_ESCALATED: &str = "blocked due to repeated violations";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AdmissionOutcome {
    Allowed,
    /// Listed in `exempt_clients`; nothing recorded.
    Exempt,
    RateLimited,
    /// This request tripped the escalation threshold.
    Escalated,
    /// Already blocked before this request.
    Blocked,
    /// Store failed and `on_store_error = deny`.
    Unavailable,
}

impl AdmissionOutcome {
    pub fn as_str(self) -> &'static str {
        match self {
            AdmissionOutcome::Allowed => "allowed",
            AdmissionOutcome::Exempt => "exempt",
            AdmissionOutcome::RateLimited => "rate_limited",
            AdmissionOutcome::Escalated => "escalated",
            AdmissionOutcome::Blocked => "blocked",
            AdmissionOutcome::Unavailable => "unavailable",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AdmissionDecision {
    pub allowed: bool,
    pub outcome: AdmissionOutcome,
    pub reason: &'static str,
    /// Quota left in the current window (allowed requests only).
    pub remaining: u64,
    pub reset_in_ms: u64,
    /// Set on every denial.
    pub retry_after_ms: Option<u64>,
    /// Backend that produced the decision.
    pub backend: &'static str,
    /// The distributed store failed and the failure policy decided.
    pub degraded: bool,
}

impl AdmissionDecision {
    fn allow(remaining: u64, reset_in_ms: u64, backend: &'static str) -> Self {
        Self {
            allowed: true,
            outcome: AdmissionOutcome::Allowed,
            reason: "",
            remaining,
            reset_in_ms,
            retry_after_ms: None,
            backend,
            degraded: false,
        }
    }

    fn deny(outcome: AdmissionOutcome, reason: &'static str, retry_after_ms: u64, backend: &'static str) -> Self {
        Self {
            allowed: false,
            outcome,
            reason,
            remaining: 0,
            reset_in_ms: retry_after_ms,
            retry_after_ms: Some(retry_after_ms),
            backend,
            degraded: false,
        }
    }

    fn exempt() -> Self {
        Self { outcome: AdmissionOutcome::Exempt, ..Self::allow(u64::MAX, 0, "none") }
    }

    fn degraded(mut self) -> Self {
        self.degraded = true;
        self
    }

    /// Boundary view: allowed decisions pass through, denials become the
    /// matching error.
    pub fn into_result(self) -> Result<Self> {
        let retry_after_secs = self.retry_after_ms.unwrap_or(0).div_ceil(1000).max(1);
        match self.outcome {
            AdmissionOutcome::Allowed | AdmissionOutcome::Exempt => Ok(self),
            AdmissionOutcome::RateLimited => Err(RiskGateError::RateLimited { retry_after_secs }),
            AdmissionOutcome::Escalated | AdmissionOutcome::Blocked => {
                Err(RiskGateError::Blocked { retry_after_secs })
            }
            AdmissionOutcome::Unavailable => {
                Err(RiskGateError::Store("admission store unavailable".into()))
            }
        }
    }
}

/// Per-client admission with escalating blocks.
///
/// The distributed store is authoritative when configured; the local store
/// decides otherwise, and also whenever the failure policy says so.
pub struct AdmissionController {
    config: RwLock<Arc<RateLimitConfig>>,
    distributed: Option<Arc<dyn CounterStore>>,
    local: Arc<LocalStore>,
    store_timeout: Duration,
}

impl AdmissionController {
    pub fn new(config: RateLimitConfig) -> Result<Self> {
        Self::with_store(config, None, Duration::from_millis(StoreConfig::default().timeout_ms))
    }

    pub fn with_store(
        config: RateLimitConfig,
        distributed: Option<Arc<dyn CounterStore>>,
        store_timeout: Duration,
    ) -> Result<Self> {
        config.validate()?;
        if config.distributed && distributed.is_none() {
            return Err(RiskGateError::BadRequest(
                "rate_limit.distributed is set but no counter store is configured".into(),
            ));
        }
        Ok(Self {
            config: RwLock::new(Arc::new(config)),
            distributed,
            local: Arc::new(LocalStore::new()),
            store_timeout,
        })
    }

    pub fn config(&self) -> Arc<RateLimitConfig> {
        Arc::clone(&self.config.read().unwrap_or_else(|p| p.into_inner()))
    }

    pub fn update_config(&self, next: RateLimitConfig) -> Result<Arc<RateLimitConfig>> {
        next.validate()?;
        if next.distributed && self.distributed.is_none() {
            return Err(RiskGateError::BadRequest(
                "rate_limit.distributed requires store.redis_url at startup".into(),
            ));
        }
        let next = Arc::new(next);
        *self.config.write().unwrap_or_else(|p| p.into_inner()) = Arc::clone(&next);
        tracing::info!(
            requests_per_window = next.requests_per_window,
            window_ms = next.window_ms,
            distributed = next.distributed,
            "rate limit config updated"
        );
        Ok(next)
    }

    /// Store that currently decides, if the distributed one is in use.
    fn active_distributed(&self, cfg: &RateLimitConfig) -> Option<&Arc<dyn CounterStore>> {
        self.distributed.as_ref().filter(|_| cfg.distributed)
    }

    async fn bounded<T>(&self, fut: impl Future<Output = Result<T>>) -> Result<T> {
        tokio::time::timeout(self.store_timeout, fut)
            .await
            .map_err(|_| RiskGateError::Store(format!("timed out after {:?}", self.store_timeout)))?
    }

    pub async fn allow(&self, client: &str, ctx: &ClientContext) -> AdmissionDecision {
        let cfg = self.config();
        if cfg.exempt_clients.iter().any(|c| c == client) {
            return AdmissionDecision::exempt();
        }
        let now = now_ms();

        let Some(store) = self.active_distributed(&cfg) else {
            return match self.decide(self.local.as_ref(), client, now, &cfg, ctx).await {
                Ok(d) => d,
                Err(e) => {
                    tracing::error!(client = %client, error = %e, "local admission failed");
                    AdmissionDecision::deny(AdmissionOutcome::Unavailable, "admission unavailable", 1000, "local")
                }
            };
        };

        match self.decide(store.as_ref(), client, now, &cfg, ctx).await {
            Ok(d) => d,
            Err(e) => {
                tracing::warn!(
                    client = %client,
                    store = store.name(),
                    policy = ?cfg.on_store_error,
                    error = %e,
                    "counter store failed; applying failure policy"
                );
                match cfg.on_store_error {
                    OnStoreError::Local => {
                        match self.decide(self.local.as_ref(), client, now, &cfg, ctx).await {
                            Ok(d) => d.degraded(),
                            Err(_) => AdmissionDecision::allow(0, 0, "none").degraded(),
                        }
                    }
                    OnStoreError::Allow => AdmissionDecision::allow(0, 0, "none").degraded(),
                    OnStoreError::Deny => AdmissionDecision::deny(
                        AdmissionOutcome::Unavailable,
                        "admission unavailable",
                        1000,
                        store.name(),
                    )
                    .degraded(),
                }
            }
        }
    }

    async fn decide(
        &self,
        store: &dyn CounterStore,
        client: &str,
        now: u64,
        cfg: &RateLimitConfig,
        ctx: &ClientContext,
    ) -> Result<AdmissionDecision> {
        let backend = store.name();

        if let Some(remaining) = self.bounded(store.block_remaining(client, now)).await? {
            tracing::debug!(client = %client, remaining_ms = remaining, "blocked client refused");
            return Ok(AdmissionDecision::deny(AdmissionOutcome::Blocked, REASON_BLOCKED, remaining, backend));
        }

        let wc = self.bounded(store.record(client, now, cfg.window_ms, ctx)).await?;
        let limit = u64::from(cfg.requests_per_window);

        if wc.count <= limit {
            if wc.violations > 0 {
                self.bounded(store.reset_violations(client)).await?;
            }
            return Ok(AdmissionDecision::allow(limit - wc.count, wc.reset_in_ms, backend));
        }

        let violations = self.bounded(store.add_violation(client)).await?;
        if violations >= ESCALATION_THRESHOLD {
            self.bounded(store.block(client, now, cfg.block_duration_ms)).await?;
            tracing::warn!(
                client = %client,
                violations,
                block_ms = cfg.block_duration_ms,
                "client blocked after repeated violations"
            );
            return Ok(AdmissionDecision::deny(
                AdmissionOutcome::Escalated,
                REASON_ESCALATED,
                cfg.block_duration_ms,
                backend,
            ));
        }

        tracing::info!(client = %client, count = wc.count, violations, "rate limit exceeded");
        Ok(AdmissionDecision::deny(
            AdmissionOutcome::RateLimited,
            REASON_RATE_LIMITED,
            wc.reset_in_ms.max(1),
            backend,
        ))
    }

    /// Remaining block time in milliseconds, from the deciding backend.
    pub async fn remaining_block_time(&self, client: &str) -> Result<Option<u64>> {
        let cfg = self.config();
        let now = now_ms();
        match self.active_distributed(&cfg) {
            Some(store) => self.bounded(store.block_remaining(client, now)).await,
            None => self.local.block_remaining(client, now).await,
        }
    }

    pub async fn is_blocked(&self, client: &str) -> Result<bool> {
        Ok(self.remaining_block_time(client).await?.is_some())
    }

    /// Operator override. Clears both backends.
    pub async fn unblock(&self, client: &str) -> Result<()> {
        self.local.unblock(client).await?;
        if let Some(store) = &self.distributed {
            self.bounded(store.unblock(client)).await?;
        }
        tracing::info!(client = %client, "client unblocked");
        Ok(())
    }

    pub async fn get_client_stats(&self, client: &str) -> Result<Option<ClientStats>> {
        let cfg = self.config();
        let now = now_ms();
        if let Some(store) = self.active_distributed(&cfg) {
            if let Some(stats) = self.bounded(store.stats(client, now)).await? {
                return Ok(Some(stats));
            }
        }
        self.local.stats(client, now).await
    }

    /// Periodic cleanup of idle local records; returns how many went away.
    pub async fn sweep(&self) -> Result<usize> {
        let cfg = self.config();
        let now = now_ms();
        let mut removed = self.local.sweep(now, cfg.window_ms).await?;
        if let Some(store) = &self.distributed {
            removed += self.bounded(store.sweep(now, cfg.window_ms)).await?;
        }
        Ok(removed)
    }

    pub fn tracked_local_clients(&self) -> usize {
        self.local.len()
    }
}
