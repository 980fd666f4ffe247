//! Shared application state for the riskgate gateway.
//!
//! Owns the triad (token service, policy engine, admission controller) plus
//! metrics. Everything is constructed here and injected; handlers only see
//! cheap `Arc` clones.

use std::sync::Arc;
use std::time::Duration;

use riskgate_core::error::{Result, RiskGateError};

use crate::admission::{AdmissionController, CounterStore, RedisStore};
use crate::config::GatewayConfig;
use crate::obs::GatewayMetrics;
use crate::policy::{bootstrap, PolicyEngine};
use crate::token::{KeyPair, TokenService};

#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    tokens: Arc<TokenService>,
    policy: Arc<PolicyEngine>,
    admission: Arc<AdmissionController>,
    metrics: Arc<GatewayMetrics>,
}

impl AppState {
    /// Build application state.
    /// Returns Result so main can handle errors gracefully (no panic).
    pub fn new(cfg: GatewayConfig) -> Result<Self> {
        let keys = match &cfg.gateway.signing_key_path {
            Some(path) => {
                let pem = std::fs::read_to_string(path).map_err(|e| {
                    RiskGateError::BadRequest(format!("gateway.signing_key_path {path}: {e}"))
                })?;
                KeyPair::from_private_pem(&pem)?
            }
            None => {
                tracing::warn!("no signing key configured; generated an ephemeral key pair");
                KeyPair::generate()?
            }
        };
        Self::with_keys(cfg, keys)
    }

    /// Same as `new` with caller-supplied key material.
    pub fn with_keys(cfg: GatewayConfig, keys: KeyPair) -> Result<Self> {
        let tokens = TokenService::with_keys(cfg.auth.clone(), keys)?;
        let policy = PolicyEngine::new(bootstrap::from_config(cfg.bootstrap.as_ref())?);

        let distributed = match &cfg.store.redis_url {
            Some(url) => {
                let store: Arc<dyn CounterStore> = Arc::new(RedisStore::new(url, &cfg.store.key_prefix)?);
                Some(store)
            }
            None => None,
        };
        let admission = AdmissionController::with_store(
            cfg.rate_limit.clone(),
            distributed,
            Duration::from_millis(cfg.store.timeout_ms),
        )?;

        tracing::info!(
            kid = %tokens.keys().kid(),
            roles = policy.list_roles().len(),
            policies = policy.list_policies().len(),
            distributed = cfg.rate_limit.distributed,
            "gateway state ready"
        );

        Ok(Self {
            inner: Arc::new(AppStateInner {
                tokens: Arc::new(tokens),
                policy: Arc::new(policy),
                admission: Arc::new(admission),
                metrics: Arc::new(GatewayMetrics::default()),
            }),
        })
    }

    pub fn tokens(&self) -> &Arc<TokenService> {
        &self.inner.tokens
    }

    pub fn policy(&self) -> &Arc<PolicyEngine> {
        &self.inner.policy
    }

    pub fn admission(&self) -> &Arc<AdmissionController> {
        &self.inner.admission
    }

    pub fn metrics(&self) -> &Arc<GatewayMetrics> {
        &self.inner.metrics
    }

    pub fn set_draining(&self) {
        self.inner.metrics.set_draining();
    }

    pub fn is_draining(&self) -> bool {
        self.inner.metrics.is_draining()
    }

    /// Point-in-time sizes rendered next to the counters on `/metrics`.
    pub fn metrics_extra(&self) -> Vec<(&'static str, u64)> {
        let snapshot = self.inner.policy.snapshot();
        vec![
            ("riskgate_cached_tokens", self.inner.tokens.cached_tokens() as u64),
            ("riskgate_revoked_tokens", self.inner.tokens.revoked_tokens() as u64),
            ("riskgate_admission_local_clients", self.inner.admission.tracked_local_clients() as u64),
            ("riskgate_policy_roles", snapshot.roles().len() as u64),
            ("riskgate_policy_policies", snapshot.policies().len() as u64),
        ]
    }
}
