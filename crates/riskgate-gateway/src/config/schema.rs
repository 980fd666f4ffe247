use jsonwebtoken::Algorithm;
use serde::{Deserialize, Serialize};
use riskgate_core::error::{Result, RiskGateError};

use crate::policy::model::{Permission, Policy, Role};

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GatewayConfig {
    pub version: u32,

    #[serde(default)]
    pub gateway: GatewaySection,

    #[serde(default)]
    pub auth: AuthConfig,

    #[serde(default)]
    pub rate_limit: RateLimitConfig,

    #[serde(default)]
    pub store: StoreConfig,

    /// Seed data for the policy engine. `None` seeds the built-in baseline.
    #[serde(default)]
    pub bootstrap: Option<BootstrapConfig>,
}

impl GatewayConfig {
    pub fn validate(&self) -> Result<()> {
        if self.version != 1 {
            return Err(RiskGateError::UnsupportedVersion);
        }

        self.gateway.validate()?;
        self.auth.validate()?;
        self.rate_limit.validate()?;
        self.store.validate()?;

        if self.rate_limit.distributed && self.store.redis_url.is_none() {
            return Err(RiskGateError::BadRequest(
                "rate_limit.distributed requires store.redis_url".into(),
            ));
        }
        Ok(())
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            version: 1,
            gateway: GatewaySection::default(),
            auth: AuthConfig::default(),
            rate_limit: RateLimitConfig::default(),
            store: StoreConfig::default(),
            bootstrap: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GatewaySection {
    #[serde(default = "default_listen")]
    pub listen: String,

    /// Period of the background sweep (token cache, revocations, admission).
    #[serde(default = "default_maintenance_interval_ms")]
    pub maintenance_interval_ms: u64,

    /// RSA private key (PKCS#1 or PKCS#8 PEM). A fresh key pair is generated
    /// at startup when unset.
    #[serde(default)]
    pub signing_key_path: Option<String>,
}

impl Default for GatewaySection {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            maintenance_interval_ms: default_maintenance_interval_ms(),
            signing_key_path: None,
        }
    }
}

impl GatewaySection {
    pub fn validate(&self) -> Result<()> {
        if !(1000..=3_600_000).contains(&self.maintenance_interval_ms) {
            return Err(RiskGateError::BadRequest(
                "gateway.maintenance_interval_ms must be between 1000 and 3600000".into(),
            ));
        }
        Ok(())
    }
}

fn default_listen() -> String {
    "0.0.0.0:8080".into()
}
fn default_maintenance_interval_ms() -> u64 {
    30_000
}

/// One year. Upper bound for both token lifetimes.
pub const MAX_TOKEN_LIFETIME_SECS: u64 = 365 * 24 * 3600;
/// Clock skew tolerated on `exp`/`nbf`.
pub const MAX_LEEWAY_SECS: u64 = 300;
/// One day.
pub const MAX_WINDOW_MS: u64 = 24 * 3600 * 1000;
/// Thirty days.
pub const MAX_BLOCK_DURATION_MS: u64 = 30 * 24 * 3600 * 1000;

/// Token service configuration. Also the body of `GET/PUT /admin/auth/config`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AuthConfig {
    #[serde(default = "default_token_expiry_secs")]
    pub token_expiry_secs: u64,
    #[serde(default = "default_refresh_expiry_secs")]
    pub refresh_expiry_secs: u64,
    #[serde(default = "default_issuer")]
    pub issuer: String,
    #[serde(default = "default_audience")]
    pub audience: String,
    #[serde(default = "default_algorithm")]
    pub algorithm: Algorithm,
    #[serde(default = "yes")]
    pub cache_enabled: bool,
    #[serde(default = "default_cache_expiry_secs")]
    pub cache_expiry_secs: u64,
    #[serde(default = "yes")]
    pub revocation_list: bool,
    #[serde(default)]
    pub leeway_secs: u64,
    #[serde(default = "default_password_min_length")]
    pub password_min_length: usize,
    #[serde(default = "yes")]
    pub password_require_strength: bool,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            token_expiry_secs: default_token_expiry_secs(),
            refresh_expiry_secs: default_refresh_expiry_secs(),
            issuer: default_issuer(),
            audience: default_audience(),
            algorithm: default_algorithm(),
            cache_enabled: true,
            cache_expiry_secs: default_cache_expiry_secs(),
            revocation_list: true,
            leeway_secs: 0,
            password_min_length: default_password_min_length(),
            password_require_strength: true,
        }
    }
}

impl AuthConfig {
    pub fn validate(&self) -> Result<()> {
        if self.token_expiry_secs == 0 {
            return Err(RiskGateError::BadRequest("auth.token_expiry_secs must be > 0".into()));
        }
        if self.refresh_expiry_secs > MAX_TOKEN_LIFETIME_SECS {
            return Err(RiskGateError::BadRequest(format!(
                "auth.refresh_expiry_secs must be <= {MAX_TOKEN_LIFETIME_SECS}"
            )));
        }
        if self.refresh_expiry_secs < self.token_expiry_secs {
            return Err(RiskGateError::BadRequest(
                "auth.refresh_expiry_secs must be >= token_expiry_secs".into(),
            ));
        }
        if self.issuer.trim().is_empty() || self.audience.trim().is_empty() {
            return Err(RiskGateError::BadRequest(
                "auth.issuer and auth.audience must not be empty".into(),
            ));
        }
        if !is_rsa_family(self.algorithm) {
            return Err(RiskGateError::BadRequest(format!(
                "auth.algorithm {:?} is not an RSA signing algorithm",
                self.algorithm
            )));
        }
        if self.cache_enabled && self.cache_expiry_secs == 0 {
            return Err(RiskGateError::BadRequest(
                "auth.cache_expiry_secs must be > 0 when the cache is enabled".into(),
            ));
        }
        if self.leeway_secs > MAX_LEEWAY_SECS {
            return Err(RiskGateError::BadRequest(format!(
                "auth.leeway_secs must be <= {MAX_LEEWAY_SECS}"
            )));
        }
        if !(8..=256).contains(&self.password_min_length) {
            return Err(RiskGateError::BadRequest(
                "auth.password_min_length must be between 8 and 256".into(),
            ));
        }
        Ok(())
    }
}

/// Signing algorithms usable with the generated RSA key pair.
pub fn is_rsa_family(alg: Algorithm) -> bool {
    matches!(
        alg,
        Algorithm::RS256
            | Algorithm::RS384
            | Algorithm::RS512
            | Algorithm::PS256
            | Algorithm::PS384
            | Algorithm::PS512
    )
}

fn yes() -> bool {
    true
}
fn default_token_expiry_secs() -> u64 {
    900
}
fn default_refresh_expiry_secs() -> u64 {
    7 * 24 * 3600
}
fn default_issuer() -> String {
    "riskgate".into()
}
fn default_audience() -> String {
    "risk-platform".into()
}
fn default_algorithm() -> Algorithm {
    Algorithm::RS256
}
fn default_cache_expiry_secs() -> u64 {
    300
}
fn default_password_min_length() -> usize {
    12
}

/// What the admission controller does when the distributed store errors or
/// times out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OnStoreError {
    /// Decide with the in-process backend instead.
    Local,
    /// Fail open: admit the request.
    Allow,
    /// Fail closed: deny the request.
    Deny,
}

impl OnStoreError {
    pub fn as_str(self) -> &'static str {
        match self {
            OnStoreError::Local => "local",
            OnStoreError::Allow => "allow",
            OnStoreError::Deny => "deny",
        }
    }
}

/// Admission configuration. Also the body of `GET/PUT /admin/rate-limit/config`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RateLimitConfig {
    #[serde(default = "default_requests_per_window", alias = "requests_per_minute")]
    pub requests_per_window: u32,
    #[serde(default = "default_burst")]
    pub burst: u32,
    #[serde(default = "default_window_ms")]
    pub window_ms: u64,
    #[serde(default = "default_block_duration_ms")]
    pub block_duration_ms: u64,
    #[serde(default)]
    pub distributed: bool,
    #[serde(default = "yes")]
    pub local_fallback: bool,
    #[serde(default = "default_on_store_error")]
    pub on_store_error: OnStoreError,
    #[serde(default)]
    pub exempt_clients: Vec<String>,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            requests_per_window: default_requests_per_window(),
            burst: default_burst(),
            window_ms: default_window_ms(),
            block_duration_ms: default_block_duration_ms(),
            distributed: false,
            local_fallback: true,
            on_store_error: default_on_store_error(),
            exempt_clients: Vec::new(),
        }
    }
}

impl RateLimitConfig {
    pub fn validate(&self) -> Result<()> {
        if self.requests_per_window == 0 {
            return Err(RiskGateError::BadRequest(
                "rate_limit.requests_per_window must be > 0".into(),
            ));
        }
        if self.burst > self.requests_per_window {
            return Err(RiskGateError::BadRequest(
                "rate_limit.burst must not exceed requests_per_window".into(),
            ));
        }
        if !(100..=MAX_WINDOW_MS).contains(&self.window_ms) {
            return Err(RiskGateError::BadRequest(format!(
                "rate_limit.window_ms must be between 100 and {MAX_WINDOW_MS}"
            )));
        }
        if !(100..=MAX_BLOCK_DURATION_MS).contains(&self.block_duration_ms) {
            return Err(RiskGateError::BadRequest(format!(
                "rate_limit.block_duration_ms must be between 100 and {MAX_BLOCK_DURATION_MS}"
            )));
        }
        if !self.distributed && !self.local_fallback {
            return Err(RiskGateError::BadRequest(
                "rate_limit needs at least one backend (distributed or local_fallback)".into(),
            ));
        }
        if self.on_store_error == OnStoreError::Local && self.distributed && !self.local_fallback {
            return Err(RiskGateError::BadRequest(
                "rate_limit.on_store_error=local requires local_fallback".into(),
            ));
        }
        Ok(())
    }
}

fn default_requests_per_window() -> u32 {
    100
}
fn default_burst() -> u32 {
    20
}
fn default_window_ms() -> u64 {
    60_000
}
fn default_block_duration_ms() -> u64 {
    15 * 60_000
}
fn default_on_store_error() -> OnStoreError {
    OnStoreError::Local
}

/// Distributed counter store connection.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StoreConfig {
    #[serde(default)]
    pub redis_url: Option<String>,
    #[serde(default)]
    pub key_prefix: String,
    #[serde(default = "default_store_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            redis_url: None,
            key_prefix: String::new(),
            timeout_ms: default_store_timeout_ms(),
        }
    }
}

impl StoreConfig {
    pub fn validate(&self) -> Result<()> {
        if !(10..=10_000).contains(&self.timeout_ms) {
            return Err(RiskGateError::BadRequest(
                "store.timeout_ms must be between 10 and 10000".into(),
            ));
        }
        Ok(())
    }
}

fn default_store_timeout_ms() -> u64 {
    250
}

/// Policy engine seed data.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BootstrapConfig {
    #[serde(default)]
    pub permissions: Vec<Permission>,
    #[serde(default)]
    pub roles: Vec<Role>,
    #[serde(default)]
    pub policies: Vec<Policy>,
}
