//! Counter store capability shared by the local and distributed backends.

use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use serde::Serialize;

use riskgate_core::error::Result;

/// Request metadata recorded alongside the counter.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClientContext {
    pub user_agent: Option<String>,
    pub country: Option<String>,
}

/// State right after recording one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowCount {
    /// Requests in the current window, this one included.
    pub count: u64,
    /// Until the window frees capacity again.
    pub reset_in_ms: u64,
    /// Consecutive violations before this request.
    pub violations: u32,
}

/// Per-client view for operators (`GET /admin/rate-limit/clients/{id}`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ClientStats {
    pub client_id: String,
    pub backend: &'static str,
    pub request_count: u64,
    pub window_start_ms: u64,
    pub first_seen_ms: u64,
    pub last_seen_ms: u64,
    pub total_requests: u64,
    pub denied_requests: u64,
    pub violations: u32,
    pub blocked: bool,
    pub block_expires_ms: Option<u64>,
    pub user_agent: Option<String>,
    pub country: Option<String>,
}

/// Record-and-check capability.
///
/// Every method is atomic per client; no ordering is promised across
/// clients.
#[async_trait]
pub trait CounterStore: Send + Sync {
    fn name(&self) -> &'static str;

    /// Record one request at `now_ms` and count the window it falls in.
    async fn record(
        &self,
        client: &str,
        now_ms: u64,
        window_ms: u64,
        ctx: &ClientContext,
    ) -> Result<WindowCount>;

    /// Remaining block time, or `None` when not blocked (or the block lapsed).
    async fn block_remaining(&self, client: &str, now_ms: u64) -> Result<Option<u64>>;

    /// Block for `duration_ms`; consecutive violations start over.
    async fn block(&self, client: &str, now_ms: u64, duration_ms: u64) -> Result<()>;

    /// Clear the block and the violation streak.
    async fn unblock(&self, client: &str) -> Result<()>;

    /// Count one denied request; returns the streak including it.
    async fn add_violation(&self, client: &str) -> Result<u32>;

    async fn reset_violations(&self, client: &str) -> Result<()>;

    async fn stats(&self, client: &str, now_ms: u64) -> Result<Option<ClientStats>>;

    /// Drop idle state. Stores with native expiry have nothing to do.
    async fn sweep(&self, _now_ms: u64, _window_ms: u64) -> Result<usize> {
        Ok(0)
    }
}

pub fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
