//! In-process fallback backend.
//!
//! Fixed window: the count resets wholesale once `window_ms` has passed since
//! the window started. Good enough for one instance or as a degraded mode;
//! instances do not share counts.

use async_trait::async_trait;
use dashmap::DashMap;

use riskgate_core::error::Result;

use super::store::{ClientContext, ClientStats, CounterStore, WindowCount};

#[derive(Debug, Clone, Default)]
struct ClientRecord {
    request_count: u64,
    window_start_ms: u64,
    first_seen_ms: u64,
    last_seen_ms: u64,
    total_requests: u64,
    denied_requests: u64,
    violations: u32,
    blocked_until_ms: Option<u64>,
    user_agent: Option<String>,
    country: Option<String>,
}

impl ClientRecord {
    fn block_remaining(&self, now_ms: u64) -> Option<u64> {
        self.blocked_until_ms
            .filter(|until| *until > now_ms)
            .map(|until| until - now_ms)
    }
}

/// `DashMap` entry guards make each read-modify-write atomic per client.
#[derive(Debug, Default)]
pub struct LocalStore {
    clients: DashMap<String, ClientRecord>,
}

impl LocalStore {
    pub fn new() -> Self {
        Self { clients: DashMap::new() }
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}

#[async_trait]
impl CounterStore for LocalStore {
    fn name(&self) -> &'static str {
        "local"
    }

    async fn record(
        &self,
        client: &str,
        now_ms: u64,
        window_ms: u64,
        ctx: &ClientContext,
    ) -> Result<WindowCount> {
        let mut rec = self.clients.entry(client.to_string()).or_insert_with(|| ClientRecord {
            window_start_ms: now_ms,
            first_seen_ms: now_ms,
            ..ClientRecord::default()
        });

        if now_ms.saturating_sub(rec.window_start_ms) >= window_ms {
            rec.request_count = 0;
            rec.window_start_ms = now_ms;
        }
        rec.request_count += 1;
        rec.total_requests += 1;
        rec.last_seen_ms = now_ms;
        if ctx.user_agent.is_some() {
            rec.user_agent = ctx.user_agent.clone();
        }
        if ctx.country.is_some() {
            rec.country = ctx.country.clone();
        }

        Ok(WindowCount {
            count: rec.request_count,
            reset_in_ms: (rec.window_start_ms + window_ms).saturating_sub(now_ms),
            violations: rec.violations,
        })
    }

    async fn block_remaining(&self, client: &str, now_ms: u64) -> Result<Option<u64>> {
        let Some(mut rec) = self.clients.get_mut(client) else { return Ok(None) };
        let remaining = rec.block_remaining(now_ms);
        if remaining.is_none() && rec.blocked_until_ms.is_some() {
            // lapsed
            rec.blocked_until_ms = None;
        }
        Ok(remaining)
    }

    async fn block(&self, client: &str, now_ms: u64, duration_ms: u64) -> Result<()> {
        let mut rec = self.clients.entry(client.to_string()).or_default();
        rec.blocked_until_ms = Some(now_ms.saturating_add(duration_ms));
        rec.violations = 0;
        Ok(())
    }

    async fn unblock(&self, client: &str) -> Result<()> {
        if let Some(mut rec) = self.clients.get_mut(client) {
            rec.blocked_until_ms = None;
            rec.violations = 0;
        }
        Ok(())
    }

    async fn add_violation(&self, client: &str) -> Result<u32> {
        let mut rec = self.clients.entry(client.to_string()).or_default();
        rec.violations += 1;
        rec.denied_requests += 1;
        Ok(rec.violations)
    }

    async fn reset_violations(&self, client: &str) -> Result<()> {
        if let Some(mut rec) = self.clients.get_mut(client) {
            rec.violations = 0;
        }
        Ok(())
    }

    async fn stats(&self, client: &str, now_ms: u64) -> Result<Option<ClientStats>> {
        Ok(self.clients.get(client).map(|rec| {
            let remaining = rec.block_remaining(now_ms);
            ClientStats {
                client_id: client.to_string(),
                backend: self.name(),
                request_count: rec.request_count,
                window_start_ms: rec.window_start_ms,
                first_seen_ms: rec.first_seen_ms,
                last_seen_ms: rec.last_seen_ms,
                total_requests: rec.total_requests,
                denied_requests: rec.denied_requests,
                violations: rec.violations,
                blocked: remaining.is_some(),
                block_expires_ms: remaining.map(|r| now_ms.saturating_add(r)),
                user_agent: rec.user_agent.clone(),
                country: rec.country.clone(),
            }
        }))
    }

    /// Forget clients idle for two windows with no active block.
    async fn sweep(&self, now_ms: u64, window_ms: u64) -> Result<usize> {
        let before = self.clients.len();
        let idle_after = window_ms.saturating_mul(2);
        self.clients.retain(|_, rec| {
            rec.block_remaining(now_ms).is_some()
                || now_ms.saturating_sub(rec.last_seen_ms) < idle_after
        });
        Ok(before.saturating_sub(self.clients.len()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WINDOW: u64 = 1_000;

    #[tokio::test]
    async fn counts_reset_when_window_rolls_over() {
        let s = LocalStore::new();
        let ctx = ClientContext::default();
        assert_eq!(s.record("c", 0, WINDOW, &ctx).await.unwrap().count, 1);
        let wc = s.record("c", 400, WINDOW, &ctx).await.unwrap();
        assert_eq!(wc.count, 2);
        assert_eq!(wc.reset_in_ms, 600);
        assert_eq!(s.record("c", 1_000, WINDOW, &ctx).await.unwrap().count, 1);
    }

    #[tokio::test]
    async fn block_lapses_on_its_own() {
        let s = LocalStore::new();
        s.block("c", 0, 500).await.unwrap();
        assert_eq!(s.block_remaining("c", 100).await.unwrap(), Some(400));
        assert_eq!(s.block_remaining("c", 500).await.unwrap(), None);
        assert!(!s.stats("c", 500).await.unwrap().unwrap().blocked);
    }

    #[tokio::test]
    async fn block_restarts_violation_streak() {
        let s = LocalStore::new();
        s.add_violation("c").await.unwrap();
        assert_eq!(s.add_violation("c").await.unwrap(), 2);
        s.block("c", 0, 500).await.unwrap();
        assert_eq!(s.add_violation("c").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn sweep_keeps_blocked_and_recent_clients() {
        let s = LocalStore::new();
        let ctx = ClientContext::default();
        s.record("idle", 0, WINDOW, &ctx).await.unwrap();
        s.record("blocked", 0, WINDOW, &ctx).await.unwrap();
        s.block("blocked", 0, 60_000).await.unwrap();
        s.record("recent", 2_500, WINDOW, &ctx).await.unwrap();

        assert_eq!(s.sweep(3_000, WINDOW).await.unwrap(), 1);
        assert!(s.stats("idle", 3_000).await.unwrap().is_none());
        assert_eq!(s.len(), 2);
    }

    #[tokio::test]
    async fn context_is_kept_in_stats() {
        let s = LocalStore::new();
        let ctx = ClientContext {
            user_agent: Some("curl/8".into()),
            country: Some("NL".into()),
        };
        s.record("c", 10, WINDOW, &ctx).await.unwrap();
        s.record("c", 20, WINDOW, &ClientContext::default()).await.unwrap();
        let st = s.stats("c", 20).await.unwrap().unwrap();
        assert_eq!(st.user_agent.as_deref(), Some("curl/8"));
        assert_eq!(st.country.as_deref(), Some("NL"));
        assert_eq!(st.first_seen_ms, 10);
        assert_eq!(st.total_requests, 2);
    }
}
