//! Distributed backend on Redis.
//!
//! Keys (with an optional prefix):
//! - `rate_limit:<client>` sorted set of request timestamps (true sliding window)
//! - `client:<client>`     hash of metadata and the violation streak
//! - `block:<client>`      block flag, expiry carried by its TTL
//!
//! Every per-request mutation is a single MULTI/EXEC batch, so concurrent
//! gateway instances observe one consistent count.

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{Client, Pipeline};
use tokio::sync::OnceCell;

use riskgate_core::error::{Result, RiskGateError};

use super::store::{ClientContext, ClientStats, CounterStore, WindowCount};

/// Metadata hashes outlive any sane window or block.
const META_TTL_SECS: u64 = 24 * 3600;

pub struct RedisStore {
    client: Client,
    conn: OnceCell<ConnectionManager>,
    prefix: String,
}

impl RedisStore {
    /// Parses the URL only; the connection is established on first use so a
    /// store outage at boot degrades per `on_store_error` instead of failing.
    pub fn new(url: &str, prefix: &str) -> Result<Self> {
        let client = Client::open(url)
            .map_err(|e| RiskGateError::BadRequest(format!("invalid store.redis_url: {e}")))?;
        Ok(Self { client, conn: OnceCell::new(), prefix: prefix.to_string() })
    }

    async fn conn(&self) -> Result<ConnectionManager> {
        self.conn
            .get_or_try_init(|| async { self.client.get_connection_manager().await })
            .await
            .cloned()
            .map_err(store_err)
    }

    fn window_key(&self, client: &str) -> String {
        format!("{}rate_limit:{client}", self.prefix)
    }

    fn meta_key(&self, client: &str) -> String {
        format!("{}client:{client}", self.prefix)
    }

    fn block_key(&self, client: &str) -> String {
        format!("{}block:{client}", self.prefix)
    }

    /// Evict, insert, count, refresh expiry; plus metadata upkeep.
    /// Replies, in order: ZCARD, oldest entry with score, violations.
    pub fn record_pipeline(
        &self,
        client: &str,
        now_ms: u64,
        window_ms: u64,
        ctx: &ClientContext,
        member: &str,
    ) -> Pipeline {
        let wkey = self.window_key(client);
        let mkey = self.meta_key(client);
        let evict_upto = now_ms.saturating_sub(window_ms);

        let mut p = redis::pipe();
        p.atomic()
            .cmd("ZREMRANGEBYSCORE").arg(&wkey).arg("-inf").arg(evict_upto).ignore()
            .cmd("ZADD").arg(&wkey).arg(now_ms).arg(member).ignore()
            .cmd("ZCARD").arg(&wkey)
            .cmd("ZRANGE").arg(&wkey).arg(0).arg(0).arg("WITHSCORES")
            .cmd("PEXPIRE").arg(&wkey).arg(window_ms).ignore()
            .cmd("HGET").arg(&mkey).arg("violations")
            .cmd("HSETNX").arg(&mkey).arg("first_seen_ms").arg(now_ms).ignore()
            .cmd("HSET").arg(&mkey).arg("last_seen_ms").arg(now_ms).ignore()
            .cmd("HINCRBY").arg(&mkey).arg("total_requests").arg(1).ignore();
        if let Some(ua) = &ctx.user_agent {
            p.cmd("HSET").arg(&mkey).arg("user_agent").arg(ua).ignore();
        }
        if let Some(country) = &ctx.country {
            p.cmd("HSET").arg(&mkey).arg("country").arg(country).ignore();
        }
        p.cmd("EXPIRE").arg(&mkey).arg(META_TTL_SECS).ignore();
        p
    }
}

fn store_err(e: redis::RedisError) -> RiskGateError {
    RiskGateError::Store(e.to_string())
}

fn field<T: std::str::FromStr>(meta: &std::collections::HashMap<String, String>, k: &str) -> Option<T> {
    meta.get(k).and_then(|v| v.parse().ok())
}

#[async_trait]
impl CounterStore for RedisStore {
    fn name(&self) -> &'static str {
        "redis"
    }

    async fn record(
        &self,
        client: &str,
        now_ms: u64,
        window_ms: u64,
        ctx: &ClientContext,
    ) -> Result<WindowCount> {
        let member = format!("{now_ms}-{}", uuid::Uuid::new_v4());
        let mut conn = self.conn().await?;
        let (count, oldest, violations): (u64, Vec<(String, f64)>, Option<u32>) = self
            .record_pipeline(client, now_ms, window_ms, ctx, &member)
            .query_async(&mut conn)
            .await
            .map_err(store_err)?;

        let oldest_ms = oldest.first().map(|(_, score)| *score as u64).unwrap_or(now_ms);
        Ok(WindowCount {
            count,
            reset_in_ms: (oldest_ms + window_ms).saturating_sub(now_ms),
            violations: violations.unwrap_or(0),
        })
    }

    async fn block_remaining(&self, client: &str, _now_ms: u64) -> Result<Option<u64>> {
        let mut conn = self.conn().await?;
        let ttl: i64 = redis::cmd("PTTL")
            .arg(self.block_key(client))
            .query_async(&mut conn)
            .await
            .map_err(store_err)?;
        // -2: no key, -1: no TTL (never written that way by us)
        Ok((ttl > 0).then_some(ttl as u64))
    }

    async fn block(&self, client: &str, now_ms: u64, duration_ms: u64) -> Result<()> {
        let mkey = self.meta_key(client);
        let mut conn = self.conn().await?;
        redis::pipe()
            .atomic()
            .cmd("SET").arg(self.block_key(client)).arg(1).arg("PX").arg(duration_ms).ignore()
            .cmd("HSET").arg(&mkey)
                .arg("blocked").arg(1)
                .arg("block_expires_ms").arg(now_ms.saturating_add(duration_ms))
                .arg("violations").arg(0)
                .ignore()
            .query_async::<_, ()>(&mut conn)
            .await
            .map_err(store_err)
    }

    async fn unblock(&self, client: &str) -> Result<()> {
        let mkey = self.meta_key(client);
        let mut conn = self.conn().await?;
        redis::pipe()
            .atomic()
            .cmd("DEL").arg(self.block_key(client)).ignore()
            .cmd("HSET").arg(&mkey).arg("blocked").arg(0).arg("violations").arg(0).ignore()
            .cmd("HDEL").arg(&mkey).arg("block_expires_ms").ignore()
            .query_async::<_, ()>(&mut conn)
            .await
            .map_err(store_err)
    }

    async fn add_violation(&self, client: &str) -> Result<u32> {
        let mkey = self.meta_key(client);
        let mut conn = self.conn().await?;
        let (violations,): (u32,) = redis::pipe()
            .atomic()
            .cmd("HINCRBY").arg(&mkey).arg("violations").arg(1)
            .cmd("HINCRBY").arg(&mkey).arg("denied_requests").arg(1).ignore()
            .query_async(&mut conn)
            .await
            .map_err(store_err)?;
        Ok(violations)
    }

    async fn reset_violations(&self, client: &str) -> Result<()> {
        let mut conn = self.conn().await?;
        redis::cmd("HSET")
            .arg(self.meta_key(client))
            .arg("violations")
            .arg(0)
            .query_async::<_, ()>(&mut conn)
            .await
            .map_err(store_err)
    }

    async fn stats(&self, client: &str, now_ms: u64) -> Result<Option<ClientStats>> {
        let mut conn = self.conn().await?;
        let (meta, count, oldest, ttl): (
            std::collections::HashMap<String, String>,
            u64,
            Vec<(String, f64)>,
            i64,
        ) = redis::pipe()
            .cmd("HGETALL").arg(self.meta_key(client))
            .cmd("ZCARD").arg(self.window_key(client))
            .cmd("ZRANGE").arg(self.window_key(client)).arg(0).arg(0).arg("WITHSCORES")
            .cmd("PTTL").arg(self.block_key(client))
            .query_async(&mut conn)
            .await
            .map_err(store_err)?;

        if meta.is_empty() && count == 0 {
            return Ok(None);
        }
        let blocked = ttl > 0;
        Ok(Some(ClientStats {
            client_id: client.to_string(),
            backend: self.name(),
            request_count: count,
            window_start_ms: oldest.first().map(|(_, s)| *s as u64).unwrap_or(now_ms),
            first_seen_ms: field(&meta, "first_seen_ms").unwrap_or(0),
            last_seen_ms: field(&meta, "last_seen_ms").unwrap_or(0),
            total_requests: field(&meta, "total_requests").unwrap_or(0),
            denied_requests: field(&meta, "denied_requests").unwrap_or(0),
            violations: field(&meta, "violations").unwrap_or(0),
            blocked,
            block_expires_ms: blocked.then_some(now_ms.saturating_add(ttl as u64)),
            user_agent: meta.get("user_agent").cloned(),
            country: meta.get("country").cloned(),
        }))
    }
}
