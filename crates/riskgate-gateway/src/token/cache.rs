//! Concurrent token cache and revocation list.
//!
//! Both are `DashMap`s so validations (the hot path) never contend on a
//! global lock with issuance, revocation or the periodic sweep.

use dashmap::DashMap;

use riskgate_core::claims::TokenClaims;

#[derive(Debug, Clone)]
pub struct CachedClaims {
    pub claims: TokenClaims,
    /// Unix seconds; never later than the token's own `exp`.
    pub expires_at: u64,
}

impl CachedClaims {
    pub fn is_live(&self, now: u64) -> bool {
        now < self.expires_at
    }
}

/// Claims keyed by the exact token string.
#[derive(Debug, Default)]
pub struct TokenCache {
    entries: DashMap<String, CachedClaims>,
}

impl TokenCache {
    pub fn new() -> Self {
        Self { entries: DashMap::new() }
    }

    pub fn insert(&self, token: &str, claims: TokenClaims, ttl_secs: u64, now: u64) {
        let expires_at = now.saturating_add(ttl_secs).min(claims.exp);
        self.entries.insert(token.to_string(), CachedClaims { claims, expires_at });
    }

    /// Live hit, or `None`. A stale entry is dropped on the way out.
    pub fn get_live(&self, token: &str, now: u64) -> Option<TokenClaims> {
        let hit = self.entries.get(token).map(|e| e.value().clone())?;
        if hit.is_live(now) {
            return Some(hit.claims);
        }
        self.entries.remove_if(token, |_, e| !e.is_live(now));
        None
    }

    pub fn remove(&self, token: &str) -> Option<CachedClaims> {
        self.entries.remove(token).map(|(_, e)| e)
    }

    /// Drop entries past their expiry. Returns how many were removed.
    pub fn sweep(&self, now: u64) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, e| e.is_live(now));
        before.saturating_sub(self.entries.len())
    }

    pub fn clear(&self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Revoked token ids (`jti`) with the time their token would have expired.
#[derive(Debug, Default)]
pub struct RevocationList {
    revoked: DashMap<String, u64>,
}

impl RevocationList {
    pub fn new() -> Self {
        Self { revoked: DashMap::new() }
    }

    pub fn revoke(&self, jti: &str, token_exp: u64) {
        self.revoked.insert(jti.to_string(), token_exp);
    }

    pub fn is_revoked(&self, jti: &str) -> bool {
        self.revoked.contains_key(jti)
    }

    /// Entries whose token has expired anyway are no longer needed.
    pub fn sweep(&self, now: u64) -> usize {
        let before = self.revoked.len();
        self.revoked.retain(|_, exp| *exp > now);
        before.saturating_sub(self.revoked.len())
    }

    pub fn len(&self) -> usize {
        self.revoked.len()
    }

    pub fn is_empty(&self) -> bool {
        self.revoked.is_empty()
    }
}
