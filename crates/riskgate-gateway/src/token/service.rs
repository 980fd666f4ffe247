use std::sync::{Arc, RwLock};

use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, get_current_timestamp, Header, Validation};
use serde::Serialize;

use riskgate_core::claims::{Identity, TokenClaims, TokenType};
use riskgate_core::error::{Result, RiskGateError, TokenError};

use crate::config::schema::AuthConfig;

use super::cache::{RevocationList, TokenCache};
use super::keys::KeyPair;
use super::password::{PasswordError, PasswordPolicy};

/// Result of `issue_token_pair`.
#[derive(Debug, Clone, Serialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: &'static str,
    /// Access token lifetime in seconds.
    pub expires_in: u64,
    pub refresh_expires_in: u64,
}

/// What one sweep removed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub cache_entries: usize,
    pub revocations: usize,
}

/// Issues, validates, refreshes and revokes signed identity tokens.
pub struct TokenService {
    keys: KeyPair,
    config: RwLock<Arc<AuthConfig>>,
    cache: TokenCache,
    revoked: RevocationList,
}

impl TokenService {
    /// Generates a fresh key pair.
    pub fn new(config: AuthConfig) -> Result<Self> {
        Self::with_keys(config, KeyPair::generate()?)
    }

    pub fn with_keys(config: AuthConfig, keys: KeyPair) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            keys,
            config: RwLock::new(Arc::new(config)),
            cache: TokenCache::new(),
            revoked: RevocationList::new(),
        })
    }

    pub fn config(&self) -> Arc<AuthConfig> {
        // Writers swap a whole Arc, so a poisoned lock still guards a consistent value.
        Arc::clone(&self.config.read().unwrap_or_else(|p| p.into_inner()))
    }

    /// Validate and swap the live configuration. Cached claims are dropped so
    /// nothing admitted under the old issuer/audience/algorithm survives.
    pub fn update_config(&self, next: AuthConfig) -> Result<()> {
        next.validate()?;
        *self.config.write().unwrap_or_else(|p| p.into_inner()) = Arc::new(next);
        self.cache.clear();
        tracing::info!("auth configuration updated, token cache cleared");
        Ok(())
    }

    pub fn keys(&self) -> &KeyPair {
        &self.keys
    }

    pub fn jwks(&self) -> serde_json::Value {
        let alg = self.config().algorithm;
        serde_json::json!({ "keys": [self.keys.public_jwk(alg)] })
    }

    pub fn issue_token_pair(&self, identity: &Identity) -> Result<TokenPair> {
        let cfg = self.config();
        let now = get_current_timestamp();

        let access = self.claims_for(&cfg, identity, TokenType::Access, now, cfg.token_expiry_secs);
        let refresh =
            self.claims_for(&cfg, identity, TokenType::Refresh, now, cfg.refresh_expiry_secs);

        let access_token = self.sign(&cfg, &access)?;
        let refresh_token = self.sign(&cfg, &refresh)?;

        if cfg.cache_enabled {
            self.cache.insert(&access_token, access, cfg.cache_expiry_secs, now);
        }

        tracing::debug!(user = %identity.user_id, "token pair issued");
        Ok(TokenPair {
            access_token,
            refresh_token,
            token_type: "Bearer",
            expires_in: cfg.token_expiry_secs,
            refresh_expires_in: cfg.refresh_expiry_secs,
        })
    }

    fn claims_for(
        &self,
        cfg: &AuthConfig,
        identity: &Identity,
        token_type: TokenType,
        now: u64,
        lifetime_secs: u64,
    ) -> TokenClaims {
        TokenClaims {
            sub: identity.user_id.clone(),
            iss: cfg.issuer.clone(),
            aud: cfg.audience.clone(),
            iat: now,
            exp: now.saturating_add(lifetime_secs),
            nbf: now,
            jti: uuid::Uuid::new_v4().to_string(),
            user_id: identity.user_id.clone(),
            username: identity.username.clone(),
            email: identity.email.clone(),
            roles: identity.roles.clone(),
            permissions: identity.permissions.clone(),
            token_type,
        }
    }

    fn sign(&self, cfg: &AuthConfig, claims: &TokenClaims) -> Result<String> {
        let mut header = Header::new(cfg.algorithm);
        header.kid = Some(self.keys.kid().to_string());
        encode(&header, claims, self.keys.encoding_key())
            .map_err(|e| RiskGateError::Internal(format!("token signing failed: {e}")))
    }

    /// Claims of a valid token, or the reason it is not.
    pub fn validate_token(&self, token: &str) -> std::result::Result<TokenClaims, TokenError> {
        let cfg = self.config();
        let now = get_current_timestamp();

        if cfg.cache_enabled {
            if let Some(claims) = self.cache.get_live(token, now) {
                self.ensure_not_revoked(&cfg, &claims)?;
                tracing::trace!(user = %claims.user_id, "token served from cache");
                return Ok(claims);
            }
        }

        let claims = self.verify(&cfg, token)?;
        self.ensure_not_revoked(&cfg, &claims)?;

        if cfg.cache_enabled {
            self.cache.insert(token, claims.clone(), cfg.cache_expiry_secs, now);
        }
        Ok(claims)
    }

    /// `validate_token` restricted to access tokens: the bearer credential on
    /// every guarded route. Refresh tokens are only good for `refresh_token`.
    pub fn validate_access_token(&self, token: &str) -> std::result::Result<TokenClaims, TokenError> {
        let claims = self.validate_token(token)?;
        if claims.token_type != TokenType::Access {
            return Err(TokenError::TokenInvalid("not an access token".into()));
        }
        Ok(claims)
    }

    fn ensure_not_revoked(
        &self,
        cfg: &AuthConfig,
        claims: &TokenClaims,
    ) -> std::result::Result<(), TokenError> {
        if cfg.revocation_list && self.revoked.is_revoked(&claims.jti) {
            return Err(TokenError::TokenRevoked);
        }
        Ok(())
    }

    fn verify(&self, cfg: &AuthConfig, token: &str) -> std::result::Result<TokenClaims, TokenError> {
        let mut validation = Validation::new(cfg.algorithm);
        validation.leeway = cfg.leeway_secs;
        validation.validate_exp = true;
        validation.validate_nbf = true;
        validation.set_issuer(&[cfg.issuer.as_str()]);
        validation.set_audience(&[cfg.audience.as_str()]);
        validation.set_required_spec_claims(&["exp", "nbf", "iss", "aud", "sub"]);

        decode::<TokenClaims>(token, self.keys.decoding_key(), &validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => TokenError::TokenExpired,
                ErrorKind::ImmatureSignature => TokenError::TokenNotYetValid,
                ErrorKind::InvalidIssuer => TokenError::IssuerMismatch,
                ErrorKind::InvalidAudience => TokenError::AudienceMismatch,
                ErrorKind::InvalidAlgorithm => {
                    TokenError::TokenInvalid("algorithm mismatch".into())
                }
                ErrorKind::InvalidSignature => {
                    TokenError::TokenInvalid("signature mismatch".into())
                }
                _ => TokenError::TokenInvalid(format!("malformed token: {e}")),
            })
    }

    /// Validate a refresh token and mint a brand-new pair for its identity.
    pub fn refresh_token(&self, refresh_token: &str) -> Result<TokenPair> {
        let claims = self.validate_token(refresh_token)?;
        if claims.token_type != TokenType::Refresh {
            return Err(TokenError::TokenInvalid("not a refresh token".into()).into());
        }
        self.issue_token_pair(&claims.identity())
    }

    /// Evict from the cache and, when enabled, deny the token's `jti` until it
    /// would have expired. Returns whether anything was revoked.
    ///
    /// With the revocation list disabled this only evicts the cache entry; the
    /// token then stays verifiable until its natural expiry.
    pub fn revoke_token(&self, token: &str) -> bool {
        let cfg = self.config();
        let cached = self.cache.remove(token).map(|e| e.claims);

        if !cfg.revocation_list {
            return cached.is_some();
        }

        // Revoking an expired or foreign token is a no-op.
        let claims = match cached {
            Some(c) => Some(c),
            None => self.verify(&cfg, token).ok(),
        };
        match claims {
            Some(c) => {
                self.revoked.revoke(&c.jti, c.exp);
                tracing::info!(user = %c.user_id, jti = %c.jti, "token revoked");
                true
            }
            None => false,
        }
    }

    pub fn validate_password(&self, password: &str) -> std::result::Result<(), PasswordError> {
        let cfg = self.config();
        PasswordPolicy {
            min_length: cfg.password_min_length,
            require_strength: cfg.password_require_strength,
        }
        .check(password)
    }

    /// Periodic sweep of expired cache entries and lapsed revocations.
    pub fn cleanup_expired_tokens(&self) -> SweepReport {
        let now = get_current_timestamp();
        let report = SweepReport {
            cache_entries: self.cache.sweep(now),
            revocations: self.revoked.sweep(now),
        };
        if report.cache_entries > 0 || report.revocations > 0 {
            tracing::debug!(
                cache = report.cache_entries,
                revocations = report.revocations,
                "token sweep"
            );
        }
        report
    }

    pub fn cached_tokens(&self) -> usize {
        self.cache.len()
    }

    pub fn revoked_tokens(&self) -> usize {
        self.revoked.len()
    }

    pub fn has_permission(claims: &TokenClaims, permission: &str) -> bool {
        claims.has_permission(permission)
    }

    pub fn has_role(claims: &TokenClaims, role: &str) -> bool {
        claims.has_role(role)
    }

    pub fn has_any_role(claims: &TokenClaims, roles: &[&str]) -> bool {
        claims.has_any_role(roles)
    }

    pub fn has_any_permission(claims: &TokenClaims, permissions: &[&str]) -> bool {
        claims.has_any_permission(permissions)
    }
}
