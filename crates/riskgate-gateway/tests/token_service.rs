#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use std::sync::OnceLock;

use jsonwebtoken::{encode, get_current_timestamp, Algorithm, EncodingKey, Header};

use riskgate_core::claims::{Identity, TokenClaims, TokenType};
use riskgate_core::error::{RiskGateError, TokenError};
use riskgate_gateway::config::AuthConfig;
use riskgate_gateway::token::{KeyPair, TokenService};

// Key generation is slow; share one pair across the whole test binary.
fn keys() -> KeyPair {
    static KEYS: OnceLock<KeyPair> = OnceLock::new();
    KEYS.get_or_init(|| KeyPair::generate().unwrap()).clone()
}

fn service(cfg: AuthConfig) -> TokenService {
    TokenService::with_keys(cfg, keys()).unwrap()
}

fn uncached() -> AuthConfig {
    AuthConfig { cache_enabled: false, ..AuthConfig::default() }
}

fn analyst() -> Identity {
    Identity {
        user_id: "u-42".into(),
        username: "ana".into(),
        email: "ana@example.com".into(),
        roles: vec!["analyst".into()],
        permissions: vec!["assessments:read".into(), "reports:read".into()],
    }
}

fn claims_at(iat: u64, nbf: u64, exp: u64) -> TokenClaims {
    let id = analyst();
    TokenClaims {
        sub: id.user_id.clone(),
        iss: "riskgate".into(),
        aud: "risk-platform".into(),
        iat,
        exp,
        nbf,
        jti: "crafted".into(),
        user_id: id.user_id,
        username: id.username,
        email: id.email,
        roles: id.roles,
        permissions: id.permissions,
        token_type: TokenType::Access,
    }
}

fn sign_with(alg: Algorithm, claims: &TokenClaims) -> String {
    let pem = keys().private_key_pem().unwrap();
    let key = EncodingKey::from_rsa_pem(pem.as_bytes()).unwrap();
    encode(&Header::new(alg), claims, &key).unwrap()
}

#[test]
fn issue_then_validate_round_trips_identity() {
    for cfg in [AuthConfig::default(), uncached()] {
        let svc = service(cfg);
        let pair = svc.issue_token_pair(&analyst()).unwrap();
        assert_eq!(pair.token_type, "Bearer");
        assert_eq!(pair.expires_in, 900);

        let claims = svc.validate_token(&pair.access_token).unwrap();
        assert_eq!(claims.identity(), analyst());
        assert_eq!(claims.sub, "u-42");
        assert_eq!(claims.token_type, TokenType::Access);
        assert_eq!(claims.exp - claims.iat, 900);
    }
}

#[test]
fn compact_form_has_three_parts_and_kid() {
    let svc = service(uncached());
    let pair = svc.issue_token_pair(&analyst()).unwrap();
    assert_eq!(pair.access_token.split('.').count(), 3);
    let header = jsonwebtoken::decode_header(&pair.access_token).unwrap();
    assert_eq!(header.alg, Algorithm::RS256);
    assert_eq!(header.kid.as_deref(), Some(svc.keys().kid()));
}

#[test]
fn expired_token_is_rejected() {
    let svc = service(uncached());
    let now = get_current_timestamp();
    let token = sign_with(Algorithm::RS256, &claims_at(now - 120, now - 120, now - 60));
    assert_eq!(svc.validate_token(&token), Err(TokenError::TokenExpired));
}

#[test]
fn token_before_not_before_is_rejected() {
    let svc = service(uncached());
    let now = get_current_timestamp();
    let token = sign_with(Algorithm::RS256, &claims_at(now, now + 600, now + 1200));
    assert_eq!(svc.validate_token(&token), Err(TokenError::TokenNotYetValid));
}

#[test]
fn issuer_and_audience_must_match_exactly() {
    let svc = service(uncached());
    let now = get_current_timestamp();

    let mut claims = claims_at(now, now, now + 600);
    claims.iss = "riskgate-staging".into();
    let token = sign_with(Algorithm::RS256, &claims);
    assert_eq!(svc.validate_token(&token), Err(TokenError::IssuerMismatch));

    let mut claims = claims_at(now, now, now + 600);
    claims.aud = "other-platform".into();
    let token = sign_with(Algorithm::RS256, &claims);
    assert_eq!(svc.validate_token(&token), Err(TokenError::AudienceMismatch));
}

#[test]
fn tampered_token_is_rejected() {
    let svc = service(uncached());
    let pair = svc.issue_token_pair(&analyst()).unwrap();

    let mut parts: Vec<String> = pair.access_token.split('.').map(str::to_string).collect();
    let payload = &mut parts[1];
    let flipped = if payload.ends_with('A') { 'B' } else { 'A' };
    payload.pop();
    payload.push(flipped);
    let tampered = parts.join(".");

    assert!(matches!(svc.validate_token(&tampered), Err(TokenError::TokenInvalid(_))));
    assert!(matches!(svc.validate_token("not-a-token"), Err(TokenError::TokenInvalid(_))));
}

#[test]
fn algorithm_substitution_is_rejected() {
    let svc = service(uncached());
    let now = get_current_timestamp();
    let claims = claims_at(now, now, now + 600);

    // Same key, different RSA algorithm.
    let rs512 = sign_with(Algorithm::RS512, &claims);
    assert!(matches!(svc.validate_token(&rs512), Err(TokenError::TokenInvalid(_))));

    // Classic confusion: HMAC keyed with the public key.
    let pem = svc.keys().public_key_pem().unwrap();
    let hs = encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(pem.as_bytes()),
    )
    .unwrap();
    assert!(matches!(svc.validate_token(&hs), Err(TokenError::TokenInvalid(_))));
}

#[test]
fn refresh_issues_new_independent_pair() {
    let svc = service(AuthConfig::default());
    let pair = svc.issue_token_pair(&analyst()).unwrap();

    let next = svc.refresh_token(&pair.refresh_token).unwrap();
    assert_ne!(next.access_token, pair.access_token);

    let claims = svc.validate_token(&next.access_token).unwrap();
    assert_eq!(claims.identity(), analyst());

    // Old access token is unaffected.
    assert!(svc.validate_token(&pair.access_token).is_ok());
}

#[test]
fn access_token_cannot_refresh() {
    let svc = service(uncached());
    let pair = svc.issue_token_pair(&analyst()).unwrap();
    let err = svc.refresh_token(&pair.access_token).unwrap_err();
    assert!(matches!(err, RiskGateError::Token(TokenError::TokenInvalid(_))));
}

#[test]
fn refresh_token_is_not_an_access_credential() {
    for cfg in [AuthConfig::default(), uncached()] {
        let svc = service(cfg);
        let pair = svc.issue_token_pair(&analyst()).unwrap();

        assert!(svc.validate_access_token(&pair.access_token).is_ok());
        assert_eq!(
            svc.validate_access_token(&pair.refresh_token),
            Err(TokenError::TokenInvalid("not an access token".into()))
        );
        // still a valid signed token for the refresh flow
        assert!(svc.refresh_token(&pair.refresh_token).is_ok());
    }
}

#[test]
fn unbounded_lifetimes_are_refused_before_issuance() {
    let svc = service(AuthConfig::default());
    let huge = AuthConfig {
        token_expiry_secs: u64::MAX,
        refresh_expiry_secs: u64::MAX,
        ..AuthConfig::default()
    };
    assert!(matches!(svc.update_config(huge), Err(RiskGateError::BadRequest(_))));

    let pair = svc.issue_token_pair(&analyst()).unwrap();
    assert_eq!(pair.expires_in, AuthConfig::default().token_expiry_secs);
}

#[test]
fn revoked_token_fails_even_without_cache() {
    for cfg in [AuthConfig::default(), uncached()] {
        let svc = service(cfg);
        let pair = svc.issue_token_pair(&analyst()).unwrap();
        assert!(svc.revoke_token(&pair.access_token));
        assert_eq!(svc.validate_token(&pair.access_token), Err(TokenError::TokenRevoked));
    }
}

#[test]
fn revocation_without_list_only_evicts_cache() {
    let svc = service(AuthConfig { revocation_list: false, ..AuthConfig::default() });
    let pair = svc.issue_token_pair(&analyst()).unwrap();
    assert_eq!(svc.cached_tokens(), 1);

    assert!(svc.revoke_token(&pair.access_token));
    assert_eq!(svc.cached_tokens(), 0);
    // Signature still verifies until natural expiry.
    assert!(svc.validate_token(&pair.access_token).is_ok());
}

#[test]
fn config_update_clears_cache_and_applies_new_issuer() {
    let svc = service(AuthConfig::default());
    let pair = svc.issue_token_pair(&analyst()).unwrap();
    assert_eq!(svc.cached_tokens(), 1);

    svc.update_config(AuthConfig { issuer: "riskgate-v2".into(), ..AuthConfig::default() })
        .unwrap();
    assert_eq!(svc.cached_tokens(), 0);
    assert_eq!(svc.validate_token(&pair.access_token), Err(TokenError::IssuerMismatch));

    let bad = AuthConfig { algorithm: Algorithm::HS256, ..AuthConfig::default() };
    assert!(svc.update_config(bad).is_err());
}

#[test]
fn cleanup_is_a_noop_for_live_tokens() {
    let svc = service(AuthConfig::default());
    svc.issue_token_pair(&analyst()).unwrap();
    let report = svc.cleanup_expired_tokens();
    assert_eq!(report.cache_entries, 0);
    assert_eq!(svc.cached_tokens(), 1);
}

#[test]
fn public_key_exports_are_consistent() {
    let svc = service(uncached());
    let pem = svc.keys().public_key_pem().unwrap();
    assert!(pem.starts_with("-----BEGIN PUBLIC KEY-----"));

    let jwks = svc.jwks();
    let jwk = &jwks["keys"][0];
    assert_eq!(jwk["kty"], "RSA");
    assert_eq!(jwk["alg"], "RS256");
    assert_eq!(jwk["n"], svc.keys().public_components().n);

    // A service loaded from the exported private key verifies the same tokens.
    let reloaded = KeyPair::from_private_pem(&svc.keys().private_key_pem().unwrap()).unwrap();
    assert_eq!(reloaded.kid(), svc.keys().kid());
    let other = TokenService::with_keys(uncached(), reloaded).unwrap();
    let pair = svc.issue_token_pair(&analyst()).unwrap();
    assert!(other.validate_token(&pair.access_token).is_ok());
}

#[test]
fn password_policy_follows_config() {
    let svc = service(uncached());
    assert!(svc.validate_password("Sufficient-Pass-1").is_ok());
    assert!(svc.validate_password("weak").is_err());
}

#[test]
fn membership_helpers() {
    let svc = service(uncached());
    let pair = svc.issue_token_pair(&analyst()).unwrap();
    let claims = svc.validate_token(&pair.access_token).unwrap();
    assert!(TokenService::has_role(&claims, "analyst"));
    assert!(!TokenService::has_role(&claims, "admin"));
    assert!(TokenService::has_any_role(&claims, &["admin", "analyst"]));
    assert!(TokenService::has_permission(&claims, "reports:read"));
    assert!(!TokenService::has_any_permission(&claims, &["admin:write"]));
}
