#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use jsonwebtoken::Algorithm;

use riskgate_gateway::config::schema::MAX_TOKEN_LIFETIME_SECS;
use riskgate_gateway::config::{self, AuthConfig, OnStoreError};

#[test]
fn deny_unknown_fields_nested() {
    let bad = r#"
version: 1
gateway:
  listen: "0.0.0.0:8080"
rate_limit:
  requests_per_window: 10
  blok_duration_ms: 1000 # typo should fail
"#;

    let err = config::load_from_str(bad).expect_err("must fail");
    assert_eq!(err.client_code().as_str(), "BAD_REQUEST");
}

#[test]
fn ok_minimal_config() {
    let cfg = config::load_from_str("version: 1\n").expect("must parse");
    assert_eq!(cfg.version, 1);
    assert_eq!(cfg.auth.algorithm, Algorithm::RS256);
    assert_eq!(cfg.auth.token_expiry_secs, 900);
    assert_eq!(cfg.rate_limit.requests_per_window, 100);
    assert_eq!(cfg.rate_limit.on_store_error, OnStoreError::Local);
    assert!(!cfg.rate_limit.distributed);
    assert!(cfg.bootstrap.is_none());
}

#[test]
fn unsupported_version_is_rejected() {
    let err = config::load_from_str("version: 2\n").expect_err("must fail");
    assert_eq!(err.client_code().as_str(), "UNSUPPORTED_VERSION");
}

#[test]
fn requests_per_minute_alias_is_accepted() {
    let cfg = config::load_from_str(
        r#"
version: 1
rate_limit:
  requests_per_minute: 10
  burst: 5
"#,
    )
    .unwrap();
    assert_eq!(cfg.rate_limit.requests_per_window, 10);
    assert_eq!(cfg.rate_limit.burst, 5);
}

#[test]
fn burst_above_limit_is_rejected() {
    let err = config::load_from_str(
        r#"
version: 1
rate_limit:
  requests_per_window: 10
  burst: 11
"#,
    )
    .expect_err("must fail");
    assert!(err.to_string().contains("burst"));
}

#[test]
fn non_rsa_algorithm_is_rejected() {
    let err = config::load_from_str("version: 1\nauth:\n  algorithm: HS256\n").expect_err("must fail");
    assert!(err.to_string().contains("RSA"));
}

#[test]
fn token_lifetimes_are_capped() {
    let err = config::load_from_str(
        "version: 1\nauth:\n  token_expiry_secs: 900\n  refresh_expiry_secs: 18446744073709551615\n",
    )
    .expect_err("must fail");
    assert!(err.to_string().contains("refresh_expiry_secs"));

    // a lifetime that passes the ordering check but not the cap
    let huge = AuthConfig {
        token_expiry_secs: u64::MAX,
        refresh_expiry_secs: u64::MAX,
        ..AuthConfig::default()
    };
    assert!(huge.validate().is_err());

    let year = AuthConfig {
        token_expiry_secs: 3600,
        refresh_expiry_secs: MAX_TOKEN_LIFETIME_SECS,
        ..AuthConfig::default()
    };
    assert!(year.validate().is_ok());

    let skewed = AuthConfig { leeway_secs: u64::MAX, ..AuthConfig::default() };
    assert!(skewed.validate().is_err());
}

#[test]
fn rate_limit_durations_are_capped() {
    let err = config::load_from_str("version: 1\nrate_limit:\n  block_duration_ms: 18446744073709551615\n")
        .expect_err("must fail");
    assert!(err.to_string().contains("block_duration_ms"));

    let err = config::load_from_str("version: 1\nrate_limit:\n  window_ms: 172800000\n").expect_err("must fail");
    assert!(err.to_string().contains("window_ms"));
}

#[test]
fn distributed_requires_a_store_url() {
    let err = config::load_from_str("version: 1\nrate_limit:\n  distributed: true\n").expect_err("must fail");
    assert!(err.to_string().contains("redis_url"));

    let cfg = config::load_from_str(
        r#"
version: 1
rate_limit:
  distributed: true
  on_store_error: deny
store:
  redis_url: "redis://127.0.0.1:6379/"
  key_prefix: "rg:"
"#,
    )
    .unwrap();
    assert_eq!(cfg.rate_limit.on_store_error, OnStoreError::Deny);
    assert_eq!(cfg.store.key_prefix, "rg:");
}

#[test]
fn bootstrap_section_is_strict() {
    let bad = r#"
version: 1
bootstrap:
  roles:
    - { id: viewer, permisions: [] }
"#;
    assert!(config::load_from_str(bad).is_err());
}

#[test]
fn shipped_sample_config_is_valid() {
    let cfg = config::load_from_file("../../riskgate.yaml").expect("sample config");
    assert_eq!(cfg.store.key_prefix, "riskgate:");
}
