use std::net::SocketAddr;

use axum::http::{header, HeaderMap};

use riskgate_core::claims::TokenClaims;
use riskgate_core::error::TokenError;

use crate::admission::{AdmissionDecision, ClientContext};
use crate::policy::AccessDecision;

const FORWARDED_FOR: &str = "x-forwarded-for";
const COUNTRY_HINT: &str = "x-client-country";

/// Caller that made it through the gate, with the decisions that let it in.
#[derive(Debug, Clone)]
pub struct Caller {
    pub client_id: String,
    pub claims: TokenClaims,
    pub admission: AdmissionDecision,
    pub access: AccessDecision,
}

/// Admission key: first `X-Forwarded-For` hop, else the peer address.
///
/// Forwarded headers are only meaningful behind a trusted proxy; TLS and
/// proxy termination happen in front of the gateway.
pub fn client_id(headers: &HeaderMap, peer: Option<SocketAddr>) -> String {
    headers
        .get(FORWARDED_FOR)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .or_else(|| peer.map(|p| p.ip().to_string()))
        .unwrap_or_else(|| "unknown".to_string())
}

pub fn client_context(headers: &HeaderMap) -> ClientContext {
    let text = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    };
    ClientContext {
        user_agent: text(header::USER_AGENT.as_str()),
        country: text(COUNTRY_HINT),
    }
}

/// `Authorization: Bearer <token>`.
pub fn bearer_token(headers: &HeaderMap) -> Result<&str, TokenError> {
    let value = headers
        .get(header::AUTHORIZATION)
        .ok_or_else(|| TokenError::TokenInvalid("missing bearer token".into()))?
        .to_str()
        .map_err(|_| TokenError::TokenInvalid("malformed authorization header".into()))?;

    match value.split_once(' ') {
        Some((scheme, token)) if scheme.eq_ignore_ascii_case("bearer") && !token.trim().is_empty() => {
            Ok(token.trim())
        }
        _ => Err(TokenError::TokenInvalid("expected a bearer token".into())),
    }
}
