use std::net::SocketAddr;

use axum::extract::{ConnectInfo, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::app_state::AppState;
use crate::context::bearer_token;
use crate::gate;
use crate::policy::{AccessDecision, AccessRequest};
use crate::token::TokenPair;

use super::error::ApiResult;

fn peer(ci: Option<ConnectInfo<SocketAddr>>) -> Option<SocketAddr> {
    ci.map(|ConnectInfo(addr)| addr)
}

pub async fn jwks(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(state.tokens().jwks())
}

pub async fn public_key(State(state): State<AppState>) -> ApiResult<Response> {
    let pem = state.tokens().keys().public_key_pem()?;
    Ok(([(header::CONTENT_TYPE, "application/x-pem-file")], pem).into_response())
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

pub async fn refresh(
    State(state): State<AppState>,
    ci: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
    Json(body): Json<RefreshRequest>,
) -> ApiResult<Json<TokenPair>> {
    gate::admit(&state, &headers, peer(ci)).await?;
    let pair = state.tokens().refresh_token(&body.refresh_token).map_err(|e| {
        if let riskgate_core::RiskGateError::Token(t) = &e {
            state.metrics().token_validations.inc(&[("outcome", t.kind())]);
        }
        e
    })?;
    Ok(Json(pair))
}

/// Revokes the presented bearer token.
pub async fn revoke(
    State(state): State<AppState>,
    ci: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
) -> ApiResult<StatusCode> {
    gate::admit(&state, &headers, peer(ci)).await?;
    let token = bearer_token(&headers)?;
    // Only a currently valid token can revoke itself.
    state.tokens().validate_token(token)?;
    state.tokens().revoke_token(token);
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Serialize)]
pub struct AuthorizeResponse {
    pub subject: String,
    pub roles: Vec<String>,
    /// Admission quota left in the current window.
    pub remaining: u64,
    pub decision: AccessDecision,
}

pub async fn authorize(
    State(state): State<AppState>,
    ci: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
    Json(request): Json<AccessRequest>,
) -> ApiResult<Json<AuthorizeResponse>> {
    let caller = gate::pass(&state, &headers, peer(ci), &request).await?;
    Ok(Json(AuthorizeResponse {
        subject: caller.claims.sub,
        roles: caller.claims.roles,
        remaining: caller.admission.remaining,
        decision: caller.access,
    }))
}
