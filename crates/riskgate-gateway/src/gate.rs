//! The request-boundary pipeline: admission, then token, then policy.
//!
//! Each stage short-circuits with a typed error the transport layer maps to
//! 429 / 401 / 403. Cheap checks go first so abusive traffic never reaches
//! signature verification.

use std::net::SocketAddr;
use std::time::Instant;

use axum::http::HeaderMap;

use riskgate_core::error::{Result, RiskGateError};

use crate::admission::AdmissionDecision;
use crate::app_state::AppState;
use crate::context::{bearer_token, client_context, client_id, Caller};
use crate::policy::AccessRequest;

/// Admission only: for routes that authenticate by other means.
pub async fn admit(
    state: &AppState,
    headers: &HeaderMap,
    peer: Option<SocketAddr>,
) -> Result<(String, AdmissionDecision)> {
    let metrics = state.metrics();
    let client = client_id(headers, peer);

    let admission = state.admission().allow(&client, &client_context(headers)).await;
    metrics.admission_decisions.inc(&[("outcome", admission.outcome.as_str())]);
    if admission.degraded {
        let policy = state.admission().config().on_store_error;
        metrics.store_fallbacks.inc(&[("policy", policy.as_str())]);
    }
    Ok((client, admission.into_result()?))
}

/// Full triad for one resource/action.
pub async fn pass(
    state: &AppState,
    headers: &HeaderMap,
    peer: Option<SocketAddr>,
    request: &AccessRequest,
) -> Result<Caller> {
    let started = Instant::now();
    let metrics = state.metrics();
    let stage = |name: &str| metrics.gate_duration.observe(&[("stage", name)], started.elapsed());

    // 1) admission
    let (client, admission) = match admit(state, headers, peer).await {
        Ok(admitted) => admitted,
        Err(e) => {
            stage("admission");
            return Err(e);
        }
    };

    // 2) authentication
    let validated = bearer_token(headers).and_then(|t| state.tokens().validate_access_token(t));
    let claims = match validated {
        Ok(c) => {
            metrics.token_validations.inc(&[("outcome", "valid")]);
            c
        }
        Err(e) => {
            metrics.token_validations.inc(&[("outcome", e.kind())]);
            tracing::info!(client = %client, kind = e.kind(), "token rejected");
            stage("token");
            return Err(e.into());
        }
    };

    // 3) authorization
    let access = state.policy().check_access(request, &claims.roles);
    let outcome = if access.allowed { "allow" } else { "deny" };
    metrics.policy_decisions.inc(&[("outcome", outcome)]);
    if !access.allowed {
        stage("policy");
        return Err(RiskGateError::Forbidden(access.reason));
    }

    stage("passed");
    Ok(Caller { client_id: client, claims, admission, access })
}
