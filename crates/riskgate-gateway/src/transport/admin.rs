//! Administrative surface.
//!
//! Every route sits behind `guard`, which runs the full gate for resource
//! `admin` with action `read` (GET/HEAD) or `write` (everything else).

use std::collections::BTreeMap;
use std::net::SocketAddr;

use axum::extract::{ConnectInfo, Path, Request, State};
use axum::http::{Method, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;

use riskgate_core::error::RiskGateError;

use crate::admission::ClientStats;
use crate::app_state::AppState;
use crate::config::{AuthConfig, RateLimitConfig};
use crate::gate;
use crate::policy::{AccessRequest, Permission, Policy, Role};

use super::error::{ApiError, ApiResult};

pub const ADMIN_RESOURCE: &str = "admin";

pub async fn guard(
    State(state): State<AppState>,
    ci: Option<ConnectInfo<SocketAddr>>,
    req: Request,
    next: Next,
) -> Response {
    let action = match *req.method() {
        Method::GET | Method::HEAD => "read",
        _ => "write",
    };
    let access = AccessRequest::new(ADMIN_RESOURCE, action);
    let peer = ci.map(|ConnectInfo(addr)| addr);

    match gate::pass(&state, req.headers(), peer, &access).await {
        Ok(caller) => {
            tracing::debug!(
                user = %caller.claims.user_id,
                method = %req.method(),
                path = %req.uri().path(),
                "admin request"
            );
            next.run(req).await
        }
        Err(e) => ApiError(e).into_response(),
    }
}

// ---------------------------------------------------------------
// Roles
// ---------------------------------------------------------------

pub async fn list_roles(State(state): State<AppState>) -> Json<Vec<Role>> {
    Json(state.policy().list_roles())
}

pub async fn create_role(
    State(state): State<AppState>,
    Json(role): Json<Role>,
) -> ApiResult<(StatusCode, Json<Role>)> {
    Ok((StatusCode::CREATED, Json(state.policy().create_role(role)?)))
}

pub async fn get_role(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Json<Role>> {
    Ok(Json(state.policy().get_role(&id)?))
}

pub async fn update_role(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(role): Json<Role>,
) -> ApiResult<Json<Role>> {
    Ok(Json(state.policy().update_role(&id, role)?))
}

pub async fn delete_role(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<StatusCode> {
    state.policy().delete_role(&id)?;
    Ok(StatusCode::NO_CONTENT)
}

/// Effective permissions of one role, inherited ones included.
pub async fn role_permissions(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Vec<Permission>>> {
    state.policy().get_role(&id)?;
    Ok(Json(state.policy().get_user_permissions(&[id])))
}

pub async fn role_hierarchy(State(state): State<AppState>) -> Json<BTreeMap<String, Vec<String>>> {
    Json(state.policy().get_role_hierarchy())
}

// ---------------------------------------------------------------
// Permissions
// ---------------------------------------------------------------

pub async fn list_permissions(State(state): State<AppState>) -> Json<Vec<Permission>> {
    Json(state.policy().list_permissions())
}

pub async fn create_permission(
    State(state): State<AppState>,
    Json(permission): Json<Permission>,
) -> ApiResult<(StatusCode, Json<Permission>)> {
    Ok((StatusCode::CREATED, Json(state.policy().create_permission(permission)?)))
}

pub async fn get_permission(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Permission>> {
    Ok(Json(state.policy().get_permission(&id)?))
}

pub async fn update_permission(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(permission): Json<Permission>,
) -> ApiResult<Json<Permission>> {
    Ok(Json(state.policy().update_permission(&id, permission)?))
}

pub async fn delete_permission(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    state.policy().delete_permission(&id)?;
    Ok(StatusCode::NO_CONTENT)
}

// ---------------------------------------------------------------
// Policies
// ---------------------------------------------------------------

pub async fn list_policies(State(state): State<AppState>) -> Json<Vec<Policy>> {
    Json(state.policy().list_policies())
}

pub async fn create_policy(
    State(state): State<AppState>,
    Json(policy): Json<Policy>,
) -> ApiResult<(StatusCode, Json<Policy>)> {
    Ok((StatusCode::CREATED, Json(state.policy().create_policy(policy)?)))
}

pub async fn get_policy(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Json<Policy>> {
    Ok(Json(state.policy().get_policy(&id)?))
}

pub async fn update_policy(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(policy): Json<Policy>,
) -> ApiResult<Json<Policy>> {
    Ok(Json(state.policy().update_policy(&id, policy)?))
}

pub async fn delete_policy(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<StatusCode> {
    state.policy().delete_policy(&id)?;
    Ok(StatusCode::NO_CONTENT)
}

// ---------------------------------------------------------------
// Rate limiting
// ---------------------------------------------------------------

pub async fn get_rate_limit_config(State(state): State<AppState>) -> Json<RateLimitConfig> {
    Json(RateLimitConfig::clone(&state.admission().config()))
}

pub async fn put_rate_limit_config(
    State(state): State<AppState>,
    Json(next): Json<RateLimitConfig>,
) -> ApiResult<Json<RateLimitConfig>> {
    let applied = state.admission().update_config(next)?;
    Ok(Json(RateLimitConfig::clone(&applied)))
}

pub async fn unblock_client(
    State(state): State<AppState>,
    Path(client): Path<String>,
) -> ApiResult<StatusCode> {
    state.admission().unblock(&client).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn client_stats(
    State(state): State<AppState>,
    Path(client): Path<String>,
) -> ApiResult<Json<ClientStats>> {
    state
        .admission()
        .get_client_stats(&client)
        .await?
        .map(Json)
        .ok_or_else(|| RiskGateError::NotFound(format!("client {client}")).into())
}

// ---------------------------------------------------------------
// Auth
// ---------------------------------------------------------------

pub async fn get_auth_config(State(state): State<AppState>) -> Json<AuthConfig> {
    Json(AuthConfig::clone(&state.tokens().config()))
}

pub async fn put_auth_config(
    State(state): State<AppState>,
    Json(next): Json<AuthConfig>,
) -> ApiResult<Json<AuthConfig>> {
    state.tokens().update_config(next)?;
    Ok(Json(AuthConfig::clone(&state.tokens().config())))
}
