//! Axum router wiring.
//!
//! Public routes go through the gate per handler (admission for token
//! maintenance, the full triad for `/v1/authorize`); `/admin/*` is wrapped
//! in the admin guard; ops endpoints are ungated.

use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use crate::{app_state::AppState, ops, transport::{admin, public}};

pub fn build_router(state: AppState) -> Router {
    let admin_routes = Router::new()
        .route("/admin/roles", get(admin::list_roles).post(admin::create_role))
        .route("/admin/roles/hierarchy", get(admin::role_hierarchy))
        .route(
            "/admin/roles/:id",
            get(admin::get_role).put(admin::update_role).delete(admin::delete_role),
        )
        .route("/admin/roles/:id/permissions", get(admin::role_permissions))
        .route(
            "/admin/permissions",
            get(admin::list_permissions).post(admin::create_permission),
        )
        .route(
            "/admin/permissions/:id",
            get(admin::get_permission)
                .put(admin::update_permission)
                .delete(admin::delete_permission),
        )
        .route("/admin/policies", get(admin::list_policies).post(admin::create_policy))
        .route(
            "/admin/policies/:id",
            get(admin::get_policy).put(admin::update_policy).delete(admin::delete_policy),
        )
        .route(
            "/admin/rate-limit/config",
            get(admin::get_rate_limit_config).put(admin::put_rate_limit_config),
        )
        .route("/admin/rate-limit/unblock/:client", post(admin::unblock_client))
        .route("/admin/rate-limit/clients/:client", get(admin::client_stats))
        .route("/admin/auth/config", get(admin::get_auth_config).put(admin::put_auth_config))
        .route_layer(middleware::from_fn_with_state(state.clone(), admin::guard));

    Router::new()
        .route("/.well-known/jwks.json", get(public::jwks))
        .route("/v1/auth/public-key", get(public::public_key))
        .route("/v1/auth/refresh", post(public::refresh))
        .route("/v1/auth/revoke", post(public::revoke))
        .route("/v1/authorize", post(public::authorize))
        .route("/healthz", get(ops::healthz))
        .route("/readyz", get(ops::readyz))
        .route("/metrics", get(ops::metrics))
        .merge(admin_routes)
        .with_state(state)
}

