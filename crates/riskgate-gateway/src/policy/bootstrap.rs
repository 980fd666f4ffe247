//! Seed data for the policy engine.
//!
//! Either the built-in baseline for the risk-assessment domain, or a
//! `bootstrap` section from the gateway config. Both go through the same
//! write-time checks as the admin API, so a malformed seed fails at boot.

use std::collections::BTreeMap;

use serde_json::json;

use riskgate_core::error::{Result, RiskGateError};

use crate::config::schema::BootstrapConfig;

use super::model::{Effect, Permission, Policy, Role};
use super::store::PolicyStore;

const BASELINE_PERMISSIONS: &[&str] = &[
    "assessments:read",
    "assessments:create",
    "assessments:update",
    "assessments:delete",
    "reports:read",
    "reports:export",
    "models:read",
    "models:update",
    "users:read",
    "users:manage",
    "admin:read",
    "admin:write",
];

/// viewer < analyst < admin; api_client stands alone.
pub fn baseline() -> Result<PolicyStore> {
    let permissions = BASELINE_PERMISSIONS
        .iter()
        .map(|name| {
            let (resource, action) = super::matcher::parse_permission_name(name)?;
            Ok(Permission::new(resource, action))
        })
        .collect::<Result<Vec<_>>>()?;

    let roles = vec![
        Role::new("viewer", "Read-only viewer")
            .with_permissions(["assessments:read", "reports:read", "models:read"]),
        Role::new("analyst", "Risk analyst")
            .with_permissions(["assessments:create", "assessments:update", "reports:export"])
            .inheriting(["viewer"]),
        Role::new("api_client", "API-only caller")
            .with_permissions(["assessments:read", "assessments:create"]),
        Role::new("admin", "Administrator")
            .with_permissions([
                "assessments:delete",
                "models:update",
                "users:read",
                "users:manage",
                "admin:read",
                "admin:write",
            ])
            .inheriting(["analyst"]),
    ];

    let policies = vec![
        Policy::new("admin-full-access", Effect::Allow, ["admin"], ["*"], ["*"])
            .describe("administrators may do anything not explicitly denied"),
        Policy::new("api-client-no-admin", Effect::Deny, ["api_client"], ["admin", "users"], ["*"])
            .describe("machine callers never reach the administrative surface"),
        Policy::new("export-requires-mfa", Effect::Deny, ["*"], ["reports"], ["export"])
            .with_condition("mfa_verified", json!(false))
            .describe("report exports are refused for sessions without MFA"),
    ];

    build(permissions, roles, policies)
}

/// Seed from config, or the baseline when absent.
pub fn from_config(cfg: Option<&BootstrapConfig>) -> Result<PolicyStore> {
    match cfg {
        None => baseline(),
        Some(b) => build(b.permissions.clone(), b.roles.clone(), b.policies.clone())
            .map_err(|e| RiskGateError::Validation(format!("bootstrap: {e}"))),
    }
}

/// Roles may reference roles declared later in the list, so they are
/// inserted in dependency order.
fn build(permissions: Vec<Permission>, roles: Vec<Role>, policies: Vec<Policy>) -> Result<PolicyStore> {
    let mut store = PolicyStore::new();
    for p in permissions {
        store.create_permission(p)?;
    }

    let mut pending: BTreeMap<String, Role> = BTreeMap::new();
    for r in roles {
        if pending.insert(r.id.clone(), r.clone()).is_some() {
            return Err(RiskGateError::AlreadyExists(format!("role {}", r.id)));
        }
    }

    while !pending.is_empty() {
        let ready: Vec<String> = pending
            .values()
            .filter(|r| r.inherits.iter().all(|i| !pending.contains_key(i)))
            .map(|r| r.id.clone())
            .collect();

        if ready.is_empty() {
            let stuck: Vec<&str> = pending.keys().map(String::as_str).collect();
            return Err(RiskGateError::InvalidInput(format!(
                "inheritance cycle among roles: {}",
                stuck.join(", ")
            )));
        }

        for id in ready {
            if let Some(role) = pending.remove(&id) {
                store.create_role(role)?;
            }
        }
    }

    for p in policies {
        store.create_policy(p)?;
    }
    Ok(store)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::model::AccessRequest;

    fn roles(ids: &[&str]) -> Vec<String> {
        ids.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn baseline_is_consistent() {
        let s = baseline().unwrap();
        assert_eq!(s.roles().len(), 4);
        assert!(s.check_permission("admin", "reports:read"));
        assert!(!s.check_permission("viewer", "reports:export"));

        let admin = s.check_access(&AccessRequest::new("anything", "at-all"), &roles(&["admin"]));
        assert!(admin.allowed);

        let api = s.check_access(&AccessRequest::new("admin", "read"), &roles(&["api_client"]));
        assert!(!api.allowed);
        assert_eq!(api.policy.unwrap().id, "api-client-no-admin");
    }

    #[test]
    fn forward_references_are_resolved() {
        let cfg: BootstrapConfig = serde_yaml::from_str(
            r#"
permissions:
  - { resource: reports, action: read }
roles:
  - { id: lead, inherits: [member] }
  - { id: member, permissions: ["reports:read"] }
"#,
        )
        .unwrap();
        let s = from_config(Some(&cfg)).unwrap();
        assert!(s.check_permission("lead", "reports:read"));
    }

    #[test]
    fn cyclic_seed_is_a_validation_error() {
        let cfg: BootstrapConfig = serde_yaml::from_str(
            r#"
roles:
  - { id: a, inherits: [b] }
  - { id: b, inherits: [a] }
"#,
        )
        .unwrap();
        let err = from_config(Some(&cfg)).unwrap_err();
        assert!(matches!(err, RiskGateError::Validation(_)));
        assert!(err.to_string().contains("a, b"));
    }

    #[test]
    fn unknown_permission_in_seed_is_rejected() {
        let cfg: BootstrapConfig =
            serde_yaml::from_str("roles:\n  - { id: a, permissions: [\"x:y\"] }\n").unwrap();
        assert!(matches!(from_config(Some(&cfg)), Err(RiskGateError::Validation(_))));
    }
}
