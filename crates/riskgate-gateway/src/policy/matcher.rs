//! Policy matching utilities.
//!
//! Supports the `*` wildcard in subject/resource/action sets and exact
//! equality for context conditions.

use std::collections::{BTreeMap, BTreeSet};

use riskgate_core::error::{Result, RiskGateError};

use super::model::{AccessRequest, Policy, WILDCARD};

/// Split a `resource:action` permission name.
pub fn parse_permission_name(raw: &str) -> Result<(&str, &str)> {
    let (resource, action) = raw.split_once(':').ok_or_else(|| {
        RiskGateError::InvalidInput(format!("invalid permission: {raw} (expected resource:action)"))
    })?;
    if resource.is_empty() || action.is_empty() {
        return Err(RiskGateError::InvalidInput(format!(
            "invalid permission: {raw} (empty resource or action)"
        )));
    }
    Ok((resource, action))
}

pub fn matches_value(set: &BTreeSet<String>, value: &str) -> bool {
    set.contains(WILDCARD) || set.contains(value)
}

pub fn matches_subjects(set: &BTreeSet<String>, roles: &[String]) -> bool {
    set.contains(WILDCARD) || roles.iter().any(|r| set.contains(r))
}

pub fn conditions_hold(
    conditions: &BTreeMap<String, serde_json::Value>,
    context: &BTreeMap<String, serde_json::Value>,
) -> bool {
    conditions.iter().all(|(k, want)| context.get(k) == Some(want))
}

/// Whether an (active) policy applies to this request and role set.
pub fn applies(policy: &Policy, request: &AccessRequest, roles: &[String]) -> bool {
    policy.active
        && matches_subjects(&policy.subjects, roles)
        && matches_value(&policy.resources, &request.resource)
        && matches_value(&policy.actions, &request.action)
        && conditions_hold(&policy.conditions, &request.context)
}
