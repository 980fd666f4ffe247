//! Role/permission/policy collections and the evaluation algorithm.
//!
//! A `PolicyStore` is an immutable snapshot once published by the engine;
//! mutations happen on a private clone that is swapped in whole.

use std::collections::{BTreeMap, BTreeSet, HashSet, VecDeque};

use riskgate_core::error::{Result, RiskGateError};

use super::matcher::applies;
use super::model::{AccessDecision, AccessRequest, Effect, Permission, Policy, Role};

pub const NO_MATCH_REASON: &str = "no matching permissions found";

#[derive(Debug, Clone, Default)]
pub struct PolicyStore {
    pub(crate) roles: BTreeMap<String, Role>,
    pub(crate) permissions: BTreeMap<String, Permission>,
    /// Evaluation order is insertion order.
    pub(crate) policies: Vec<Policy>,
}

impl PolicyStore {
    pub fn new() -> Self {
        Self::default()
    }

    // ---------------------------------------------------------------
    // Evaluation
    // ---------------------------------------------------------------

    pub fn check_access(&self, request: &AccessRequest, roles: &[String]) -> AccessDecision {
        for effect in [Effect::Deny, Effect::Allow] {
            let hit = self
                .policies
                .iter()
                .filter(|p| p.effect == effect)
                .find(|p| applies(p, request, roles));

            if let Some(policy) = hit {
                let allowed = effect == Effect::Allow;
                let verb = if allowed { "allowed" } else { "denied" };
                let mut d =
                    AccessDecision::new(allowed, format!("{verb} by policy {}", policy.id), request);
                d.policy = Some(policy.clone());
                return d;
            }
        }

        let wanted: HashSet<&str> = self
            .permissions
            .values()
            .filter(|p| p.grants(&request.resource, &request.action))
            .map(|p| p.id.as_str())
            .collect();

        if !wanted.is_empty() {
            for outer in roles {
                let granted = self
                    .walk(outer)
                    .into_iter()
                    .any(|r| r.permissions.iter().any(|p| wanted.contains(p.as_str())));
                if granted {
                    let mut d =
                        AccessDecision::new(true, format!("granted by role {outer}"), request);
                    d.role = Some(outer.clone());
                    return d;
                }
            }
        }

        AccessDecision::new(false, NO_MATCH_REASON.to_string(), request)
    }

    /// Active roles reachable from `start` (itself first), breadth-first.
    /// The visited set makes malformed cyclic graphs terminate.
    fn walk(&self, start: &str) -> Vec<&Role> {
        let mut out = Vec::new();
        let mut visited: HashSet<&str> = HashSet::new();
        let mut queue: VecDeque<&str> = VecDeque::from([start]);

        while let Some(id) = queue.pop_front() {
            if !visited.insert(id) {
                continue;
            }
            let Some(role) = self.roles.get(id) else { continue };
            if !role.active {
                continue;
            }
            out.push(role);
            queue.extend(role.inherits.iter().map(String::as_str));
        }
        out
    }

    /// Union of direct and inherited active permissions, de-duplicated.
    pub fn user_permissions(&self, roles: &[String]) -> Vec<Permission> {
        let mut ids: BTreeSet<&str> = BTreeSet::new();
        for outer in roles {
            for role in self.walk(outer) {
                ids.extend(role.permissions.iter().map(String::as_str));
            }
        }
        ids.into_iter()
            .filter_map(|id| self.permissions.get(id))
            .filter(|p| p.active)
            .cloned()
            .collect()
    }

    /// Direct or inherited.
    pub fn check_permission(&self, role_id: &str, permission_id: &str) -> bool {
        let active = self.permissions.get(permission_id).is_some_and(|p| p.active);
        active && self.walk(role_id).iter().any(|r| r.permissions.contains(permission_id))
    }

    pub fn role_hierarchy(&self) -> BTreeMap<String, Vec<String>> {
        self.roles
            .values()
            .map(|r| (r.id.clone(), r.inherits.iter().cloned().collect()))
            .collect()
    }

    // ---------------------------------------------------------------
    // Reads
    // ---------------------------------------------------------------

    pub fn roles(&self) -> Vec<Role> {
        self.roles.values().cloned().collect()
    }

    pub fn permissions(&self) -> Vec<Permission> {
        self.permissions.values().cloned().collect()
    }

    pub fn policies(&self) -> Vec<Policy> {
        self.policies.clone()
    }

    pub fn role(&self, id: &str) -> Result<Role> {
        self.roles
            .get(id)
            .cloned()
            .ok_or_else(|| RiskGateError::NotFound(format!("role {id}")))
    }

    pub fn permission(&self, id: &str) -> Result<Permission> {
        self.permissions
            .get(id)
            .cloned()
            .ok_or_else(|| RiskGateError::NotFound(format!("permission {id}")))
    }

    pub fn policy(&self, id: &str) -> Result<Policy> {
        self.policies
            .iter()
            .find(|p| p.id == id)
            .cloned()
            .ok_or_else(|| RiskGateError::NotFound(format!("policy {id}")))
    }

    // ---------------------------------------------------------------
    // Writes
    // ---------------------------------------------------------------

    pub fn create_permission(&mut self, permission: Permission) -> Result<Permission> {
        let permission = permission.normalize();
        if permission.resource.trim().is_empty() || permission.action.trim().is_empty() {
            return Err(RiskGateError::InvalidInput(
                "permission resource and action are required".into(),
            ));
        }
        if self.permissions.contains_key(&permission.id) {
            return Err(RiskGateError::AlreadyExists(format!("permission {}", permission.id)));
        }
        self.permissions.insert(permission.id.clone(), permission.clone());
        Ok(permission)
    }

    /// Replaces the permission stored under `id`. Roles keep referencing it by id.
    pub fn update_permission(&mut self, id: &str, mut permission: Permission) -> Result<Permission> {
        if !self.permissions.contains_key(id) {
            return Err(RiskGateError::NotFound(format!("permission {id}")));
        }
        if permission.resource.trim().is_empty() || permission.action.trim().is_empty() {
            return Err(RiskGateError::InvalidInput(
                "permission resource and action are required".into(),
            ));
        }
        permission.id = id.to_string();
        self.permissions.insert(permission.id.clone(), permission.clone());
        Ok(permission)
    }

    pub fn delete_permission(&mut self, id: &str) -> Result<()> {
        if !self.permissions.contains_key(id) {
            return Err(RiskGateError::NotFound(format!("permission {id}")));
        }
        if let Some(role) = self.roles.values().find(|r| r.permissions.contains(id)) {
            return Err(RiskGateError::InvalidInput(format!(
                "permission {id} is still granted by role {}",
                role.id
            )));
        }
        self.permissions.remove(id);
        Ok(())
    }

    pub fn create_role(&mut self, role: Role) -> Result<Role> {
        if role.id.trim().is_empty() {
            return Err(RiskGateError::InvalidInput("role id is required".into()));
        }
        if self.roles.contains_key(&role.id) {
            return Err(RiskGateError::AlreadyExists(format!("role {}", role.id)));
        }
        self.check_role_refs(&role)?;
        self.roles.insert(role.id.clone(), role.clone());
        Ok(role)
    }

    pub fn update_role(&mut self, id: &str, mut role: Role) -> Result<Role> {
        if !self.roles.contains_key(id) {
            return Err(RiskGateError::NotFound(format!("role {id}")));
        }
        role.id = id.to_string();
        self.check_role_refs(&role)?;
        self.roles.insert(role.id.clone(), role.clone());
        Ok(role)
    }

    /// Soft delete: the role stays addressable but grants nothing.
    pub fn delete_role(&mut self, id: &str) -> Result<()> {
        let role = self
            .roles
            .get_mut(id)
            .ok_or_else(|| RiskGateError::NotFound(format!("role {id}")))?;
        role.active = false;
        Ok(())
    }

    fn check_role_refs(&self, role: &Role) -> Result<()> {
        if let Some(p) = role.permissions.iter().find(|p| !self.permissions.contains_key(*p)) {
            return Err(RiskGateError::InvalidInput(format!(
                "role {} references unknown permission {p}",
                role.id
            )));
        }
        if let Some(r) = role.inherits.iter().find(|r| !self.roles.contains_key(*r)) {
            return Err(RiskGateError::InvalidInput(format!(
                "role {} inherits unknown role {r}",
                role.id
            )));
        }
        if self.would_cycle(role) {
            return Err(RiskGateError::InvalidInput(format!(
                "role {} would create an inheritance cycle",
                role.id
            )));
        }
        Ok(())
    }

    /// True when `role`'s inheritance edges reach back to `role` itself.
    fn would_cycle(&self, role: &Role) -> bool {
        let mut visited: HashSet<&str> = HashSet::new();
        let mut queue: VecDeque<&str> = role.inherits.iter().map(String::as_str).collect();

        while let Some(id) = queue.pop_front() {
            if id == role.id {
                return true;
            }
            if !visited.insert(id) {
                continue;
            }
            if let Some(r) = self.roles.get(id) {
                queue.extend(r.inherits.iter().map(String::as_str));
            }
        }
        false
    }

    pub fn create_policy(&mut self, policy: Policy) -> Result<Policy> {
        Self::check_policy_shape(&policy)?;
        if self.policies.iter().any(|p| p.id == policy.id) {
            return Err(RiskGateError::AlreadyExists(format!("policy {}", policy.id)));
        }
        self.policies.push(policy.clone());
        Ok(policy)
    }

    /// Replaces in place; evaluation order is kept.
    pub fn update_policy(&mut self, id: &str, mut policy: Policy) -> Result<Policy> {
        policy.id = id.to_string();
        Self::check_policy_shape(&policy)?;
        let slot = self
            .policies
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or_else(|| RiskGateError::NotFound(format!("policy {id}")))?;
        *slot = policy.clone();
        Ok(policy)
    }

    pub fn delete_policy(&mut self, id: &str) -> Result<()> {
        let before = self.policies.len();
        self.policies.retain(|p| p.id != id);
        if self.policies.len() == before {
            return Err(RiskGateError::NotFound(format!("policy {id}")));
        }
        Ok(())
    }

    fn check_policy_shape(policy: &Policy) -> Result<()> {
        if policy.id.trim().is_empty() {
            return Err(RiskGateError::InvalidInput("policy id is required".into()));
        }
        if policy.subjects.is_empty() || policy.resources.is_empty() || policy.actions.is_empty()
        {
            return Err(RiskGateError::InvalidInput(format!(
                "policy {} needs at least one subject, resource and action",
                policy.id
            )));
        }
        Ok(())
    }
}
