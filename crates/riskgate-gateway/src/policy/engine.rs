use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

use riskgate_core::error::Result;

use super::model::{AccessDecision, AccessRequest, Permission, Policy, Role};
use super::store::PolicyStore;

/// Authorization runtime.
/// Construct once at startup, then share via Arc.
///
/// Readers take a cheap `Arc` snapshot and evaluate without holding the lock.
/// Writers clone the current store, apply the change and publish the clone,
/// so an in-flight `check_access` never sees a half-applied update.
pub struct PolicyEngine {
    current: RwLock<Arc<PolicyStore>>,
}

impl PolicyEngine {
    pub fn new(store: PolicyStore) -> Self {
        Self { current: RwLock::new(Arc::new(store)) }
    }

    pub fn snapshot(&self) -> Arc<PolicyStore> {
        // A poisoned lock still holds a fully published snapshot.
        Arc::clone(&self.current.read().unwrap_or_else(|p| p.into_inner()))
    }

    fn mutate<T>(&self, f: impl FnOnce(&mut PolicyStore) -> Result<T>) -> Result<T> {
        let mut slot = self.current.write().unwrap_or_else(|p| p.into_inner());
        let mut next = PolicyStore::clone(&slot);
        let out = f(&mut next)?;
        *slot = Arc::new(next);
        Ok(out)
    }

    pub fn check_access(&self, request: &AccessRequest, subject_roles: &[String]) -> AccessDecision {
        let decision = self.snapshot().check_access(request, subject_roles);
        if decision.allowed {
            tracing::debug!(
                resource = %request.resource,
                action = %request.action,
                reason = %decision.reason,
                "access allowed"
            );
        } else {
            tracing::info!(
                resource = %request.resource,
                action = %request.action,
                roles = ?subject_roles,
                reason = %decision.reason,
                "access denied"
            );
        }
        decision
    }

    pub fn get_user_permissions(&self, subject_roles: &[String]) -> Vec<Permission> {
        self.snapshot().user_permissions(subject_roles)
    }

    pub fn check_permission(&self, role_id: &str, permission_id: &str) -> bool {
        self.snapshot().check_permission(role_id, permission_id)
    }

    pub fn get_role_hierarchy(&self) -> BTreeMap<String, Vec<String>> {
        self.snapshot().role_hierarchy()
    }

    pub fn list_roles(&self) -> Vec<Role> {
        self.snapshot().roles()
    }

    pub fn list_permissions(&self) -> Vec<Permission> {
        self.snapshot().permissions()
    }

    pub fn list_policies(&self) -> Vec<Policy> {
        self.snapshot().policies()
    }

    pub fn get_role(&self, id: &str) -> Result<Role> {
        self.snapshot().role(id)
    }

    pub fn get_permission(&self, id: &str) -> Result<Permission> {
        self.snapshot().permission(id)
    }

    pub fn get_policy(&self, id: &str) -> Result<Policy> {
        self.snapshot().policy(id)
    }

    pub fn create_role(&self, role: Role) -> Result<Role> {
        let role = self.mutate(|s| s.create_role(role))?;
        tracing::info!(role = %role.id, "role created");
        Ok(role)
    }

    pub fn update_role(&self, id: &str, role: Role) -> Result<Role> {
        let role = self.mutate(|s| s.update_role(id, role))?;
        tracing::info!(role = %role.id, "role updated");
        Ok(role)
    }

    pub fn delete_role(&self, id: &str) -> Result<()> {
        self.mutate(|s| s.delete_role(id))?;
        tracing::info!(role = %id, "role deactivated");
        Ok(())
    }

    pub fn create_permission(&self, permission: Permission) -> Result<Permission> {
        let permission = self.mutate(|s| s.create_permission(permission))?;
        tracing::info!(permission = %permission.id, "permission created");
        Ok(permission)
    }

    pub fn update_permission(&self, id: &str, permission: Permission) -> Result<Permission> {
        let permission = self.mutate(|s| s.update_permission(id, permission))?;
        tracing::info!(permission = %permission.id, active = permission.active, "permission updated");
        Ok(permission)
    }

    pub fn delete_permission(&self, id: &str) -> Result<()> {
        self.mutate(|s| s.delete_permission(id))?;
        tracing::info!(permission = %id, "permission deleted");
        Ok(())
    }

    pub fn create_policy(&self, policy: Policy) -> Result<Policy> {
        let policy = self.mutate(|s| s.create_policy(policy))?;
        tracing::info!(policy = %policy.id, effect = ?policy.effect, "policy created");
        Ok(policy)
    }

    pub fn update_policy(&self, id: &str, policy: Policy) -> Result<Policy> {
        let policy = self.mutate(|s| s.update_policy(id, policy))?;
        tracing::info!(policy = %policy.id, "policy updated");
        Ok(policy)
    }

    pub fn delete_policy(&self, id: &str) -> Result<()> {
        self.mutate(|s| s.delete_policy(id))?;
        tracing::info!(policy = %id, "policy deleted");
        Ok(())
    }
}
