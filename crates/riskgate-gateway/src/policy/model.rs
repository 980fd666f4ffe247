//! Roles, permissions, policies and the decisions evaluated from them.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Matches any subject, resource or action in a policy.
pub const WILDCARD: &str = "*";

fn active() -> bool {
    true
}

/// Atomic `resource:action` grant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Permission {
    /// Defaults to `resource:action` when left empty.
    #[serde(default)]
    pub id: String,
    pub resource: String,
    pub action: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "active")]
    pub active: bool,
}

impl Permission {
    pub fn new(resource: &str, action: &str) -> Self {
        Self {
            id: format!("{resource}:{action}"),
            resource: resource.to_string(),
            action: action.to_string(),
            description: String::new(),
            active: true,
        }
    }

    pub(crate) fn normalize(mut self) -> Self {
        if self.id.trim().is_empty() {
            self.id = format!("{}:{}", self.resource, self.action);
        }
        self
    }

    pub fn grants(&self, resource: &str, action: &str) -> bool {
        self.active && self.resource == resource && self.action == action
    }
}

/// Named bundle of permissions, optionally inheriting other roles.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Role {
    /// Taken from the path on update.
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    /// Permission ids.
    #[serde(default)]
    pub permissions: BTreeSet<String>,
    /// Role ids this role inherits from.
    #[serde(default)]
    pub inherits: BTreeSet<String>,
    #[serde(default = "active")]
    pub active: bool,
}

impl Role {
    pub fn new(id: &str, name: &str) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            permissions: BTreeSet::new(),
            inherits: BTreeSet::new(),
            active: true,
        }
    }

    pub fn with_permissions<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.permissions.extend(ids.into_iter().map(Into::into));
        self
    }

    pub fn inheriting<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.inherits.extend(ids.into_iter().map(Into::into));
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Effect {
    Allow,
    Deny,
}

/// Explicit allow/deny rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Policy {
    #[serde(default)]
    pub id: String,
    pub effect: Effect,
    /// Role ids, or `*`.
    pub subjects: BTreeSet<String>,
    pub resources: BTreeSet<String>,
    pub actions: BTreeSet<String>,
    /// Every key must be present in the request context with an equal value.
    #[serde(default)]
    pub conditions: BTreeMap<String, serde_json::Value>,
    #[serde(default)]
    pub description: String,
    #[serde(default = "active")]
    pub active: bool,
}

impl Policy {
    pub fn new<S, R, A>(id: &str, effect: Effect, subjects: S, resources: R, actions: A) -> Self
    where
        S: IntoIterator<Item = &'static str>,
        R: IntoIterator<Item = &'static str>,
        A: IntoIterator<Item = &'static str>,
    {
        Self {
            id: id.to_string(),
            effect,
            subjects: subjects.into_iter().map(str::to_string).collect(),
            resources: resources.into_iter().map(str::to_string).collect(),
            actions: actions.into_iter().map(str::to_string).collect(),
            conditions: BTreeMap::new(),
            description: String::new(),
            active: true,
        }
    }

    pub fn with_condition(mut self, key: &str, value: serde_json::Value) -> Self {
        self.conditions.insert(key.to_string(), value);
        self
    }

    pub fn describe(mut self, description: &str) -> Self {
        self.description = description.to_string();
        self
    }
}

/// One authorization question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AccessRequest {
    pub resource: String,
    pub action: String,
    #[serde(default)]
    pub context: BTreeMap<String, serde_json::Value>,
}

impl AccessRequest {
    pub fn new(resource: &str, action: &str) -> Self {
        Self {
            resource: resource.to_string(),
            action: action.to_string(),
            context: BTreeMap::new(),
        }
    }

    pub fn with_context(mut self, key: &str, value: serde_json::Value) -> Self {
        self.context.insert(key.to_string(), value);
        self
    }
}

/// Outcome of `check_access`. Not persisted; audit consumers receive it as is.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AccessDecision {
    pub allowed: bool,
    /// Policy that decided, if any.
    pub policy: Option<Policy>,
    /// Outer role that granted through the role fallback, if any.
    pub role: Option<String>,
    pub reason: String,
    pub timestamp: DateTime<Utc>,
    pub context: BTreeMap<String, serde_json::Value>,
}

impl AccessDecision {
    pub(crate) fn new(allowed: bool, reason: String, request: &AccessRequest) -> Self {
        Self {
            allowed,
            policy: None,
            role: None,
            reason,
            timestamp: Utc::now(),
            context: request.context.clone(),
        }
    }
}
