//! Task group definitions and scheduling policy.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use crate::core::resources::Quantity;
use crate::core::ShimError;

/// Toleration attached to placeholder pods.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Toleration {
    /// Taint key.
    pub key: String,
    /// `Exists` or `Equal`.
    pub operator: String,
    /// Taint value.
    pub value: String,
    /// Taint effect.
    pub effect: String,
    /// Seconds the toleration holds for `NoExecute` taints.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub toleration_seconds: Option<i64>,
}

/// A gang: `min_member` tasks that each need at least `min_resource`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskGroup {
    /// Group name, unique within the application.
    pub name: String,
    /// Members that must be reserved before the gang runs.
    pub min_member: u32,
    /// Per-member minimum resources keyed by pod resource name.
    #[serde(default)]
    pub min_resource: BTreeMap<String, Quantity>,
    /// Node selector applied to placeholders.
    #[serde(default)]
    pub node_selector: BTreeMap<String, String>,
    /// Tolerations applied to placeholders.
    #[serde(default)]
    pub tolerations: Vec<Toleration>,
}

impl TaskGroup {
    /// Group with no resources or placement hints.
    #[must_use]
    pub fn new(name: impl Into<String>, min_member: u32) -> Self {
        Self {
            name: name.into(),
            min_member,
            min_resource: BTreeMap::new(),
            node_selector: BTreeMap::new(),
            tolerations: Vec::new(),
        }
    }

    /// Builder-style: add a per-member minimum.
    ///
    /// # Errors
    ///
    /// Returns [`ShimError::InvalidQuantity`] if `quantity` does not parse.
    pub fn with_min_resource(
        mut self,
        name: impl Into<String>,
        quantity: &str,
    ) -> Result<Self, ShimError> {
        self.min_resource.insert(name.into(), quantity.parse()?);
        Ok(self)
    }
}

/// Parse the task group list stored in a pod annotation.
///
/// # Errors
///
/// Returns [`ShimError::Config`] when the JSON is malformed or a quantity
/// does not parse.
pub fn task_groups_from_json(json: &str) -> Result<Vec<TaskGroup>, ShimError> {
    serde_json::from_str(json).map_err(|e| ShimError::Config(format!("task groups: {e}")))
}

/// Retry behaviour requested for an application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SchedulingPolicyType {
    /// Single attempt.
    TryOnce,
    /// Retry up to a limit.
    MaxRetry,
    /// Retry with backoff.
    Backoff,
    /// Reserve before running.
    TryReserve,
    /// Preempt to make room.
    TryPreempt,
}

/// Scheduling policy: optional variant plus free-form parameters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchedulingPolicy {
    /// Policy variant, `None` when unset.
    pub policy_type: Option<SchedulingPolicyType>,
    /// Variant-specific parameters.
    pub parameters: BTreeMap<String, String>,
}

/// Owner reference stamped on placeholder pods.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OwnerReference {
    /// API version of the owner.
    pub api_version: String,
    /// Owner kind.
    pub kind: String,
    /// Owner name.
    pub name: String,
    /// Owner uid.
    pub uid: String,
    /// Whether the owner is the managing controller.
    #[serde(default)]
    pub controller: bool,
}

/// Instance count per task group name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskGroupCounts {
    counts: HashMap<String, u32>,
}

impl TaskGroupCounts {
    /// Empty counts.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `n` instances to `group`.
    pub fn add(&mut self, group: &str, n: u32) {
        let entry = self.counts.entry(group.to_string()).or_insert(0);
        *entry = entry.saturating_add(n);
    }

    /// Add one instance to `group`.
    pub fn add_one(&mut self, group: &str) {
        self.add(group, 1);
    }

    /// Count for `group`, zero if absent.
    #[must_use]
    pub fn get(&self, group: &str) -> u32 {
        self.counts.get(group).copied().unwrap_or(0)
    }

    /// Number of groups tracked.
    #[must_use]
    pub fn len(&self) -> usize {
        self.counts.len()
    }

    /// True when no group is tracked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }
}
