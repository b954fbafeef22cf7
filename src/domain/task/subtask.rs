use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use super::value_objects::{SubtaskId, SubtaskStatus};

/// A sub-task as produced by a planner, before it is attached to a task
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubtaskPlan {
    pub id: SubtaskId,
    pub description: String,
    pub agent_id: String,
    #[serde(default)]
    pub depends_on: BTreeSet<SubtaskId>,
}

impl SubtaskPlan {
    pub fn new(id: SubtaskId, description: impl Into<String>, agent_id: impl Into<String>) -> Self {
        Self {
            id,
            description: description.into(),
            agent_id: agent_id.into(),
            depends_on: BTreeSet::new(),
        }
    }

    pub fn depending_on(mut self, deps: impl IntoIterator<Item = SubtaskId>) -> Self {
        self.depends_on.extend(deps);
        self
    }
}

/// Result reported when a dispatch attempt settles
#[derive(Debug, Clone, PartialEq)]
pub enum SubtaskOutcome {
    Completed(serde_json::Value),
    Failed(String),
    /// Never dispatched (or abandoned between retries) because the parent left `running`
    Skipped,
}

impl SubtaskOutcome {
    pub fn status(&self) -> SubtaskStatus {
        match self {
            SubtaskOutcome::Completed(_) => SubtaskStatus::Completed,
            SubtaskOutcome::Failed(_) => SubtaskStatus::Failed,
            SubtaskOutcome::Skipped => SubtaskStatus::Skipped,
        }
    }
}

/// A sub-task attached to a task, owned by the task store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subtask {
    pub id: SubtaskId,
    pub description: String,
    pub agent_id: String,
    pub depends_on: BTreeSet<SubtaskId>,
    pub status: SubtaskStatus,
    pub attempts: u32,
    pub result: Option<serde_json::Value>,
    pub error: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl From<SubtaskPlan> for Subtask {
    fn from(plan: SubtaskPlan) -> Self {
        Self {
            id: plan.id,
            description: plan.description,
            agent_id: plan.agent_id,
            depends_on: plan.depends_on,
            status: SubtaskStatus::Pending,
            attempts: 0,
            result: None,
            error: None,
            updated_at: Utc::now(),
        }
    }
}
