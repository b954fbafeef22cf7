use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;

use crate::domain::task::{Priority, SubtaskId};

/// One Thought -> Action -> Observation step from the reasoning gateway
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReasoningStep {
    pub thought: String,
    pub action: String,
    pub observation: String,
    /// Set when the step was synthesised after a gateway failure
    #[serde(default)]
    pub degraded: bool,
}

impl ReasoningStep {
    pub fn new(
        thought: impl Into<String>,
        action: impl Into<String>,
        observation: impl Into<String>,
    ) -> Self {
        Self {
            thought: thought.into(),
            action: action.into(),
            observation: observation.into(),
            degraded: false,
        }
    }

    /// The no-op step returned in place of a failed gateway call
    pub fn degraded(error: &impl fmt::Display) -> Self {
        Self {
            thought: "Error occurred during processing".to_string(),
            action: "Log error".to_string(),
            observation: format!("Exception: {}", error),
            degraded: true,
        }
    }
}

/// What the planner is asked to decompose
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlanRequest {
    pub task_id: Uuid,
    pub description: String,
    pub priority: Priority,
}

/// Payload posted to a worker agent's endpoint for one attempt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DispatchRequest {
    pub task_id: Uuid,
    pub subtask_id: SubtaskId,
    pub description: String,
    pub priority: Priority,
    pub attempt: u32,
    /// Results of completed dependencies, keyed by the same numeric id as `subtask_id`
    pub dependency_results: BTreeMap<SubtaskId, serde_json::Value>,
}
