use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::domain::errors::DomainError;

/// Represents the lifecycle status of a task
///
/// # Status Transitions
/// ```text
/// Created -> Planned -> Running -> Completed
///    |          |          +-----> Failed
///    +----------+-----------------> Failed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    /// Task has been accepted but not yet decomposed
    Created,
    /// Sub-tasks are attached and assigned
    Planned,
    /// Sub-tasks are being dispatched
    Running,
    /// Every sub-task completed
    Completed,
    /// A sub-task exhausted its retries or planning/dispatch failed
    Failed,
}

impl TaskStatus {
    /// Checks if a transition from current status to next status is valid
    ///
    /// # Valid Transitions
    /// - Created -> Planned
    /// - Planned -> Running
    /// - Running -> Completed
    /// - Created | Planned | Running -> Failed
    ///
    /// # Example
    /// ```
    /// use orchestrator_api::domain::task::value_objects::TaskStatus;
    ///
    /// assert!(TaskStatus::Created.can_transition_to(TaskStatus::Planned));
    /// assert!(!TaskStatus::Created.can_transition_to(TaskStatus::Running));
    /// ```
    pub fn can_transition_to(&self, next: TaskStatus) -> bool {
        use TaskStatus::*;
        matches!(
            (self, next),
            (Created, Planned)
                | (Planned, Running)
                | (Running, Completed)
                | (Created, Failed)
                | (Planned, Failed)
                | (Running, Failed)
        )
    }

    /// Completed and Failed admit no further transitions
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Failed)
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskStatus::Created => write!(f, "created"),
            TaskStatus::Planned => write!(f, "planned"),
            TaskStatus::Running => write!(f, "running"),
            TaskStatus::Completed => write!(f, "completed"),
            TaskStatus::Failed => write!(f, "failed"),
        }
    }
}

/// Task priority as accepted by the API
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    Medium,
    High,
    Highest,
}

impl Default for Priority {
    fn default() -> Self {
        Priority::Medium
    }
}

impl FromStr for Priority {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "low" => Ok(Priority::Low),
            "medium" => Ok(Priority::Medium),
            "high" => Ok(Priority::High),
            "highest" => Ok(Priority::Highest),
            other => Err(DomainError::InvalidInput(format!(
                "priority must be one of low, medium, high, highest (got '{}')",
                other
            ))),
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Priority::Low => write!(f, "low"),
            Priority::Medium => write!(f, "medium"),
            Priority::High => write!(f, "high"),
            Priority::Highest => write!(f, "highest"),
        }
    }
}

/// Identifier of a sub-task, unique within its parent task
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubtaskId(pub u32);

impl fmt::Display for SubtaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "st-{}", self.0)
    }
}

/// Lifecycle status of a single sub-task
///
/// ```text
/// Pending -> Running -> Completed
///    |          +-----> Failed
///    +----------------> Skipped
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubtaskStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Skipped,
}

impl SubtaskStatus {
    pub fn can_transition_to(&self, next: SubtaskStatus) -> bool {
        use SubtaskStatus::*;
        matches!(
            (self, next),
            (Pending, Running)
                | (Running, Running)
                | (Running, Completed)
                | (Running, Failed)
                | (Running, Skipped)
                | (Pending, Skipped)
        )
    }
}

impl fmt::Display for SubtaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SubtaskStatus::Pending => write!(f, "pending"),
            SubtaskStatus::Running => write!(f, "running"),
            SubtaskStatus::Completed => write!(f, "completed"),
            SubtaskStatus::Failed => write!(f, "failed"),
            SubtaskStatus::Skipped => write!(f, "skipped"),
        }
    }
}
