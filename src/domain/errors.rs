use thiserror::Error;
use uuid::Uuid;

use super::task::value_objects::{SubtaskId, TaskStatus};

/// Errors raised by the registry, the task store and the planning pipeline
///
/// Every variant carries a human-readable message (its `Display`) and a
/// stable machine-readable [`kind`](DomainError::kind) so the transport
/// boundary can expose both.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DomainError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("Invalid state transition from {from} to {to}")]
    InvalidTransition { from: String, to: String },

    #[error("Task {0} already has a plan attached")]
    AlreadyPlanned(Uuid),

    #[error("No capable agent registered for: {0}")]
    NoCapableAgent(String),

    #[error("Dependency cycle between sub-tasks: {}", format_ids(.0))]
    CyclicDependency(Vec<SubtaskId>),

    #[error("Invalid plan: {0}")]
    InvalidPlan(String),

    #[error("Agent not found: {0}")]
    AgentNotFound(String),

    #[error("Task {task_id} cannot be executed in {status} status")]
    NotDispatchable { task_id: Uuid, status: TaskStatus },
}

impl DomainError {
    pub fn task_not_found(id: Uuid) -> Self {
        Self::NotFound {
            entity: "Task",
            id: id.to_string(),
        }
    }

    pub fn agent_not_found(id: impl Into<String>) -> Self {
        Self::NotFound {
            entity: "Agent",
            id: id.into(),
        }
    }

    pub fn subtask_not_found(task_id: Uuid, subtask_id: SubtaskId) -> Self {
        Self::NotFound {
            entity: "Sub-task",
            id: format!("{}/{}", task_id, subtask_id),
        }
    }

    /// Stable identifier for the error category
    pub fn kind(&self) -> &'static str {
        match self {
            DomainError::InvalidInput(_) => "invalid_input",
            DomainError::NotFound { .. } => "not_found",
            DomainError::InvalidTransition { .. } => "invalid_transition",
            DomainError::AlreadyPlanned(_) => "already_planned",
            DomainError::NoCapableAgent(_) => "no_capable_agent",
            DomainError::CyclicDependency(_) => "cyclic_dependency",
            DomainError::InvalidPlan(_) => "invalid_plan",
            DomainError::AgentNotFound(_) => "agent_not_found",
            DomainError::NotDispatchable { .. } => "not_dispatchable",
        }
    }
}

fn format_ids(ids: &[SubtaskId]) -> String {
    ids.iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

pub type DomainResult<T> = Result<T, DomainError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_are_stable() {
        assert_eq!(DomainError::InvalidInput("x".into()).kind(), "invalid_input");
        assert_eq!(DomainError::task_not_found(Uuid::nil()).kind(), "not_found");
        assert_eq!(
            DomainError::CyclicDependency(vec![SubtaskId(1)]).kind(),
            "cyclic_dependency"
        );
    }

    #[test]
    fn cycle_message_lists_members() {
        let err = DomainError::CyclicDependency(vec![SubtaskId(1), SubtaskId(2)]);
        assert_eq!(err.to_string(), "Dependency cycle between sub-tasks: st-1, st-2");
    }

    #[test]
    fn not_found_message_names_entity() {
        let err = DomainError::agent_not_found("research_agent");
        assert_eq!(err.to_string(), "Agent not found: research_agent");
    }
}
