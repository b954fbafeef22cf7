use uuid::Uuid;

use super::value_objects::Priority;

/// Domain events that occur within the Task aggregate
///
/// Every lifecycle transition produces exactly one event. The task store
/// logs them; they are also returned to callers so tests can observe the
/// transition sequence.
///
/// # Example
/// ```
/// use orchestrator_api::domain::task::events::TaskEvent;
/// use uuid::Uuid;
///
/// let event = TaskEvent::Started { task_id: Uuid::new_v4() };
/// assert_eq!(event.name(), "started");
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum TaskEvent {
    /// Fired when a task is accepted
    Created {
        task_id: Uuid,
        priority: Priority,
    },
    /// Fired when the planner's sub-tasks have been accepted
    Planned {
        task_id: Uuid,
        /// Number of sub-tasks in the accepted plan
        subtask_count: usize,
    },
    /// Fired when dispatch begins
    Started { task_id: Uuid },
    /// Fired when the last outstanding sub-task succeeds
    Completed { task_id: Uuid },
    /// Fired on the first failure
    Failed {
        task_id: Uuid,
        /// Reason for failure
        reason: String,
    },
}

impl TaskEvent {
    /// Returns the task_id for this event
    pub fn task_id(&self) -> Uuid {
        match self {
            TaskEvent::Created { task_id, .. } => *task_id,
            TaskEvent::Planned { task_id, .. } => *task_id,
            TaskEvent::Started { task_id } => *task_id,
            TaskEvent::Completed { task_id } => *task_id,
            TaskEvent::Failed { task_id, .. } => *task_id,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            TaskEvent::Created { .. } => "created",
            TaskEvent::Planned { .. } => "planned",
            TaskEvent::Started { .. } => "started",
            TaskEvent::Completed { .. } => "completed",
            TaskEvent::Failed { .. } => "failed",
        }
    }

    /// Emits the event to the log
    pub fn log(&self) {
        match self {
            TaskEvent::Failed { task_id, reason } => {
                tracing::warn!(task_id = %task_id, reason = %reason, "task failed");
            }
            TaskEvent::Planned {
                task_id,
                subtask_count,
            } => {
                tracing::info!(task_id = %task_id, subtask_count, "task planned");
            }
            other => {
                tracing::info!(task_id = %other.task_id(), event = other.name(), "task lifecycle event");
            }
        }
    }
}
