use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::errors::DomainResult;
use crate::domain::task::{
    Priority, SubtaskId, SubtaskOutcome, SubtaskPlan, Task, TaskMetadata, TaskStatus,
};

/// Owner of every task and sub-task record
///
/// All lifecycle changes go through this trait so the state machine is
/// enforced in one place. Implementations serialise operations on the same
/// task id and must not block operations on other ids.
#[async_trait]
pub trait TaskStore: Send + Sync {
    /// Create a task in `created` status
    async fn create(
        &self,
        description: String,
        priority: Priority,
        metadata: Option<TaskMetadata>,
    ) -> DomainResult<Uuid>;

    /// Snapshot of a task
    async fn get(&self, task_id: Uuid) -> DomainResult<Task>;

    /// Snapshot of all tasks in creation order
    async fn list(&self) -> Vec<Task>;

    /// Move a task to `status`, enforcing the state machine
    async fn update_status(&self, task_id: Uuid, status: TaskStatus) -> DomainResult<()>;

    /// Move a task to `failed`, recording why
    async fn mark_failed(&self, task_id: Uuid, reason: String) -> DomainResult<()>;

    /// Attach the planner's output; fails with `AlreadyPlanned` on a second call
    async fn attach_subtasks(&self, task_id: Uuid, subtasks: Vec<SubtaskPlan>) -> DomainResult<()>;

    /// Start (or retry) a sub-task and return the attempt number
    async fn begin_subtask_attempt(&self, task_id: Uuid, subtask_id: SubtaskId) -> DomainResult<u32>;

    /// Record a settled sub-task and return the resulting parent status
    async fn record_subtask_result(
        &self,
        task_id: Uuid,
        subtask_id: SubtaskId,
        outcome: SubtaskOutcome,
    ) -> DomainResult<TaskStatus>;

    /// Mark never-dispatched sub-tasks as skipped, returning how many changed
    async fn skip_pending_subtasks(&self, task_id: Uuid) -> DomainResult<usize>;

    /// Drop completed/failed tasks that finished before `before`
    async fn purge_finished(&self, before: DateTime<Utc>) -> usize;
}
