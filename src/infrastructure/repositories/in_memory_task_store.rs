use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::repositories::TaskStore;
use crate::domain::task::{
    Priority, SubtaskId, SubtaskOutcome, SubtaskPlan, Task, TaskMetadata, TaskStatus,
};

#[derive(Debug, Clone)]
struct StoredTask {
    seq: u64,
    task: Task,
}

/// In-memory implementation of TaskStore
///
/// Each task is mutated under its map shard's write guard, which makes the
/// store the single serialisation point for a task's status: two dispatch
/// completions for the same task can never interleave inside
/// `record_subtask_result`. No `.await` happens while a guard is held.
#[derive(Debug, Default)]
pub struct InMemoryTaskStore {
    tasks: DashMap<Uuid, StoredTask>,
    next_seq: AtomicU64,
}

impl InMemoryTaskStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs `f` against the task while holding its entry exclusively
    fn with_task<R>(
        &self,
        task_id: Uuid,
        f: impl FnOnce(&mut Task) -> DomainResult<R>,
    ) -> DomainResult<R> {
        let mut entry = self
            .tasks
            .get_mut(&task_id)
            .ok_or_else(|| DomainError::task_not_found(task_id))?;
        f(&mut entry.task)
    }
}

#[async_trait]
impl TaskStore for InMemoryTaskStore {
    async fn create(
        &self,
        description: String,
        priority: Priority,
        metadata: Option<TaskMetadata>,
    ) -> DomainResult<Uuid> {
        let (task, event) = Task::new(description, priority, metadata)?;
        let task_id = task.id();
        tracing::info!(task_id = %task_id, description = %task.description(), "Task created");

        let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
        self.tasks.insert(task_id, StoredTask { seq, task });
        event.log();

        Ok(task_id)
    }

    async fn get(&self, task_id: Uuid) -> DomainResult<Task> {
        self.tasks
            .get(&task_id)
            .map(|entry| entry.task.clone())
            .ok_or_else(|| DomainError::task_not_found(task_id))
    }

    async fn list(&self) -> Vec<Task> {
        let mut entries: Vec<StoredTask> =
            self.tasks.iter().map(|entry| entry.value().clone()).collect();
        entries.sort_by_key(|stored| stored.seq);
        entries.into_iter().map(|stored| stored.task).collect()
    }

    async fn update_status(&self, task_id: Uuid, status: TaskStatus) -> DomainResult<()> {
        let event = self.with_task(task_id, |task| task.transition_to(status))?;
        event.log();
        Ok(())
    }

    async fn mark_failed(&self, task_id: Uuid, reason: String) -> DomainResult<()> {
        let event = self.with_task(task_id, |task| task.fail(reason))?;
        event.log();
        Ok(())
    }

    async fn attach_subtasks(&self, task_id: Uuid, subtasks: Vec<SubtaskPlan>) -> DomainResult<()> {
        let count = subtasks.len();
        self.with_task(task_id, |task| task.attach_subtasks(subtasks))?;
        tracing::debug!(task_id = %task_id, count, "Sub-tasks attached");
        Ok(())
    }

    async fn begin_subtask_attempt(&self, task_id: Uuid, subtask_id: SubtaskId) -> DomainResult<u32> {
        self.with_task(task_id, |task| task.begin_subtask_attempt(subtask_id))
    }

    async fn record_subtask_result(
        &self,
        task_id: Uuid,
        subtask_id: SubtaskId,
        outcome: SubtaskOutcome,
    ) -> DomainResult<TaskStatus> {
        let (status, event) =
            self.with_task(task_id, |task| task.record_subtask_result(subtask_id, outcome))?;
        if let Some(event) = event {
            event.log();
        }
        Ok(status)
    }

    async fn skip_pending_subtasks(&self, task_id: Uuid) -> DomainResult<usize> {
        self.with_task(task_id, |task| Ok(task.skip_pending_subtasks()))
    }

    async fn purge_finished(&self, before: DateTime<Utc>) -> usize {
        let mut purged = 0;
        self.tasks.retain(|_, stored| {
            let expired = stored.task.status().is_terminal()
                && stored.task.finished_at().is_some_and(|at| at < before);
            if expired {
                purged += 1;
            }
            !expired
        });
        if purged > 0 {
            tracing::info!(purged, "Purged finished tasks");
        }
        purged
    }
}
