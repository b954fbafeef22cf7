// Execution coordinator
//
// Drives a planned task to a terminal status: dispatches every sub-task
// whose dependencies have completed, runs independent sub-tasks
// concurrently, and reports each settled attempt to the task store, which
// decides the parent status (first failure wins, last success wins).

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use uuid::Uuid;

use super::dispatch::AgentDispatcher;
use super::errors::AgentResult;
use super::types::DispatchRequest;
use crate::domain::agent::AgentId;
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::repositories::{AgentRegistry, TaskStore};
use crate::domain::task::{Priority, Subtask, SubtaskId, SubtaskOutcome, TaskStatus};

/// Bounded retry with exponential backoff
///
/// `max_retries` counts retries after the first attempt. The n-th retry
/// waits `base_delay * 2^(n-1)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, base_delay: Duration) -> Self {
        Self {
            max_retries,
            base_delay,
        }
    }

    /// Single attempt, no retries
    pub fn none() -> Self {
        Self::new(0, Duration::ZERO)
    }

    pub fn delay_for(&self, retry: u32) -> Duration {
        let exponent = retry.saturating_sub(1).min(16);
        self.base_delay.saturating_mul(1u32 << exponent)
    }
}

/// How one sub-task settled, as seen by the coordinator loop
#[derive(Debug)]
struct Settled {
    subtask_id: SubtaskId,
    parent_status: TaskStatus,
    result: Option<serde_json::Value>,
}

#[derive(Clone)]
pub struct ExecutionCoordinator {
    registry: Arc<dyn AgentRegistry>,
    store: Arc<dyn TaskStore>,
    dispatcher: Arc<dyn AgentDispatcher>,
    retry: RetryPolicy,
}

impl ExecutionCoordinator {
    pub fn new(
        registry: Arc<dyn AgentRegistry>,
        store: Arc<dyn TaskStore>,
        dispatcher: Arc<dyn AgentDispatcher>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            registry,
            store,
            dispatcher,
            retry,
        }
    }

    /// Runs a `planned` task until it completes or fails
    ///
    /// Returns the final task status. A task with no sub-tasks completes
    /// immediately. Once the parent has failed no further sub-task is
    /// dispatched; in-flight attempts are awaited and never-dispatched
    /// sub-tasks are marked skipped.
    pub async fn run(&self, task_id: Uuid) -> DomainResult<TaskStatus> {
        let task = self.store.get(task_id).await?;
        if task.status() != TaskStatus::Planned {
            return Err(DomainError::NotDispatchable {
                task_id,
                status: task.status(),
            });
        }

        self.store.update_status(task_id, TaskStatus::Running).await?;
        if task.subtasks().is_empty() {
            self.store.update_status(task_id, TaskStatus::Completed).await?;
            return Ok(TaskStatus::Completed);
        }

        let priority = task.priority();
        let mut waiting: BTreeMap<SubtaskId, Subtask> = task
            .subtasks()
            .iter()
            .map(|subtask| (subtask.id, subtask.clone()))
            .collect();
        let mut results: BTreeMap<SubtaskId, serde_json::Value> = BTreeMap::new();
        let mut in_flight = JoinSet::new();
        let mut parent_status = TaskStatus::Running;

        loop {
            if parent_status == TaskStatus::Running {
                let ready: Vec<SubtaskId> = waiting
                    .values()
                    .filter(|subtask| subtask.depends_on.iter().all(|dep| results.contains_key(dep)))
                    .map(|subtask| subtask.id)
                    .collect();

                for id in ready {
                    let Some(subtask) = waiting.remove(&id) else {
                        continue;
                    };
                    let dependency_results = subtask
                        .depends_on
                        .iter()
                        .filter_map(|dep| results.get(dep).map(|value| (*dep, value.clone())))
                        .collect();

                    let this = self.clone();
                    in_flight.spawn(async move {
                        this.dispatch_subtask(task_id, subtask, priority, dependency_results)
                            .await
                    });
                }
            }

            let Some(joined) = in_flight.join_next().await else {
                break;
            };

            match joined {
                Ok(Ok(settled)) => {
                    parent_status = settled.parent_status;
                    if let Some(result) = settled.result {
                        results.insert(settled.subtask_id, result);
                    }
                }
                Ok(Err(e)) => {
                    tracing::error!(task_id = %task_id, error = %e, "Sub-task bookkeeping failed");
                    parent_status = self.fail(task_id, format!("sub-task bookkeeping failed: {}", e)).await;
                }
                Err(e) => {
                    tracing::error!(task_id = %task_id, error = %e, "Sub-task dispatch panicked");
                    parent_status = self.fail(task_id, format!("sub-task dispatch aborted: {}", e)).await;
                }
            }
        }

        let mut final_status = self.store.get(task_id).await?.status();
        if final_status == TaskStatus::Running {
            tracing::warn!(task_id = %task_id, waiting = waiting.len(), "No eligible sub-tasks remain");
            final_status = self
                .fail(task_id, "execution stalled: no eligible sub-tasks remain".to_string())
                .await;
        }

        if final_status == TaskStatus::Failed {
            let skipped = self.store.skip_pending_subtasks(task_id).await?;
            if skipped > 0 {
                tracing::info!(task_id = %task_id, skipped, "Skipped sub-tasks of failed task");
            }
        }

        Ok(final_status)
    }

    /// Dispatches one sub-task, retrying per policy, and records how it settled
    async fn dispatch_subtask(
        &self,
        task_id: Uuid,
        subtask: Subtask,
        priority: Priority,
        dependency_results: BTreeMap<SubtaskId, serde_json::Value>,
    ) -> DomainResult<Settled> {
        let mut retries = 0;

        loop {
            let attempt = match self.store.begin_subtask_attempt(task_id, subtask.id).await {
                Ok(attempt) => attempt,
                Err(DomainError::NotDispatchable { status, .. }) => {
                    tracing::info!(
                        task_id = %task_id,
                        subtask_id = %subtask.id,
                        parent_status = %status,
                        "Parent no longer running, skipping sub-task"
                    );
                    let parent_status = self
                        .store
                        .record_subtask_result(task_id, subtask.id, SubtaskOutcome::Skipped)
                        .await?;
                    return Ok(Settled {
                        subtask_id: subtask.id,
                        parent_status,
                        result: None,
                    });
                }
                Err(e) => return Err(e),
            };

            let request = DispatchRequest {
                task_id,
                subtask_id: subtask.id,
                description: subtask.description.clone(),
                priority,
                attempt,
                dependency_results: dependency_results.clone(),
            };

            match self.attempt(&subtask.agent_id, &request).await {
                Ok(result) => {
                    tracing::info!(
                        task_id = %task_id,
                        subtask_id = %subtask.id,
                        agent_id = %subtask.agent_id,
                        attempt,
                        "Sub-task completed"
                    );
                    let parent_status = self
                        .store
                        .record_subtask_result(task_id, subtask.id, SubtaskOutcome::Completed(result.clone()))
                        .await?;
                    return Ok(Settled {
                        subtask_id: subtask.id,
                        parent_status,
                        result: Some(result),
                    });
                }
                Err(e) if retries < self.retry.max_retries => {
                    retries += 1;
                    let delay = self.retry.delay_for(retries);
                    tracing::warn!(
                        task_id = %task_id,
                        subtask_id = %subtask.id,
                        attempt,
                        error = %e,
                        "Sub-task attempt failed, retrying in {:?}",
                        delay
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => {
                    tracing::error!(
                        task_id = %task_id,
                        subtask_id = %subtask.id,
                        agent_id = %subtask.agent_id,
                        attempt,
                        error = %e,
                        "Sub-task failed"
                    );
                    let reason = format!("{} (after {} attempts)", e, attempt);
                    let parent_status = self
                        .store
                        .record_subtask_result(task_id, subtask.id, SubtaskOutcome::Failed(reason))
                        .await?;
                    return Ok(Settled {
                        subtask_id: subtask.id,
                        parent_status,
                        result: None,
                    });
                }
            }
        }
    }

    /// One attempt: resolve the agent now, then send
    async fn attempt(&self, agent_id: &str, request: &DispatchRequest) -> AgentResult<serde_json::Value> {
        let agent = match self.registry.get(&AgentId::from_raw(agent_id)).await {
            Ok(agent) => agent,
            Err(DomainError::NotFound { .. }) => {
                return Err(DomainError::AgentNotFound(agent_id.to_string()).into());
            }
            Err(e) => return Err(e.into()),
        };

        self.dispatcher.send(&agent, request).await
    }

    /// Fails the task unless it already reached a terminal status
    async fn fail(&self, task_id: Uuid, reason: String) -> TaskStatus {
        match self.store.mark_failed(task_id, reason).await {
            Ok(()) => TaskStatus::Failed,
            Err(e) => {
                tracing::debug!(task_id = %task_id, error = %e, "Task not marked failed");
                self.store
                    .get(task_id)
                    .await
                    .map(|task| task.status())
                    .unwrap_or(TaskStatus::Failed)
            }
        }
    }
}
