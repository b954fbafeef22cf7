use chrono::{DateTime, Utc};
use std::collections::HashSet;
use uuid::Uuid;

use super::events::TaskEvent;
use super::subtask::{Subtask, SubtaskOutcome, SubtaskPlan};
use super::value_objects::{Priority, SubtaskId, SubtaskStatus, TaskStatus};
use crate::domain::errors::{DomainError, DomainResult};

pub type TaskMetadata = serde_json::Map<String, serde_json::Value>;

/// Task aggregate root
///
/// A unit of work submitted by a client, decomposed into sub-tasks and
/// driven through its lifecycle by the coordinator.
///
/// # Invariants
/// - Description cannot be empty
/// - Status only moves forward (see [`TaskStatus::can_transition_to`])
/// - The sub-task set is attached once and its membership never changes
/// - A task cannot become `planned` before a plan is attached
/// - `completed` only once every sub-task has completed
///
/// # Example
/// ```
/// use orchestrator_api::domain::task::{Task, Priority, TaskStatus};
///
/// let (task, _event) = Task::new("Ship it".to_string(), Priority::High, None)
///     .expect("valid task");
///
/// assert_eq!(task.status(), TaskStatus::Created);
/// assert!(task.subtasks().is_empty());
/// ```
#[derive(Debug, Clone)]
pub struct Task {
    id: Uuid,
    description: String,
    priority: Priority,
    status: TaskStatus,
    subtasks: Vec<Subtask>,
    plan_attached: bool,
    metadata: TaskMetadata,
    failure_reason: Option<String>,
    created_at: DateTime<Utc>,
    started_at: Option<DateTime<Utc>>,
    finished_at: Option<DateTime<Utc>>,
}

impl Task {
    /// Creates a new Task aggregate in `created` status
    ///
    /// # Returns
    /// * `Ok((Task, TaskEvent))` - New task and its Created event
    /// * `Err(DomainError::InvalidInput)` - If the description is blank
    pub fn new(
        description: String,
        priority: Priority,
        metadata: Option<TaskMetadata>,
    ) -> DomainResult<(Self, TaskEvent)> {
        if description.trim().is_empty() {
            return Err(DomainError::InvalidInput(
                "description cannot be empty".to_string(),
            ));
        }

        let task = Self {
            id: Uuid::new_v4(),
            description,
            priority,
            status: TaskStatus::Created,
            subtasks: Vec::new(),
            plan_attached: false,
            metadata: metadata.unwrap_or_default(),
            failure_reason: None,
            created_at: Utc::now(),
            started_at: None,
            finished_at: None,
        };

        let event = TaskEvent::Created {
            task_id: task.id,
            priority,
        };

        Ok((task, event))
    }

    /// Attaches the planner's output
    ///
    /// Allowed exactly once, while the task is still `created`. Sub-task ids
    /// must be unique and dependencies must point inside the plan.
    pub fn attach_subtasks(&mut self, plans: Vec<SubtaskPlan>) -> DomainResult<()> {
        if self.plan_attached || !self.subtasks.is_empty() {
            return Err(DomainError::AlreadyPlanned(self.id));
        }
        if self.status != TaskStatus::Created {
            return Err(DomainError::InvalidTransition {
                from: self.status.to_string(),
                to: TaskStatus::Planned.to_string(),
            });
        }

        let mut ids = HashSet::with_capacity(plans.len());
        for plan in &plans {
            if !ids.insert(plan.id) {
                return Err(DomainError::InvalidPlan(format!(
                    "duplicate sub-task id {}",
                    plan.id
                )));
            }
        }
        for plan in &plans {
            if let Some(missing) = plan.depends_on.iter().find(|dep| !ids.contains(dep)) {
                return Err(DomainError::InvalidPlan(format!(
                    "{} depends on unknown sub-task {}",
                    plan.id, missing
                )));
            }
        }

        self.subtasks = plans.into_iter().map(Subtask::from).collect();
        self.plan_attached = true;
        Ok(())
    }

    /// Moves the task to `next`, enforcing the state machine
    ///
    /// Moving to `failed` through this path records a generic reason; use
    /// [`Task::fail`] to supply one.
    pub fn transition_to(&mut self, next: TaskStatus) -> DomainResult<TaskEvent> {
        if next == TaskStatus::Failed {
            return self.fail("marked failed".to_string());
        }
        self.ensure_transition(next)?;

        match next {
            TaskStatus::Planned if !self.plan_attached => {
                return Err(DomainError::InvalidPlan(format!(
                    "task {} has no plan attached",
                    self.id
                )));
            }
            TaskStatus::Completed if !self.all_subtasks_completed() => {
                return Err(DomainError::InvalidTransition {
                    from: self.status.to_string(),
                    to: next.to_string(),
                });
            }
            _ => {}
        }

        let event = match next {
            TaskStatus::Planned => TaskEvent::Planned {
                task_id: self.id,
                subtask_count: self.subtasks.len(),
            },
            TaskStatus::Running => {
                self.started_at = Some(Utc::now());
                TaskEvent::Started { task_id: self.id }
            }
            TaskStatus::Completed => {
                self.finished_at = Some(Utc::now());
                TaskEvent::Completed { task_id: self.id }
            }
            TaskStatus::Created | TaskStatus::Failed => {
                return Err(DomainError::InvalidTransition {
                    from: self.status.to_string(),
                    to: next.to_string(),
                });
            }
        };
        self.status = next;

        Ok(event)
    }

    /// Marks the task as failed
    pub fn fail(&mut self, reason: String) -> DomainResult<TaskEvent> {
        self.ensure_transition(TaskStatus::Failed)?;

        self.status = TaskStatus::Failed;
        self.failure_reason = Some(reason.clone());
        self.finished_at = Some(Utc::now());

        Ok(TaskEvent::Failed {
            task_id: self.id,
            reason,
        })
    }

    /// Registers a dispatch attempt for a sub-task and returns its attempt number
    ///
    /// The parent must be `running`; no new attempt starts once it has
    /// completed or failed.
    pub fn begin_subtask_attempt(&mut self, subtask_id: SubtaskId) -> DomainResult<u32> {
        if self.status != TaskStatus::Running {
            return Err(DomainError::NotDispatchable {
                task_id: self.id,
                status: self.status,
            });
        }

        let task_id = self.id;
        let subtask = self.subtask_mut(subtask_id)?;
        Self::ensure_subtask_transition(subtask, SubtaskStatus::Running)?;

        subtask.status = SubtaskStatus::Running;
        subtask.attempts += 1;
        subtask.updated_at = Utc::now();
        tracing::debug!(
            task_id = %task_id,
            subtask_id = %subtask_id,
            attempt = subtask.attempts,
            "sub-task attempt started"
        );

        Ok(subtask.attempts)
    }

    /// Applies a settled sub-task outcome and decides the parent status
    ///
    /// First failure wins: the parent fails on the first failed sub-task.
    /// Last success wins: the parent completes when the final outstanding
    /// sub-task completes. Outcomes arriving after the parent reached a
    /// terminal status are recorded on the sub-task only.
    pub fn record_subtask_result(
        &mut self,
        subtask_id: SubtaskId,
        outcome: SubtaskOutcome,
    ) -> DomainResult<(TaskStatus, Option<TaskEvent>)> {
        let subtask = self.subtask_mut(subtask_id)?;
        Self::ensure_subtask_transition(subtask, outcome.status())?;

        subtask.status = outcome.status();
        subtask.updated_at = Utc::now();
        let failure = match outcome {
            SubtaskOutcome::Completed(result) => {
                subtask.result = Some(result);
                None
            }
            SubtaskOutcome::Failed(error) => {
                subtask.error = Some(error.clone());
                Some(error)
            }
            SubtaskOutcome::Skipped => None,
        };

        let event = if self.status != TaskStatus::Running {
            None
        } else if let Some(error) = failure {
            Some(self.fail(format!("sub-task {} failed: {}", subtask_id, error))?)
        } else if self.all_subtasks_completed() {
            Some(self.transition_to(TaskStatus::Completed)?)
        } else {
            None
        };

        Ok((self.status, event))
    }

    /// Marks every never-dispatched sub-task as skipped
    pub fn skip_pending_subtasks(&mut self) -> usize {
        let now = Utc::now();
        let mut skipped = 0;
        for subtask in self
            .subtasks
            .iter_mut()
            .filter(|s| s.status == SubtaskStatus::Pending)
        {
            subtask.status = SubtaskStatus::Skipped;
            subtask.updated_at = now;
            skipped += 1;
        }
        skipped
    }

    fn all_subtasks_completed(&self) -> bool {
        self.subtasks
            .iter()
            .all(|s| s.status == SubtaskStatus::Completed)
    }

    fn ensure_transition(&self, next: TaskStatus) -> DomainResult<()> {
        if self.status.can_transition_to(next) {
            Ok(())
        } else {
            Err(DomainError::InvalidTransition {
                from: self.status.to_string(),
                to: next.to_string(),
            })
        }
    }

    fn ensure_subtask_transition(subtask: &Subtask, next: SubtaskStatus) -> DomainResult<()> {
        if subtask.status.can_transition_to(next) {
            Ok(())
        } else {
            Err(DomainError::InvalidTransition {
                from: format!("{} {}", subtask.id, subtask.status),
                to: format!("{} {}", subtask.id, next),
            })
        }
    }

    fn subtask_mut(&mut self, subtask_id: SubtaskId) -> DomainResult<&mut Subtask> {
        let task_id = self.id;
        self.subtasks
            .iter_mut()
            .find(|s| s.id == subtask_id)
            .ok_or_else(|| DomainError::subtask_not_found(task_id, subtask_id))
    }

    // ===== Getters =====

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn priority(&self) -> Priority {
        self.priority
    }

    pub fn status(&self) -> TaskStatus {
        self.status
    }

    pub fn subtasks(&self) -> &[Subtask] {
        &self.subtasks
    }

    pub fn subtask(&self, subtask_id: SubtaskId) -> Option<&Subtask> {
        self.subtasks.iter().find(|s| s.id == subtask_id)
    }

    pub fn is_planned(&self) -> bool {
        self.plan_attached
    }

    pub fn metadata(&self) -> &TaskMetadata {
        &self.metadata
    }

    pub fn failure_reason(&self) -> Option<&str> {
        self.failure_reason.as_deref()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    pub fn finished_at(&self) -> Option<DateTime<Utc>> {
        self.finished_at
    }
}
