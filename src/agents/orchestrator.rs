use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use uuid::Uuid;

use super::coordinator::ExecutionCoordinator;
use super::errors::AgentResult;
use super::planner::{build_planner, validate_plan, TaskPlanner};
use super::reasoning::ReasoningGateway;
use super::types::PlanRequest;
use crate::config::{OrchestratorConfig, OrchestratorProfile};
use crate::domain::agent::{Agent, AgentId, NewAgent};
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::repositories::{AgentRegistry, TaskStore};
use crate::domain::task::{Priority, Task, TaskMetadata, TaskStatus};
use crate::infrastructure::dispatch::HttpAgentDispatcher;
use crate::infrastructure::llm::PortkeyGateway;
use crate::infrastructure::repositories::{InMemoryAgentRegistry, InMemoryTaskStore};

/// Facade over the registry, the task store and the execution pipeline
///
/// Shared as `Arc<Orchestrator>` by the HTTP handlers and the background
/// executions it spawns.
pub struct Orchestrator {
    profile: OrchestratorProfile,
    registry: Arc<dyn AgentRegistry>,
    store: Arc<dyn TaskStore>,
    planner: Arc<dyn TaskPlanner>,
    coordinator: ExecutionCoordinator,
    /// Tasks with an execution pipeline in flight
    executions: DashMap<Uuid, ()>,
}

impl Orchestrator {
    pub fn new(
        profile: OrchestratorProfile,
        registry: Arc<dyn AgentRegistry>,
        store: Arc<dyn TaskStore>,
        planner: Arc<dyn TaskPlanner>,
        coordinator: ExecutionCoordinator,
    ) -> Self {
        tracing::info!(name = %profile.name, model = %profile.model, "Orchestrator initialized");
        Self {
            profile,
            registry,
            store,
            planner,
            coordinator,
            executions: DashMap::new(),
        }
    }

    /// Wires in-memory state, the Portkey gateway and HTTP dispatch
    pub fn from_config(config: &OrchestratorConfig) -> AgentResult<Self> {
        let registry: Arc<dyn AgentRegistry> = Arc::new(InMemoryAgentRegistry::new());
        let store: Arc<dyn TaskStore> = Arc::new(InMemoryTaskStore::new());
        let gateway: Arc<dyn ReasoningGateway> =
            Arc::new(PortkeyGateway::new(&config.gateway, &config.orchestrator)?);
        let dispatcher = Arc::new(HttpAgentDispatcher::new(config.dispatch.timeout())?);

        let planner = build_planner(
            &config.planner,
            gateway,
            &config.orchestrator.system_prompt,
            config.gateway.timeout(),
        );
        let coordinator = ExecutionCoordinator::new(
            registry.clone(),
            store.clone(),
            dispatcher,
            config.dispatch.retry_policy(),
        );

        Ok(Self::new(
            config.orchestrator.clone(),
            registry,
            store,
            planner,
            coordinator,
        ))
    }

    pub fn profile(&self) -> &OrchestratorProfile {
        &self.profile
    }

    // ===== Agents =====

    pub async fn register_agent(&self, new: NewAgent) -> DomainResult<Agent> {
        let agent_id = self.registry.register(new).await?;
        self.registry.get(&agent_id).await
    }

    pub async fn unregister_agent(&self, agent_id: &AgentId) -> bool {
        self.registry.unregister(agent_id).await
    }

    pub async fn list_agents(&self) -> Vec<Agent> {
        self.registry.list().await
    }

    pub async fn get_agent(&self, agent_id: &AgentId) -> DomainResult<Agent> {
        self.registry.get(agent_id).await
    }

    // ===== Tasks =====

    /// Creates a task; a missing priority defaults to `medium`
    pub async fn create_task(
        &self,
        description: String,
        priority: Option<&str>,
        metadata: Option<TaskMetadata>,
    ) -> DomainResult<Task> {
        let priority = match priority {
            Some(raw) => raw.parse::<Priority>()?,
            None => Priority::default(),
        };
        let task_id = self.store.create(description, priority, metadata).await?;
        self.store.get(task_id).await
    }

    pub async fn get_task(&self, task_id: Uuid) -> DomainResult<Task> {
        self.store.get(task_id).await
    }

    pub async fn list_tasks(&self) -> Vec<Task> {
        self.store.list().await
    }

    /// Starts the plan -> validate -> attach -> coordinate pipeline in the background
    ///
    /// Only a `created` task with no execution in flight is accepted; the
    /// handle resolves to the task's final status.
    pub async fn execute_task(self: &Arc<Self>, task_id: Uuid) -> DomainResult<JoinHandle<TaskStatus>> {
        let task = self.store.get(task_id).await?;
        if task.status() != TaskStatus::Created {
            return Err(DomainError::NotDispatchable {
                task_id,
                status: task.status(),
            });
        }

        let claimed = match self.executions.entry(task_id) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(());
                true
            }
        };
        if !claimed {
            return Err(DomainError::NotDispatchable {
                task_id,
                status: task.status(),
            });
        }

        // A pipeline may have finished between the read above and the claim
        let status = match self.store.get(task_id).await {
            Ok(task) => task.status(),
            Err(e) => {
                self.executions.remove(&task_id);
                return Err(e);
            }
        };
        if status != TaskStatus::Created {
            self.executions.remove(&task_id);
            return Err(DomainError::NotDispatchable { task_id, status });
        }

        tracing::info!(task_id = %task_id, "Task execution started");
        let this = Arc::clone(self);
        Ok(tokio::spawn(async move {
            let status = this.run_pipeline(task_id).await;
            this.executions.remove(&task_id);
            tracing::info!(task_id = %task_id, status = %status, "Task execution finished");
            status
        }))
    }

    async fn run_pipeline(&self, task_id: Uuid) -> TaskStatus {
        let task = match self.store.get(task_id).await {
            Ok(task) => task,
            Err(e) => {
                tracing::error!(task_id = %task_id, error = %e, "Task vanished before planning");
                return TaskStatus::Failed;
            }
        };

        let agents = self.registry.list().await;
        let request = PlanRequest {
            task_id,
            description: task.description().to_string(),
            priority: task.priority(),
        };

        let plan = match self.planner.plan(&request, &agents).await {
            Ok(plan) => plan,
            Err(e) => return self.abort(task_id, format!("planning failed: {}", e)).await,
        };
        if let Err(e) = validate_plan(&plan, &agents) {
            return self.abort(task_id, format!("invalid plan: {}", e)).await;
        }
        if let Err(e) = self.store.attach_subtasks(task_id, plan).await {
            return self.abort(task_id, format!("attaching plan failed: {}", e)).await;
        }
        if let Err(e) = self.store.update_status(task_id, TaskStatus::Planned).await {
            return self.abort(task_id, format!("planning failed: {}", e)).await;
        }

        match self.coordinator.run(task_id).await {
            Ok(status) => status,
            Err(e) => self.abort(task_id, format!("execution failed: {}", e)).await,
        }
    }

    async fn abort(&self, task_id: Uuid, reason: String) -> TaskStatus {
        tracing::warn!(task_id = %task_id, reason = %reason, "Aborting task");
        if let Err(e) = self.store.mark_failed(task_id, reason).await {
            tracing::error!(task_id = %task_id, error = %e, "Could not mark task failed");
        }
        TaskStatus::Failed
    }

    // ===== Retention =====

    /// Periodically drops completed/failed tasks older than `ttl`
    pub fn spawn_retention_sweeper(self: &Arc<Self>, ttl: Duration, every: Duration) -> JoinHandle<()> {
        let this = Arc::clone(self);
        let ttl = chrono::Duration::seconds(ttl.as_secs().min(u32::MAX as u64) as i64);

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(every);
            loop {
                interval.tick().await;
                let purged = this.store.purge_finished(chrono::Utc::now() - ttl).await;
                if purged > 0 {
                    tracing::info!(purged, "Purged finished tasks");
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::coordinator::RetryPolicy;
    use crate::agents::dispatch::AgentDispatcher;
    use crate::agents::planner::CapabilityPlanner;
    use crate::agents::types::DispatchRequest;
    use async_trait::async_trait;

    struct EchoDispatcher;

    #[async_trait]
    impl AgentDispatcher for EchoDispatcher {
        async fn send(&self, _agent: &Agent, request: &DispatchRequest) -> AgentResult<serde_json::Value> {
            Ok(serde_json::json!({ "done": request.description }))
        }
    }

    fn orchestrator() -> Arc<Orchestrator> {
        let registry: Arc<dyn AgentRegistry> = Arc::new(InMemoryAgentRegistry::new());
        let store: Arc<dyn TaskStore> = Arc::new(InMemoryTaskStore::new());
        let coordinator = ExecutionCoordinator::new(
            registry.clone(),
            store.clone(),
            Arc::new(EchoDispatcher),
            RetryPolicy::none(),
        );
        Arc::new(Orchestrator::new(
            OrchestratorProfile::default(),
            registry,
            store,
            Arc::new(CapabilityPlanner::with_default_categories()),
            coordinator,
        ))
    }

    #[tokio::test]
    async fn create_task_defaults_to_medium() {
        let orchestrator = orchestrator();

        let task = orchestrator.create_task("X".to_string(), None, None).await.unwrap();

        assert_eq!(task.priority(), Priority::Medium);
        assert_eq!(task.status(), TaskStatus::Created);
    }

    #[tokio::test]
    async fn create_task_rejects_unknown_priority() {
        let err = orchestrator()
            .create_task("X".to_string(), Some("urgent"), None)
            .await
            .unwrap_err();

        assert_eq!(err.kind(), "invalid_input");
    }

    #[tokio::test]
    async fn execute_without_work_completes() {
        let orchestrator = orchestrator();
        let task = orchestrator.create_task("X".to_string(), Some("high"), None).await.unwrap();

        let status = orchestrator.execute_task(task.id()).await.unwrap().await.unwrap();

        assert_eq!(status, TaskStatus::Completed);
        assert!(orchestrator.get_task(task.id()).await.unwrap().subtasks().is_empty());
    }

    #[tokio::test]
    async fn execute_dispatches_to_capable_agent() {
        let orchestrator = orchestrator();
        orchestrator
            .register_agent(NewAgent::new("Scribe", "http://scribe").with_capabilities(["writing"]))
            .await
            .unwrap();
        let task = orchestrator
            .create_task("Write the release notes".to_string(), None, None)
            .await
            .unwrap();

        let status = orchestrator.execute_task(task.id()).await.unwrap().await.unwrap();

        assert_eq!(status, TaskStatus::Completed);
        let task = orchestrator.get_task(task.id()).await.unwrap();
        assert_eq!(task.subtasks()[0].agent_id, "scribe_agent");
    }

    #[tokio::test]
    async fn planning_failure_fails_created_task() {
        let orchestrator = orchestrator();
        let task = orchestrator
            .create_task("Deploy everything".to_string(), None, None)
            .await
            .unwrap();

        let status = orchestrator.execute_task(task.id()).await.unwrap().await.unwrap();

        assert_eq!(status, TaskStatus::Failed);
        let task = orchestrator.get_task(task.id()).await.unwrap();
        assert!(task.failure_reason().unwrap().contains("No capable agent"));
    }

    #[tokio::test]
    async fn execute_twice_is_not_dispatchable() {
        let orchestrator = orchestrator();
        let task = orchestrator.create_task("X".to_string(), None, None).await.unwrap();

        orchestrator.execute_task(task.id()).await.unwrap().await.unwrap();
        let err = orchestrator.execute_task(task.id()).await.unwrap_err();

        assert_eq!(err.kind(), "not_dispatchable");
    }

    #[tokio::test]
    async fn execute_unknown_task_is_not_found() {
        let err = orchestrator().execute_task(Uuid::new_v4()).await.unwrap_err();
        assert_eq!(err.kind(), "not_found");
    }
}
