use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::api::errors::ApiError;
use crate::api::AppState;
use crate::domain::task::{Priority, Subtask, Task, TaskMetadata, TaskStatus};

/// Request body for creating a task
#[derive(Debug, Deserialize)]
pub struct CreateTaskRequest {
    pub description: String,
    pub priority: Option<String>,
    pub metadata: Option<TaskMetadata>,
}

/// Response from task creation
#[derive(Debug, Serialize)]
pub struct TaskCreatedResponse {
    pub task_id: Uuid,
    pub status: TaskStatus,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct ExecuteTaskResponse {
    pub status: &'static str,
    pub task_id: Uuid,
}

/// Full task record, sub-tasks included
#[derive(Debug, Serialize)]
pub struct TaskResponse {
    pub task_id: Uuid,
    pub description: String,
    pub priority: Priority,
    pub status: TaskStatus,
    pub subtasks: Vec<Subtask>,
    pub metadata: TaskMetadata,
    pub failure_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl From<&Task> for TaskResponse {
    fn from(task: &Task) -> Self {
        Self {
            task_id: task.id(),
            description: task.description().to_string(),
            priority: task.priority(),
            status: task.status(),
            subtasks: task.subtasks().to_vec(),
            metadata: task.metadata().clone(),
            failure_reason: task.failure_reason().map(str::to_string),
            created_at: task.created_at(),
            started_at: task.started_at(),
            finished_at: task.finished_at(),
        }
    }
}

/// Create a new task
///
/// POST /tasks
pub async fn create_task(
    State(orchestrator): State<AppState>,
    payload: Result<Json<CreateTaskRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<TaskCreatedResponse>), ApiError> {
    let Json(req) = payload?;

    let task = orchestrator
        .create_task(req.description, req.priority.as_deref(), req.metadata)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(TaskCreatedResponse {
            task_id: task.id(),
            status: task.status(),
            created_at: task.created_at(),
        }),
    ))
}

/// List tasks in creation order
///
/// GET /tasks
pub async fn list_tasks(State(orchestrator): State<AppState>) -> Json<Vec<TaskResponse>> {
    let tasks = orchestrator.list_tasks().await;
    Json(tasks.iter().map(TaskResponse::from).collect())
}

/// GET /tasks/:task_id
pub async fn get_task(
    State(orchestrator): State<AppState>,
    Path(task_id): Path<String>,
) -> Result<Json<TaskResponse>, ApiError> {
    let task = orchestrator.get_task(parse_task_id(&task_id)?).await?;
    Ok(Json(TaskResponse::from(&task)))
}

/// Start executing a task in the background
///
/// POST /tasks/:task_id/execute
pub async fn execute_task(
    State(orchestrator): State<AppState>,
    Path(task_id): Path<String>,
) -> Result<Json<ExecuteTaskResponse>, ApiError> {
    let task_id = parse_task_id(&task_id)?;
    orchestrator.execute_task(task_id).await?;

    Ok(Json(ExecuteTaskResponse {
        status: "executing",
        task_id,
    }))
}

/// A malformed id cannot name an existing task
fn parse_task_id(raw: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(raw).map_err(|_| ApiError::not_found(format!("Task not found: {}", raw)))
}
