//! End-to-end API integration tests
//!
//! These tests drive the complete HTTP surface through the router:
//! - Agent registration, lookup and removal
//! - Task creation, execution and status polling
//! - Error bodies for invalid input and unknown ids

use axum::{
    body::Body,
    http::{Request, StatusCode},
    routing::post,
    Json, Router,
};
use orchestrator_api::agents::Orchestrator;
use orchestrator_api::api;
use orchestrator_api::config::OrchestratorConfig;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tower::util::ServiceExt; // for oneshot

/// Setup test application over default configuration
fn setup_app() -> Router {
    let orchestrator = Orchestrator::from_config(&OrchestratorConfig::default())
        .expect("Failed to build orchestrator");
    api::router(Arc::new(orchestrator))
}

async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .header("Content-Type", "application/json")
        .body(match body {
            Some(body) => Body::from(body.to_string()),
            None => Body::empty(),
        })
        .unwrap();

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, json)
}

/// Polls the task until it leaves the non-terminal statuses
async fn wait_for_terminal(app: &Router, task_id: &str) -> Value {
    for _ in 0..200 {
        let (status, task) = send(app, "GET", &format!("/tasks/{}", task_id), None).await;
        assert_eq!(status, StatusCode::OK);
        if task["status"] == "completed" || task["status"] == "failed" {
            return task;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("task {} never finished", task_id);
}

/// Worker agent that echoes the sub-task description
async fn spawn_worker() -> String {
    let app = Router::new().route(
        "/run",
        post(|Json(body): Json<Value>| async move {
            Json(json!({ "summary": format!("did: {}", body["description"].as_str().unwrap_or_default()) }))
        }),
    );
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}/run", addr)
}

#[tokio::test]
async fn test_health_check() {
    let app = setup_app();

    let (status, body) = send(&app, "GET", "/health", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert!(chrono::DateTime::parse_from_rfc3339(body["timestamp"].as_str().unwrap()).is_ok());
}

#[tokio::test]
async fn test_agent_registration_flow() {
    let app = setup_app();

    let (status, agent) = send(
        &app,
        "POST",
        "/agents",
        Some(json!({
            "name": "Research Agent",
            "endpoint": "http://research:8080",
            "description": "Finds sources",
            "capabilities": ["research"]
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(agent["id"], "research_agent_agent");
    assert_eq!(agent["endpoint"], "http://research:8080");

    let (status, agents) = send(&app, "GET", "/agents", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(agents.as_array().unwrap().len(), 1);

    let (status, fetched) = send(&app, "GET", "/agents/research_agent_agent", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched["capabilities"], json!(["research"]));

    let (status, _) = send(&app, "DELETE", "/agents/research_agent_agent", None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, body) = send(&app, "DELETE", "/agents/research_agent_agent", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn test_register_agent_rejects_empty_name() {
    let app = setup_app();

    let (status, body) = send(
        &app,
        "POST",
        "/agents",
        Some(json!({ "name": "", "endpoint": "http://x" })),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["kind"], "invalid_input");
}

#[tokio::test]
async fn test_malformed_json_is_bad_request() {
    let app = setup_app();

    let request = Request::builder()
        .method("POST")
        .uri("/tasks")
        .header("Content-Type", "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_create_task_rejects_bad_priority() {
    let app = setup_app();

    let (status, body) = send(
        &app,
        "POST",
        "/tasks",
        Some(json!({ "description": "X", "priority": "urgent" })),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["kind"], "invalid_input");
}

#[tokio::test]
async fn test_task_without_work_runs_to_completion() {
    let app = setup_app();

    let (status, created) = send(
        &app,
        "POST",
        "/tasks",
        Some(json!({ "description": "X", "priority": "high" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["status"], "created");
    assert!(created["created_at"].is_string());
    let task_id = created["task_id"].as_str().unwrap().to_string();

    let (status, body) = send(&app, "POST", &format!("/tasks/{}/execute", task_id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "status": "executing", "task_id": task_id }));

    let task = wait_for_terminal(&app, &task_id).await;
    assert_eq!(task["status"], "completed");
    assert_eq!(task["priority"], "high");
    assert_eq!(task["subtasks"], json!([]));
}

#[tokio::test]
async fn test_task_dispatches_to_registered_worker() {
    let app = setup_app();
    let endpoint = spawn_worker().await;

    let (status, _) = send(
        &app,
        "POST",
        "/agents",
        Some(json!({ "name": "Scout", "endpoint": endpoint, "capabilities": ["research"] })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (_, created) = send(
        &app,
        "POST",
        "/tasks",
        Some(json!({ "description": "Research the competition", "metadata": { "source": "ui" } })),
    )
    .await;
    let task_id = created["task_id"].as_str().unwrap().to_string();

    let (status, _) = send(&app, "POST", &format!("/tasks/{}/execute", task_id), None).await;
    assert_eq!(status, StatusCode::OK);

    let task = wait_for_terminal(&app, &task_id).await;
    assert_eq!(task["status"], "completed");
    assert_eq!(task["metadata"]["source"], "ui");
    assert_eq!(task["subtasks"][0]["agent_id"], "scout_agent");
    assert_eq!(
        task["subtasks"][0]["result"]["summary"],
        "did: Research the competition"
    );
}

#[tokio::test]
async fn test_planning_failure_marks_task_failed() {
    let app = setup_app();

    let (_, created) = send(
        &app,
        "POST",
        "/tasks",
        Some(json!({ "description": "Deploy the release" })),
    )
    .await;
    let task_id = created["task_id"].as_str().unwrap().to_string();

    send(&app, "POST", &format!("/tasks/{}/execute", task_id), None).await;

    let task = wait_for_terminal(&app, &task_id).await;
    assert_eq!(task["status"], "failed");
    assert!(task["failure_reason"].as_str().unwrap().contains("No capable agent"));
}

#[tokio::test]
async fn test_execute_finished_task_is_not_dispatchable() {
    let app = setup_app();

    let (_, created) = send(&app, "POST", "/tasks", Some(json!({ "description": "X" }))).await;
    let task_id = created["task_id"].as_str().unwrap().to_string();
    send(&app, "POST", &format!("/tasks/{}/execute", task_id), None).await;
    wait_for_terminal(&app, &task_id).await;

    let (status, body) = send(&app, "POST", &format!("/tasks/{}/execute", task_id), None).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["kind"], "not_dispatchable");
}

#[tokio::test]
async fn test_unknown_task_is_not_found() {
    let app = setup_app();
    let unknown = uuid::Uuid::new_v4();

    let (status, body) = send(&app, "GET", &format!("/tasks/{}", unknown), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["kind"], "not_found");

    let (status, _) = send(&app, "POST", &format!("/tasks/{}/execute", unknown), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(&app, "GET", "/tasks/not-a-uuid", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_list_tasks_in_creation_order() {
    let app = setup_app();

    for description in ["first", "second"] {
        send(&app, "POST", "/tasks", Some(json!({ "description": description }))).await;
    }

    let (status, tasks) = send(&app, "GET", "/tasks", None).await;

    assert_eq!(status, StatusCode::OK);
    let descriptions: Vec<&str> = tasks
        .as_array()
        .unwrap()
        .iter()
        .map(|t| t["description"].as_str().unwrap())
        .collect();
    assert_eq!(descriptions, vec!["first", "second"]);
}
