use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::api::errors::ApiError;
use crate::api::AppState;
use crate::domain::agent::{Agent, AgentId, NewAgent};

/// Request body for registering an agent
#[derive(Debug, Deserialize)]
pub struct RegisterAgentRequest {
    pub name: String,
    pub endpoint: String,
    pub description: Option<String>,
    pub capabilities: Option<Vec<String>>,
}

#[derive(Debug, Serialize)]
pub struct AgentResponse {
    pub id: String,
    pub name: String,
    pub endpoint: String,
    pub description: Option<String>,
    pub capabilities: Option<Vec<String>>,
    pub registered_at: DateTime<Utc>,
}

impl From<Agent> for AgentResponse {
    fn from(agent: Agent) -> Self {
        Self {
            id: agent.id.to_string(),
            name: agent.name,
            endpoint: agent.endpoint,
            description: agent.description,
            capabilities: agent.capabilities,
            registered_at: agent.registered_at,
        }
    }
}

/// Register (or re-register) an agent
///
/// POST /agents
pub async fn register_agent(
    State(orchestrator): State<AppState>,
    payload: Result<Json<RegisterAgentRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<AgentResponse>), ApiError> {
    let Json(req) = payload?;

    let agent = orchestrator
        .register_agent(NewAgent {
            name: req.name,
            endpoint: req.endpoint,
            description: req.description,
            capabilities: req.capabilities,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(AgentResponse::from(agent))))
}

/// List agents in registration order
///
/// GET /agents
pub async fn list_agents(State(orchestrator): State<AppState>) -> Json<Vec<AgentResponse>> {
    let agents = orchestrator.list_agents().await;
    Json(agents.into_iter().map(AgentResponse::from).collect())
}

/// GET /agents/:agent_id
pub async fn get_agent(
    State(orchestrator): State<AppState>,
    Path(agent_id): Path<String>,
) -> Result<Json<AgentResponse>, ApiError> {
    let agent = orchestrator.get_agent(&AgentId::from_raw(agent_id)).await?;
    Ok(Json(AgentResponse::from(agent)))
}

/// DELETE /agents/:agent_id
pub async fn unregister_agent(
    State(orchestrator): State<AppState>,
    Path(agent_id): Path<String>,
) -> Result<StatusCode, ApiError> {
    if orchestrator.unregister_agent(&AgentId::from_raw(&agent_id)).await {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::not_found(format!("Agent not found: {}", agent_id)))
    }
}
