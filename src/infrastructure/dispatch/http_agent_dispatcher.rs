// HTTP transport to worker agents
//
// Each attempt is a JSON POST of the DispatchRequest to the agent's
// registered endpoint. Any 2xx response completes the attempt with the
// response body: JSON when it parses, the raw text otherwise, null when empty.

use async_trait::async_trait;
use std::time::Duration;

use crate::agents::dispatch::AgentDispatcher;
use crate::agents::errors::{AgentError, AgentResult};
use crate::agents::types::DispatchRequest;
use crate::domain::agent::Agent;

pub struct HttpAgentDispatcher {
    client: reqwest::Client,
}

impl HttpAgentDispatcher {
    pub fn new(timeout: Duration) -> AgentResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AgentError::ConfigError(format!("HTTP client: {}", e)))?;

        Ok(Self { client })
    }
}

#[async_trait]
impl AgentDispatcher for HttpAgentDispatcher {
    async fn send(&self, agent: &Agent, request: &DispatchRequest) -> AgentResult<serde_json::Value> {
        tracing::debug!(
            agent_id = %agent.id,
            endpoint = %agent.endpoint,
            subtask_id = %request.subtask_id,
            attempt = request.attempt,
            "Dispatching sub-task"
        );

        let response = self
            .client
            .post(&agent.endpoint)
            .json(request)
            .send()
            .await
            .map_err(|e| AgentError::DispatchFailed {
                agent_id: agent.id.to_string(),
                message: e.to_string(),
            })?;

        let status = response.status();
        let body = response.text().await.map_err(|e| AgentError::DispatchFailed {
            agent_id: agent.id.to_string(),
            message: e.to_string(),
        })?;

        if !status.is_success() {
            return Err(AgentError::AgentRejected {
                agent_id: agent.id.to_string(),
                status: status.as_u16(),
                body,
            });
        }

        if body.trim().is_empty() {
            return Ok(serde_json::Value::Null);
        }
        Ok(serde_json::from_str(&body).unwrap_or(serde_json::Value::String(body)))
    }
}
