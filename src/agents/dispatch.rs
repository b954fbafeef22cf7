// Dispatch port for remote worker agents
//
// The agent-side protocol is owned by the agents; the coordinator only
// needs "send a sub-task, get a result or an error".

use async_trait::async_trait;

use super::errors::AgentResult;
use super::types::DispatchRequest;
use crate::domain::agent::Agent;

#[async_trait]
pub trait AgentDispatcher: Send + Sync {
    /// Deliver one attempt of a sub-task to `agent` and wait for its result
    async fn send(&self, agent: &Agent, request: &DispatchRequest) -> AgentResult<serde_json::Value>;
}
