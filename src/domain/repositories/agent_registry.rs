use async_trait::async_trait;

use crate::domain::agent::{Agent, AgentId, NewAgent};
use crate::domain::errors::DomainResult;

/// Registry of remote worker agents
///
/// Implementations must serialise mutations per agent id while letting
/// operations on different ids proceed independently.
#[async_trait]
pub trait AgentRegistry: Send + Sync {
    /// Register an agent, replacing any record with the same derived id
    async fn register(&self, agent: NewAgent) -> DomainResult<AgentId>;

    /// Remove an agent; `false` when the id is unknown
    async fn unregister(&self, agent_id: &AgentId) -> bool;

    /// Snapshot of all agents in registration order
    async fn list(&self) -> Vec<Agent>;

    /// Find an agent by its id
    async fn get(&self, agent_id: &AgentId) -> DomainResult<Agent>;
}
