use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::domain::agent::{Agent, AgentId, NewAgent};
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::repositories::AgentRegistry;

#[derive(Debug, Clone)]
struct Registration {
    seq: u64,
    agent: Agent,
}

/// In-memory implementation of AgentRegistry
///
/// Entries live in a sharded concurrent map, so registrations for different
/// ids do not contend on a single lock while writes to one id serialise on
/// its shard. A monotonically increasing sequence number keeps listing in
/// registration order; a replaced record takes a fresh position.
#[derive(Debug, Default)]
pub struct InMemoryAgentRegistry {
    agents: DashMap<AgentId, Registration>,
    next_seq: AtomicU64,
}

impl InMemoryAgentRegistry {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AgentRegistry for InMemoryAgentRegistry {
    async fn register(&self, new: NewAgent) -> DomainResult<AgentId> {
        let agent = Agent::register(new)?;
        let agent_id = agent.id.clone();
        let name = agent.name.clone();
        let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);

        let previous = self
            .agents
            .insert(agent_id.clone(), Registration { seq, agent });

        if previous.is_some() {
            tracing::warn!(agent_id = %agent_id, "Agent already registered, updating information");
        }
        tracing::info!(agent_id = %agent_id, name = %name, "Agent registered");

        Ok(agent_id)
    }

    async fn unregister(&self, agent_id: &AgentId) -> bool {
        match self.agents.remove(agent_id) {
            Some(_) => {
                tracing::info!(agent_id = %agent_id, "Agent unregistered");
                true
            }
            None => {
                tracing::warn!(agent_id = %agent_id, "Agent not found in registry");
                false
            }
        }
    }

    async fn list(&self) -> Vec<Agent> {
        let mut entries: Vec<Registration> =
            self.agents.iter().map(|entry| entry.value().clone()).collect();
        entries.sort_by_key(|registration| registration.seq);
        entries.into_iter().map(|registration| registration.agent).collect()
    }

    async fn get(&self, agent_id: &AgentId) -> DomainResult<Agent> {
        self.agents
            .get(agent_id)
            .map(|entry| entry.agent.clone())
            .ok_or_else(|| DomainError::agent_not_found(agent_id.as_str()))
    }
}
