use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::value_objects::AgentId;
use crate::domain::errors::{DomainError, DomainResult};

/// Registration payload for a remote worker agent
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct NewAgent {
    pub name: String,
    pub endpoint: String,
    pub description: Option<String>,
    pub capabilities: Option<Vec<String>>,
}

impl NewAgent {
    pub fn new(name: impl Into<String>, endpoint: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            endpoint: endpoint.into(),
            ..Default::default()
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_capabilities<I, S>(mut self, capabilities: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.capabilities = Some(capabilities.into_iter().map(Into::into).collect());
        self
    }
}

/// A registered remote worker
///
/// # Invariants
/// - `id` is derived from `name` (see [`AgentId::from_name`])
/// - `endpoint` is an absolute http(s) URL
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Agent {
    pub id: AgentId,
    pub name: String,
    pub endpoint: String,
    pub description: Option<String>,
    pub capabilities: Option<Vec<String>>,
    pub registered_at: DateTime<Utc>,
}

impl Agent {
    /// Validates a registration payload and builds the record
    ///
    /// # Business Rules Enforced
    /// - Name must not be blank
    /// - Endpoint must start with `http://` or `https://`
    pub fn register(new: NewAgent) -> DomainResult<Self> {
        let id = AgentId::from_name(&new.name)?;

        if !(new.endpoint.starts_with("http://") || new.endpoint.starts_with("https://")) {
            return Err(DomainError::InvalidInput(format!(
                "endpoint must be an http(s) URL (got '{}')",
                new.endpoint
            )));
        }

        Ok(Self {
            id,
            name: new.name,
            endpoint: new.endpoint,
            description: new.description,
            capabilities: new.capabilities,
            registered_at: Utc::now(),
        })
    }

    /// Case-insensitive match against the agent's capability tags
    pub fn has_capability(&self, tag: &str) -> bool {
        let tag = tag.to_lowercase();
        self.capabilities
            .iter()
            .flatten()
            .any(|capability| capability.to_lowercase() == tag)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_builds_record_from_payload() {
        let new = NewAgent::new("Research Agent", "http://research:8080/api")
            .with_description("Finds things")
            .with_capabilities(["research"]);

        let agent = Agent::register(new.clone()).unwrap();

        assert_eq!(agent.id.as_str(), "research_agent_agent");
        assert_eq!(agent.name, new.name);
        assert_eq!(agent.endpoint, new.endpoint);
        assert_eq!(agent.description, new.description);
        assert_eq!(agent.capabilities, new.capabilities);
    }

    #[test]
    fn register_rejects_empty_name() {
        let err = Agent::register(NewAgent::new("", "http://x")).unwrap_err();
        assert_eq!(err.kind(), "invalid_input");
    }

    #[test]
    fn register_rejects_non_http_endpoint() {
        assert!(Agent::register(NewAgent::new("Bot", "")).is_err());
        assert!(Agent::register(NewAgent::new("Bot", "ftp://bot")).is_err());
        assert!(Agent::register(NewAgent::new("Bot", "https://bot")).is_ok());
    }

    #[test]
    fn capability_match_ignores_case() {
        let agent = Agent::register(
            NewAgent::new("Coder", "http://coder").with_capabilities(["Development", "rust"]),
        )
        .unwrap();

        assert!(agent.has_capability("development"));
        assert!(agent.has_capability("RUST"));
        assert!(!agent.has_capability("testing"));
    }

    #[test]
    fn agent_without_capabilities_matches_nothing() {
        let agent = Agent::register(NewAgent::new("Plain", "http://plain")).unwrap();
        assert!(!agent.has_capability("research"));
    }
}
