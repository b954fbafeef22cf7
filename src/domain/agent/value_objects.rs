use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::errors::DomainError;

/// Registry key of an agent
///
/// # Invariants
/// - Derived deterministically from the agent's display name:
///   lower-cased, spaces replaced by `_`, suffixed with `_agent`
/// - Never empty
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AgentId(String);

impl AgentId {
    /// Derives the id for a display name
    ///
    /// # Example
    /// ```
    /// use orchestrator_api::domain::agent::AgentId;
    ///
    /// let id = AgentId::from_name("Research Agent").expect("valid name");
    /// assert_eq!(id.as_str(), "research_agent_agent");
    /// ```
    pub fn from_name(name: &str) -> Result<Self, DomainError> {
        if name.trim().is_empty() {
            return Err(DomainError::InvalidInput(
                "agent name cannot be empty".to_string(),
            ));
        }
        Ok(AgentId(format!(
            "{}_agent",
            name.to_lowercase().replace(' ', "_")
        )))
    }

    /// Wraps an id received from a caller without re-deriving it
    pub fn from_raw(id: impl Into<String>) -> Self {
        AgentId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derives_lowercase_underscored_id() {
        let id = AgentId::from_name("Development Team Lead").unwrap();
        assert_eq!(id.as_str(), "development_team_lead_agent");
    }

    #[test]
    fn derivation_is_deterministic() {
        assert_eq!(
            AgentId::from_name("Research").unwrap(),
            AgentId::from_name("Research").unwrap()
        );
    }

    #[test]
    fn names_differing_in_case_share_an_id() {
        assert_eq!(
            AgentId::from_name("QA Bot").unwrap(),
            AgentId::from_name("qa bot").unwrap()
        );
    }

    #[test]
    fn empty_name_rejected() {
        assert!(AgentId::from_name("").is_err());
        assert!(AgentId::from_name("   ").is_err());
    }

    #[test]
    fn display_matches_raw() {
        let id = AgentId::from_raw("writer_agent");
        assert_eq!(format!("{}", id), "writer_agent");
    }
}
