use std::time::Duration;
use thiserror::Error;

use crate::domain::errors::DomainError;

/// Errors raised by collaborators of the orchestration core:
/// remote worker agents and the reasoning gateway
#[derive(Debug, Error)]
pub enum AgentError {
    #[error("LLM API error: {0}")]
    LlmError(String),

    #[error("Reasoning gateway timed out after {0:?}")]
    GatewayTimeout(Duration),

    #[error("JSON parsing error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Dispatch to {agent_id} failed: {message}")]
    DispatchFailed { agent_id: String, message: String },

    #[error("Agent {agent_id} rejected sub-task with HTTP {status}: {body}")]
    AgentRejected {
        agent_id: String,
        status: u16,
        body: String,
    },

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error(transparent)]
    Domain(#[from] DomainError),
}

pub type AgentResult<T> = Result<T, AgentError>;
