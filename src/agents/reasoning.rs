// Reasoning gateway port
//
// The orchestrator consults an external language model for
// Thought -> Action -> Observation steps. The call is slow and unreliable,
// so callers go through `reason_with_fallback`, which bounds it with a
// timeout and never lets a failure escape.

use async_trait::async_trait;
use std::time::Duration;

use super::errors::{AgentError, AgentResult};
use super::types::ReasoningStep;

#[async_trait]
pub trait ReasoningGateway: Send + Sync {
    async fn invoke(
        &self,
        system_prompt: &str,
        context: &serde_json::Value,
    ) -> AgentResult<ReasoningStep>;
}

/// Invokes the gateway with a timeout, degrading to a no-op step on failure
pub async fn reason_with_fallback(
    gateway: &dyn ReasoningGateway,
    timeout: Duration,
    system_prompt: &str,
    context: &serde_json::Value,
) -> ReasoningStep {
    let error = match tokio::time::timeout(timeout, gateway.invoke(system_prompt, context)).await {
        Ok(Ok(step)) => return step,
        Ok(Err(e)) => e,
        Err(_) => AgentError::GatewayTimeout(timeout),
    };

    tracing::error!("Error in think_action_observation: {}", error);
    ReasoningStep::degraded(&error)
}

/// Interprets model output as a reasoning step
///
/// Accepts a bare JSON object or one wrapped in a fenced code block. Any
/// other text becomes the thought of a plain `respond` action.
pub fn parse_step(content: &str) -> ReasoningStep {
    let trimmed = content.trim();
    let unfenced = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|rest| rest.strip_suffix("```"))
        .map(str::trim)
        .unwrap_or(trimmed);

    match serde_json::from_str::<serde_json::Value>(unfenced) {
        Ok(serde_json::Value::Object(fields)) if fields.contains_key("action") => {
            let text = |key: &str| match fields.get(key) {
                Some(serde_json::Value::String(s)) => s.clone(),
                Some(serde_json::Value::Null) | None => String::new(),
                Some(other) => other.to_string(),
            };
            ReasoningStep::new(text("thought"), text("action"), text("observation"))
        }
        _ => ReasoningStep::new(trimmed, "respond", ""),
    }
}

/// Gateway used when no model is reachable; every call fails
pub struct UnavailableGateway {
    reason: String,
}

impl UnavailableGateway {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

#[async_trait]
impl ReasoningGateway for UnavailableGateway {
    async fn invoke(
        &self,
        _system_prompt: &str,
        _context: &serde_json::Value,
    ) -> AgentResult<ReasoningStep> {
        Err(AgentError::LlmError(self.reason.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct FixedGateway(ReasoningStep);

    #[async_trait]
    impl ReasoningGateway for FixedGateway {
        async fn invoke(&self, _: &str, _: &serde_json::Value) -> AgentResult<ReasoningStep> {
            Ok(self.0.clone())
        }
    }

    struct SlowGateway;

    #[async_trait]
    impl ReasoningGateway for SlowGateway {
        async fn invoke(&self, _: &str, _: &serde_json::Value) -> AgentResult<ReasoningStep> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(ReasoningStep::new("late", "late", "late"))
        }
    }

    #[tokio::test]
    async fn passes_through_successful_step() {
        let gateway = FixedGateway(ReasoningStep::new("think", "delegate", "ok"));

        let step =
            reason_with_fallback(&gateway, Duration::from_secs(1), "sys", &json!({})).await;

        assert_eq!(step, ReasoningStep::new("think", "delegate", "ok"));
    }

    #[tokio::test]
    async fn failure_degrades_to_noop() {
        let gateway = UnavailableGateway::new("no api key");

        let step =
            reason_with_fallback(&gateway, Duration::from_secs(1), "sys", &json!({})).await;

        assert!(step.degraded);
        assert!(step.observation.contains("no api key"));
    }

    #[tokio::test]
    async fn timeout_degrades_to_noop() {
        let step =
            reason_with_fallback(&SlowGateway, Duration::from_millis(20), "sys", &json!({}))
                .await;

        assert!(step.degraded);
        assert!(step.observation.contains("timed out"));
    }

    #[test]
    fn parse_step_reads_json_object() {
        let step = parse_step(r#"{"thought": "t", "action": "a", "observation": "o"}"#);
        assert_eq!(step, ReasoningStep::new("t", "a", "o"));
    }

    #[test]
    fn parse_step_strips_code_fence() {
        let step = parse_step("```json\n{\"thought\": \"t\", \"action\": {\"x\": 1}}\n```");
        assert_eq!(step.thought, "t");
        assert_eq!(step.action, r#"{"x":1}"#);
        assert_eq!(step.observation, "");
    }

    #[test]
    fn parse_step_wraps_free_text() {
        let step = parse_step("  I would delegate this.  ");
        assert_eq!(step, ReasoningStep::new("I would delegate this.", "respond", ""));
    }
}
