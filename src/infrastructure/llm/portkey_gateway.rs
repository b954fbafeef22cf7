// Portkey reasoning gateway adapter
//
// Anti-Corruption Layer for the Portkey gateway, which fronts
// OpenAI-compatible chat completion APIs.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::agents::errors::{AgentError, AgentResult};
use crate::agents::reasoning::{parse_step, ReasoningGateway};
use crate::agents::types::ReasoningStep;
use crate::config::{GatewayConfig, OrchestratorProfile, GATEWAY_API_KEY_ENV};

pub struct PortkeyGateway {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    provider: String,
    model: String,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

impl PortkeyGateway {
    pub fn new(config: &GatewayConfig, profile: &OrchestratorProfile) -> AgentResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| AgentError::ConfigError(format!("HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            provider: config.provider.clone(),
            model: profile.model.clone(),
            temperature: profile.temperature,
            max_tokens: profile.max_tokens,
        })
    }
}

#[async_trait]
impl ReasoningGateway for PortkeyGateway {
    async fn invoke(
        &self,
        system_prompt: &str,
        context: &serde_json::Value,
    ) -> AgentResult<ReasoningStep> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| AgentError::LlmError(format!("{} is not set", GATEWAY_API_KEY_ENV)))?;

        let request = ChatRequest {
            model: self.model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: system_prompt.to_string(),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: serde_json::to_string_pretty(context)?,
                },
            ],
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        };

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .header("x-portkey-api-key", api_key)
            .header("x-portkey-provider", &self.provider)
            .json(&request)
            .send()
            .await
            .map_err(|e| AgentError::LlmError(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();

            return Err(AgentError::LlmError(if status == 401 || status == 403 {
                format!("authentication rejected: {}", error_text)
            } else if status == 429 {
                "rate limited".to_string()
            } else {
                format!("HTTP {}: {}", status, error_text)
            }));
        }

        let body: ChatResponse = response
            .json()
            .await
            .map_err(|e| AgentError::LlmError(format!("Failed to parse response: {}", e)))?;

        let choice = body
            .choices
            .first()
            .ok_or_else(|| AgentError::LlmError("No response from model".to_string()))?;

        Ok(parse_step(&choice.message.content))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{http::HeaderMap, routing::post, Json, Router};
    use serde_json::{json, Value};

    async fn completions(headers: HeaderMap, Json(body): Json<Value>) -> (axum::http::StatusCode, Json<Value>) {
        if headers.get("x-portkey-api-key").is_none() {
            return (axum::http::StatusCode::UNAUTHORIZED, Json(json!({"error": "no key"})));
        }
        assert_eq!(headers["x-portkey-provider"], "openai");
        assert_eq!(body["messages"][0]["role"], "system");

        let content = json!({
            "thought": format!("model {}", body["model"].as_str().unwrap_or_default()),
            "action": "delegate",
            "observation": "ok",
        })
        .to_string();
        (
            axum::http::StatusCode::OK,
            Json(json!({"choices": [{"message": {"role": "assistant", "content": content}}]})),
        )
    }

    async fn spawn_gateway() -> String {
        let app = Router::new().route("/v1/chat/completions", post(completions));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}/v1/", addr)
    }

    fn gateway(base_url: String, api_key: Option<&str>) -> PortkeyGateway {
        let config = GatewayConfig {
            base_url,
            api_key: api_key.map(str::to_string),
            ..GatewayConfig::default()
        };
        PortkeyGateway::new(&config, &OrchestratorProfile::default()).unwrap()
    }

    #[tokio::test]
    async fn parses_completion_into_step() {
        let base_url = spawn_gateway().await;

        let step = gateway(base_url, Some("pk-test"))
            .invoke("You orchestrate.", &json!({"goal": "x"}))
            .await
            .unwrap();

        assert_eq!(step, ReasoningStep::new("model gpt-4o", "delegate", "ok"));
    }

    #[tokio::test]
    async fn missing_key_fails_without_calling_out() {
        let err = gateway("http://127.0.0.1:9".to_string(), None)
            .invoke("sys", &json!({}))
            .await
            .unwrap_err();

        assert!(err.to_string().contains(GATEWAY_API_KEY_ENV));
    }

    #[tokio::test]
    async fn unreachable_gateway_is_llm_error() {
        let err = gateway("http://127.0.0.1:9".to_string(), Some("pk-test"))
            .invoke("sys", &json!({}))
            .await
            .unwrap_err();

        assert!(matches!(err, AgentError::LlmError(_)));
    }
}
