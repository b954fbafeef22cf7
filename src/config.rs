//! Orchestrator configuration
//!
//! Built once at process start and passed by reference to constructors.
//! The JSON file keeps the agent-config layout (a top-level `orchestrator`
//! object) and accepts optional sections for everything else.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::agents::coordinator::RetryPolicy;

pub const CONFIG_PATH_ENV: &str = "AGENT_CONFIG_PATH";
pub const DEFAULT_CONFIG_PATH: &str = "/app/config/agents/agent-config.json";
pub const GATEWAY_API_KEY_ENV: &str = "PORTKEY_API_KEY";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid configuration JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Identity and model settings of the orchestrator itself
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorProfile {
    pub name: String,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub system_prompt: String,
}

impl Default for OrchestratorProfile {
    fn default() -> Self {
        Self {
            name: "CEO Orchestrator".to_string(),
            model: "gpt-4o".to_string(),
            temperature: 0.2,
            max_tokens: 2000,
            system_prompt: "You are the CEO Orchestrator agent for 371GPT.".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: IpAddr,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: 8080,
        }
    }
}

impl ServerConfig {
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

/// Sub-task dispatch settings
///
/// `max_retries` counts retries after the first attempt; 0 means a single
/// attempt per sub-task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    pub max_retries: u32,
    pub retry_delay_ms: u64,
    pub timeout_secs: u64,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            max_retries: 0,
            retry_delay_ms: 500,
            timeout_secs: 30,
        }
    }
}

impl DispatchConfig {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_retries, Duration::from_millis(self.retry_delay_ms))
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    pub base_url: String,
    pub provider: String,
    pub timeout_secs: u64,
    /// Read from the environment, never from the file
    #[serde(skip)]
    pub api_key: Option<String>,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.portkey.ai/v1".to_string(),
            provider: "openai".to_string(),
            timeout_secs: 30,
            api_key: None,
        }
    }
}

impl GatewayConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlannerStrategy {
    /// Never decomposes; every task completes without dispatch
    None,
    /// Keyword/capability rules
    Capability,
    /// Ask the reasoning gateway, falling back to capability rules
    Reasoning,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlannerConfig {
    pub strategy: PlannerStrategy,
    /// Category tag -> keywords that classify a step into it
    pub categories: BTreeMap<String, Vec<String>>,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        let categories = [
            ("research", &["research", "investigate", "analyze", "analyse", "study"][..]),
            ("development", &["implement", "develop", "build", "code", "fix", "refactor"][..]),
            ("testing", &["test", "verify", "validate"][..]),
            ("writing", &["write", "document", "draft", "summarize", "summarise"][..]),
            ("review", &["review", "audit"][..]),
            ("deployment", &["deploy", "release", "ship"][..]),
        ]
        .into_iter()
        .map(|(tag, keywords)| {
            (
                tag.to_string(),
                keywords.iter().map(|k| k.to_string()).collect(),
            )
        })
        .collect();

        Self {
            strategy: PlannerStrategy::Capability,
            categories,
        }
    }
}

/// Eviction of finished tasks; disabled unless a TTL is set
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetentionConfig {
    pub finished_task_ttl_secs: Option<u64>,
    pub sweep_interval_secs: u64,
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            finished_task_ttl_secs: None,
            sweep_interval_secs: 60,
        }
    }
}

/// Complete, immutable configuration of a running orchestrator
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    pub orchestrator: OrchestratorProfile,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub dispatch: DispatchConfig,
    #[serde(default)]
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub planner: PlannerConfig,
    #[serde(default)]
    pub retention: RetentionConfig,
}

impl OrchestratorConfig {
    /// Loads configuration, falling back to defaults on any failure
    ///
    /// Path resolution: `path`, then `$AGENT_CONFIG_PATH`, then
    /// [`DEFAULT_CONFIG_PATH`]. The gateway API key is read from
    /// `$PORTKEY_API_KEY`.
    pub fn load(path: Option<&Path>) -> Self {
        let path = path.map(Path::to_path_buf).unwrap_or_else(|| {
            std::env::var(CONFIG_PATH_ENV)
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH))
        });

        let mut config = match Self::from_file(&path) {
            Ok(config) => {
                tracing::info!(path = %path.display(), "Loaded orchestrator configuration");
                config
            }
            Err(e) => {
                tracing::error!("Failed to load configuration: {}", e);
                Self::default()
            }
        };

        config.gateway.api_key = std::env::var(GATEWAY_API_KEY_ENV)
            .ok()
            .filter(|key| !key.is_empty());
        if config.gateway.api_key.is_none() {
            tracing::warn!("{} not found in environment variables", GATEWAY_API_KEY_ENV);
        }

        tracing::info!(name = %config.orchestrator.name, "Orchestrator configuration ready");
        config
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&raw)
    }

    /// Parses the file format; the `orchestrator` object is required
    pub fn from_json(raw: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(raw)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_fallback_profile() {
        let config = OrchestratorConfig::default();

        assert_eq!(config.orchestrator.name, "CEO Orchestrator");
        assert_eq!(config.orchestrator.model, "gpt-4o");
        assert_eq!(config.orchestrator.temperature, 0.2);
        assert_eq!(config.orchestrator.max_tokens, 2000);
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.dispatch.max_retries, 0);
        assert_eq!(config.planner.strategy, PlannerStrategy::Capability);
        assert!(config.retention.finished_task_ttl_secs.is_none());
    }

    #[test]
    fn parses_agent_config_layout() {
        let raw = r#"{
            "orchestrator": {
                "name": "Chief",
                "model": "gpt-4o-mini",
                "temperature": 0.5,
                "max_tokens": 512,
                "system_prompt": "Coordinate."
            },
            "dispatch": { "max_retries": 2, "retry_delay_ms": 10 },
            "planner": { "strategy": "reasoning" }
        }"#;

        let config = OrchestratorConfig::from_json(raw).unwrap();

        assert_eq!(config.orchestrator.name, "Chief");
        assert_eq!(config.orchestrator.max_tokens, 512);
        assert_eq!(config.dispatch.max_retries, 2);
        assert_eq!(config.dispatch.timeout_secs, 30);
        assert_eq!(config.planner.strategy, PlannerStrategy::Reasoning);
        assert!(!config.planner.categories.is_empty());
    }

    #[test]
    fn missing_orchestrator_key_is_an_error() {
        let err = OrchestratorConfig::from_json(r#"{"server": {"port": 1}}"#).unwrap_err();
        assert!(err.to_string().contains("orchestrator"));
    }

    #[test]
    fn partial_profile_fills_defaults() {
        let config =
            OrchestratorConfig::from_json(r#"{"orchestrator": {"name": "Mini"}}"#).unwrap();

        assert_eq!(config.orchestrator.name, "Mini");
        assert_eq!(config.orchestrator.model, "gpt-4o");
    }

    #[test]
    fn load_falls_back_on_missing_file() {
        let config = OrchestratorConfig::load(Some(Path::new("/definitely/not/here.json")));
        assert_eq!(config.orchestrator, OrchestratorProfile::default());
    }

    #[test]
    fn load_reads_file_from_disk() {
        let path = std::env::temp_dir().join(format!("orchestrator-config-{}.json", uuid::Uuid::new_v4()));
        std::fs::write(&path, r#"{"orchestrator": {"name": "From Disk"}, "server": {"port": 9090}}"#)
            .unwrap();

        let config = OrchestratorConfig::load(Some(&path));
        std::fs::remove_file(&path).ok();

        assert_eq!(config.orchestrator.name, "From Disk");
        assert_eq!(config.server.socket_addr().port(), 9090);
    }

    #[test]
    fn retry_policy_from_dispatch_section() {
        let dispatch = DispatchConfig {
            max_retries: 3,
            retry_delay_ms: 100,
            timeout_secs: 5,
        };

        let policy = dispatch.retry_policy();
        assert_eq!(policy.max_retries, 3);
        assert_eq!(policy.base_delay, Duration::from_millis(100));
    }
}
