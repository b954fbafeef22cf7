// Infrastructure layer module
// Adapters for the domain ports and the external services the
// orchestrator talks to. Follows Hexagonal Architecture

pub mod dispatch;
pub mod llm;
pub mod repositories;
