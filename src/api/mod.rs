// API layer module (adapters for controllers)
// Follows Hexagonal Architecture - API is an adapter

use std::sync::Arc;

use crate::agents::Orchestrator;

pub mod errors;
pub mod handlers;
pub mod router;

pub use router::router;

/// Shared state handed to every handler
pub type AppState = Arc<Orchestrator>;
