//! Orchestrator API Library
//!
//! Agent registry, task store, planning and execution coordination for
//! work delegated to remote worker agents, exposed over HTTP.

pub mod agents;
pub mod api;
pub mod config;
pub mod domain;
pub mod infrastructure;
