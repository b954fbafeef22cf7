// Agent domain module
// Registry records for remote worker agents

#![allow(clippy::module_inception)]

pub mod agent;
pub mod value_objects;

pub use agent::{Agent, NewAgent};
pub use value_objects::AgentId;
