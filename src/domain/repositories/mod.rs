// Domain ports for the registry and the task store
// Adapters live in crate::infrastructure::repositories

pub mod agent_registry;
pub mod task_store;

pub use agent_registry::AgentRegistry;
pub use task_store::TaskStore;
