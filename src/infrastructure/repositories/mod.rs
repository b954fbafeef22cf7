// Repository implementations (data access layer)
// Adapters that implement domain repository interfaces

pub mod in_memory_agent_registry;
pub mod in_memory_task_store;

pub use in_memory_agent_registry::InMemoryAgentRegistry;
pub use in_memory_task_store::InMemoryTaskStore;
