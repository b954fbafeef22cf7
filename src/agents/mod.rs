// Agent system modules
//
// Planning, dispatch and coordination of work delegated to remote worker
// agents, plus the reasoning gateway the orchestrator consults.

pub mod coordinator;
pub mod dispatch;
pub mod errors;
pub mod orchestrator;
pub mod planner;
pub mod prompts;
pub mod reasoning;
pub mod types;

// Re-export main types
pub use coordinator::{ExecutionCoordinator, RetryPolicy};
pub use dispatch::AgentDispatcher;
pub use errors::{AgentError, AgentResult};
pub use orchestrator::Orchestrator;
pub use planner::{validate_plan, CapabilityPlanner, NoopPlanner, ReasoningPlanner, TaskPlanner};
pub use reasoning::{reason_with_fallback, ReasoningGateway, UnavailableGateway};
pub use types::{DispatchRequest, PlanRequest, ReasoningStep};
