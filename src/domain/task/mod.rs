// Task domain module
// Contains the task aggregate root, sub-task records, value objects, and domain events

#![allow(clippy::module_inception)]

pub mod events;
pub mod subtask;
pub mod task;
pub mod value_objects;

// Re-export main types for convenience
pub use events::TaskEvent;
pub use subtask::{Subtask, SubtaskOutcome, SubtaskPlan};
pub use task::{Task, TaskMetadata};
pub use value_objects::{Priority, SubtaskId, SubtaskStatus, TaskStatus};
