//! Data model shared by the engine, providers and the attach bridge.

mod action;
mod action_output;
mod context_type;
mod execution_event;
mod run_status;

pub use action::Action;
pub use action_output::{ActionOutput, RecordValue, StorageRecord};
pub use context_type::ContextType;
pub use execution_event::{EventKind, ExecutionEvent};
pub use run_status::RunStatus;

/// Index of a node inside its execution graph.
pub type NodeId = usize;
