//! # blueprint-runtime
//!
//! Executes blueprints: directed graphs of provider actions.
//!
//! ## Architecture
//!
//! - [arrange] turns actions and edges into an [ExecutionGraph] of `Regular`,
//!   `Thread` (fork) and `Join` (barrier) nodes.
//! - [context] holds the per-node state machine: run status, first-write-wins
//!   cancellation and the one-shot `done` signal.
//! - [engine] drives every node on its own task; parents gate children.
//! - [vterm] gives attachable nodes a debug terminal behind a line discipline.
//! - [attach] exposes those terminals and the variable store to other processes
//!   over a per-session Unix socket.

pub mod arrange;
pub mod attach;
pub mod blueprint;
#[cfg(test)]
mod blueprint_test;
pub mod config;
#[cfg(test)]
mod config_test;
pub mod context;
pub mod engine;
pub mod error;
pub mod listener;
pub mod providers;
pub mod registry;
pub mod store;
pub mod types;
pub mod vterm;

pub use arrange::{ExecutionGraph, GraphBuilder};
pub use blueprint::Blueprint;
pub use config::EngineConfig;
pub use context::ActionContext;
pub use engine::{Engine, NodeReport, RunReport};
pub use error::{ActionError, ArrangeError, AttachError, BlueprintError, ConfigError};
pub use registry::{ActionEnv, ProviderRegistry};
pub use store::{MemoryStore, Store};
pub use types::{Action, ActionOutput, ContextType, RunStatus, StorageRecord};
