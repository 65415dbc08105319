//! Lifecycle events emitted by nodes to their listener.

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::RunStatus;

/// What happened to a node.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum EventKind {
  StatusChanged { status: RunStatus },
  OutputProduced { records: usize },
  Cancelled { cause: String },
  DebugAttached,
}

/// A lifecycle event for one node.
#[derive(Debug, Clone, Serialize)]
pub struct ExecutionEvent {
  pub at: DateTime<Utc>,
  pub action_id: String,
  #[serde(flatten)]
  pub kind: EventKind,
}

impl ExecutionEvent {
  pub fn now(action_id: impl Into<String>, kind: EventKind) -> Self {
    Self {
      at: Utc::now(),
      action_id: action_id.into(),
      kind,
    }
  }
}
