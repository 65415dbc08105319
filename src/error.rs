//! Error types for arrangement, node execution and the attach bridge.

use std::time::Duration;

use thiserror::Error;

use crate::types::RunStatus;

/// Error returned by a node's run function or recorded as a node's cancel cause.
///
/// `Clone` so one cause can be handed to every waiter of a node's `done` signal.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ActionError {
  /// Malformed action parameters. The node never reaches `Running`.
  #[error("validation error: {0}")]
  Validation(String),
  /// Variable substitution failed before any side-effecting call.
  #[error("interpolation error: {0}")]
  Interpolation(String),
  /// Failure reported by the provider's action body, passed through as-is.
  #[error("{0}")]
  Provider(String),
  /// Cancelled by a user interrupt or because an ancestor failed.
  #[error("cancelled: {0}")]
  Cancelled(String),
  /// Deadline armed by `arm_timeout` expired before the node finished.
  #[error("timeout after {0:?}")]
  Timeout(Duration),
  /// The run function panicked. Its payload message is kept.
  #[error("action panicked: {0}")]
  Panicked(String),
  /// `run_action` called before a run function was attached.
  #[error("action {0} has no run function")]
  MissingRunFunc(String),
  /// `run_action` called outside the `Running` state.
  #[error("action {action_id} cannot run while {status}")]
  InvalidStatus { action_id: String, status: RunStatus },
  /// Status change that does not follow Ready → Arranging → Running → Done.
  #[error("invalid status transition {from} -> {to}")]
  InvalidTransition { from: RunStatus, to: RunStatus },
}

impl ActionError {
  pub fn provider(msg: impl Into<String>) -> Self {
    ActionError::Provider(msg.into())
  }

  pub fn validation(msg: impl Into<String>) -> Self {
    ActionError::Validation(msg.into())
  }

  /// True for causes that come from cancellation rather than a failed run.
  pub fn is_cancellation(&self) -> bool {
    matches!(self, ActionError::Cancelled(_) | ActionError::Timeout(_))
  }
}

impl From<serde_json::Error> for ActionError {
  fn from(e: serde_json::Error) -> Self {
    ActionError::Validation(e.to_string())
  }
}

/// Errors raised while arranging nodes into an execution graph.
#[derive(Error, Debug)]
pub enum ArrangeError {
  #[error("duplicate action id '{0}'")]
  DuplicateAction(String),
  #[error("unknown action id '{0}'")]
  UnknownAction(String),
  #[error("action '{0}' has more than one parent and more than one child")]
  AmbiguousKind(String),
  #[error("{kind} node '{action_id}' has {parents} parents and {children} children")]
  Topology {
    action_id: String,
    kind: crate::types::ContextType,
    parents: usize,
    children: usize,
  },
  #[error("graph contains a cycle through '{0}'")]
  Cycle(String),
  #[error("no provider registered for {provider}/{action}")]
  UnknownProvider { provider: String, action: String },
  #[error("action '{action_id}': {source}")]
  Validation {
    action_id: String,
    #[source]
    source: ActionError,
  },
}

/// Errors raised by the cross-process attach bridge.
#[derive(Error, Debug)]
pub enum AttachError {
  #[error(transparent)]
  Io(#[from] std::io::Error),
  #[error("malformed attach request: {0}")]
  Malformed(String),
  #[error("request for session '{requested}' reached session '{served}'")]
  WrongSession { requested: String, served: String },
  #[error("unknown channel '{0}'")]
  UnknownChannel(String),
  #[error("channel '{0}' is closed")]
  ChannelClosed(String),
}

/// Errors raised while loading a blueprint document.
#[derive(Error, Debug)]
pub enum BlueprintError {
  #[error(transparent)]
  Io(#[from] std::io::Error),
  #[error("invalid blueprint JSON: {0}")]
  Json(#[from] serde_json::Error),
  #[error(transparent)]
  Arrange(#[from] ArrangeError),
}

/// Errors raised while reading configuration from the environment.
#[derive(Error, Debug)]
pub enum ConfigError {
  #[error("{var}: cannot parse '{value}'")]
  Invalid { var: &'static str, value: String },
}
