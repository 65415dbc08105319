//! Run status of a node in the execution graph.

use std::fmt;

use serde::Serialize;

/// Run status of a node. Only ever advances in declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
  Ready,
  Arranging,
  Running,
  Done,
}

impl RunStatus {
  /// The status that legally follows this one, if any.
  pub fn next(self) -> Option<RunStatus> {
    match self {
      RunStatus::Ready => Some(RunStatus::Arranging),
      RunStatus::Arranging => Some(RunStatus::Running),
      RunStatus::Running => Some(RunStatus::Done),
      RunStatus::Done => None,
    }
  }
}

impl fmt::Display for RunStatus {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      RunStatus::Ready => write!(f, "ready"),
      RunStatus::Arranging => write!(f, "arranging"),
      RunStatus::Running => write!(f, "running"),
      RunStatus::Done => write!(f, "done"),
    }
  }
}
