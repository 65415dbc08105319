//! Topological kind of a node.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Topological kind of a node in the execution graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContextType {
  /// One parent, one child.
  Regular,
  /// One parent, many children (fork point).
  Thread,
  /// Many parents, one child (barrier point).
  Join,
}

impl fmt::Display for ContextType {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      ContextType::Regular => write!(f, "regular"),
      ContextType::Thread => write!(f, "thread"),
      ContextType::Join => write!(f, "join"),
    }
  }
}
