//! Blueprint documents: a JSON list of actions and the edges between them.
//!
//! ```json
//! {"actions": [
//!   {"action_id": "a", "provider": "generic", "action": "sleep",
//!    "parameters": {"seconds": 1}, "next_action": ["b", "c"]}
//! ]}
//! ```
//!
//! Node kinds are inferred from the edges unless an entry sets `kind`.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::arrange::GraphBuilder;
use crate::error::BlueprintError;
use crate::types::{Action, ContextType};

/// One action entry of a blueprint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlueprintAction {
  #[serde(flatten)]
  pub action: Action,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub kind: Option<ContextType>,
  /// Action ids this action hands over to.
  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub next_action: Vec<String>,
}

/// A parsed blueprint document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Blueprint {
  pub actions: Vec<BlueprintAction>,
}

impl Blueprint {
  pub fn from_json(text: &str) -> Result<Self, BlueprintError> {
    Ok(serde_json::from_str(text)?)
  }

  #[instrument(level = "trace", skip(path))]
  pub fn from_path(path: &Path) -> Result<Self, BlueprintError> {
    let bytes = std::fs::read(path)?;
    Ok(serde_json::from_slice(&bytes)?)
  }

  /// Adds every action, then every edge, to a new [GraphBuilder].
  pub fn into_builder(self) -> Result<GraphBuilder, BlueprintError> {
    let mut builder = GraphBuilder::new();
    let mut edges = Vec::new();
    for entry in self.actions {
      for next in &entry.next_action {
        edges.push((entry.action.action_id.clone(), next.clone()));
      }
      match entry.kind {
        Some(kind) => builder.add_action_with_kind(entry.action, kind)?,
        None => builder.add_action(entry.action)?,
      };
    }
    for (from, to) in edges {
      builder.connect(&from, &to)?;
    }
    Ok(builder)
  }
}
