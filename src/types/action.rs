//! Opaque action definition carried by a node.

use serde::{Deserialize, Serialize};

/// Action definition as arranged from the blueprint.
///
/// The engine only reads `action_id`, `provider` and `action` to pick a run function;
/// `parameters` are handed to the provider untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Action {
  pub action_id: String,
  pub provider: String,
  #[serde(rename = "action")]
  pub action_name: String,
  #[serde(default)]
  pub parameters: serde_json::Value,
  /// Ref name under which the produced value is published to the store.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub output: Option<String>,
  /// Create the node with a debug channel so it can be attached to.
  #[serde(default, skip_serializing_if = "std::ops::Not::not")]
  pub debug: bool,
}

impl Action {
  pub fn new(
    action_id: impl Into<String>,
    provider: impl Into<String>,
    action_name: impl Into<String>,
  ) -> Self {
    Self {
      action_id: action_id.into(),
      provider: provider.into(),
      action_name: action_name.into(),
      parameters: serde_json::Value::Null,
      output: None,
      debug: false,
    }
  }

  pub fn with_parameters(mut self, parameters: serde_json::Value) -> Self {
    self.parameters = parameters;
    self
  }

  pub fn with_output(mut self, ref_name: impl Into<String>) -> Self {
    self.output = Some(ref_name.into());
    self
  }

  pub fn with_debug(mut self, debug: bool) -> Self {
    self.debug = debug;
    self
  }

  /// Deserializes `parameters` into `T`.
  pub fn parse_parameters<T: serde::de::DeserializeOwned>(
    &self,
  ) -> Result<T, crate::error::ActionError> {
    serde_json::from_value(self.parameters.clone()).map_err(|e| {
      crate::error::ActionError::Validation(format!("{}: {}", self.action_id, e))
    })
  }
}
