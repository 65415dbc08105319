//! Provider dispatch table and the environment handed to action bodies.
//!
//! The registry is assembled with [ProviderRegistryBuilder] at startup and is
//! immutable afterwards, so lookups during execution need no locking.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use futures::FutureExt;
use tracing::{Span, info_span};

use crate::context::{ActionContext, RunFuture};
use crate::error::{ActionError, ArrangeError};
use crate::store::Store;
use crate::types::{Action, ActionOutput};
use crate::vterm::TerminalEndpoint;

/// Action body: receives the environment, returns the node's output.
pub type ActionFn = Arc<dyn Fn(ActionEnv) -> RunFuture + Send + Sync>;

/// Structural check of an action's parameters, run at arrangement time.
pub type Validator = Arc<dyn Fn(&Action) -> Result<(), ActionError> + Send + Sync>;

/// Run function plus optional validator for one `(provider, action)` pair.
#[derive(Clone)]
pub struct ActionLayout {
  pub run: ActionFn,
  pub validate: Option<Validator>,
}

/// Builder for [ProviderRegistry].
#[derive(Default)]
pub struct ProviderRegistryBuilder {
  actions: HashMap<(String, String), ActionLayout>,
  provider_validators: HashMap<String, Validator>,
}

impl ProviderRegistryBuilder {
  pub fn new() -> Self {
    Self::default()
  }

  /// Registers an action body with no parameter validator.
  pub fn action<F, Fut>(self, provider: &str, action: &str, run: F) -> Self
  where
    F: Fn(ActionEnv) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Option<Arc<ActionOutput>>, ActionError>> + Send + 'static,
  {
    self.layout(provider, action, boxed(run), None)
  }

  /// Registers an action body and its parameter validator.
  pub fn validated_action<F, Fut, V>(self, provider: &str, action: &str, run: F, validate: V) -> Self
  where
    F: Fn(ActionEnv) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Option<Arc<ActionOutput>>, ActionError>> + Send + 'static,
    V: Fn(&Action) -> Result<(), ActionError> + Send + Sync + 'static,
  {
    self.layout(provider, action, boxed(run), Some(Arc::new(validate)))
  }

  pub fn layout(
    mut self,
    provider: &str,
    action: &str,
    run: ActionFn,
    validate: Option<Validator>,
  ) -> Self {
    self.actions.insert(
      (provider.to_string(), action.to_string()),
      ActionLayout { run, validate },
    );
    self
  }

  /// Validator applied to every action of `provider`, before the action's own.
  pub fn provider_validator<V>(mut self, provider: &str, validate: V) -> Self
  where
    V: Fn(&Action) -> Result<(), ActionError> + Send + Sync + 'static,
  {
    self
      .provider_validators
      .insert(provider.to_string(), Arc::new(validate));
    self
  }

  pub fn build(self) -> ProviderRegistry {
    ProviderRegistry {
      actions: self.actions,
      provider_validators: self.provider_validators,
    }
  }
}

fn boxed<F, Fut>(run: F) -> ActionFn
where
  F: Fn(ActionEnv) -> Fut + Send + Sync + 'static,
  Fut: Future<Output = Result<Option<Arc<ActionOutput>>, ActionError>> + Send + 'static,
{
  Arc::new(move |env| run(env).boxed())
}

/// Read-only mapping from `(provider, action)` to its [ActionLayout].
pub struct ProviderRegistry {
  actions: HashMap<(String, String), ActionLayout>,
  provider_validators: HashMap<String, Validator>,
}

impl ProviderRegistry {
  pub fn builder() -> ProviderRegistryBuilder {
    ProviderRegistryBuilder::new()
  }

  pub fn get(&self, provider: &str, action: &str) -> Option<&ActionLayout> {
    self
      .actions
      .get(&(provider.to_string(), action.to_string()))
  }

  pub fn len(&self) -> usize {
    self.actions.len()
  }

  pub fn is_empty(&self) -> bool {
    self.actions.is_empty()
  }

  /// Resolves the layout for `action` and runs its validators.
  pub fn resolve(&self, action: &Action) -> Result<&ActionLayout, ArrangeError> {
    let layout =
      self
        .get(&action.provider, &action.action_name)
        .ok_or_else(|| ArrangeError::UnknownProvider {
          provider: action.provider.clone(),
          action: action.action_name.clone(),
        })?;
    let wrap = |source| ArrangeError::Validation {
      action_id: action.action_id.clone(),
      source,
    };
    if let Some(v) = self.provider_validators.get(&action.provider) {
      v(action).map_err(wrap)?;
    }
    if let Some(v) = &layout.validate {
      v(action).map_err(wrap)?;
    }
    Ok(layout)
  }
}

/// What an action body sees of its node.
#[derive(Clone)]
pub struct ActionEnv {
  /// Dry run: validate parameters, then return `Ok(None)` before any
  /// interpolation or side effect.
  pub rehearsal: bool,
  node: Arc<ActionContext>,
}

impl ActionEnv {
  pub fn new(node: Arc<ActionContext>, rehearsal: bool) -> Self {
    Self { rehearsal, node }
  }

  pub fn action(&self) -> &Arc<Action> {
    self.node.action()
  }

  pub fn store(&self) -> &Arc<dyn Store> {
    self.node.store()
  }

  pub fn node(&self) -> &Arc<ActionContext> {
    &self.node
  }

  pub fn is_cancelled(&self) -> bool {
    self.node.is_cancelled()
  }

  /// Resolves with the cancel cause once the node is cancelled.
  pub async fn cancelled(&self) -> ActionError {
    self.node.done().wait().await;
    self
      .node
      .cancel_cause()
      .cloned()
      .unwrap_or_else(|| ActionError::Cancelled("node finished".to_string()))
  }

  /// The action-facing debug terminal, when the node has one.
  pub fn terminal(&self) -> Option<&TerminalEndpoint> {
    self.node.debug_channel().map(|c| c.inner())
  }

  pub fn debug_init(&self) {
    self.node.debug_init();
  }

  /// Builds a single-record output for this action.
  pub fn output(&self, value: serde_json::Value, value_id: Option<String>) -> Arc<ActionOutput> {
    ActionOutput::new(self.action().clone(), value, value_id)
  }

  pub fn span(&self) -> Span {
    let a = self.action();
    info_span!("action", action_id = %a.action_id, provider = %a.provider, action = %a.action_name)
  }
}
