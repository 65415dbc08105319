//! Arrange actions into an execution graph of Regular, Thread and Join nodes.
//!
//! Arrangement happens once, before execution. It enforces the topology rules of
//! each node kind and rejects cycles, so the engine can trust the graph it drives.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use tracing::{info, instrument};

use crate::config::EngineConfig;
use crate::context::ActionContext;
use crate::error::{ActionError, ArrangeError};
use crate::store::Store;
use crate::types::{Action, ContextType, NodeId};
use crate::vterm::DebugChannel;

struct PendingNode {
  action: Arc<Action>,
  kind: Option<ContextType>,
  parents: Vec<NodeId>,
  children: Vec<NodeId>,
}

/// Collects actions and edges, then builds an [ExecutionGraph].
#[derive(Default)]
pub struct GraphBuilder {
  nodes: Vec<PendingNode>,
  index: HashMap<String, NodeId>,
}

impl GraphBuilder {
  pub fn new() -> Self {
    Self::default()
  }

  /// Adds an action whose kind is inferred from its edges at build time.
  pub fn add_action(&mut self, action: Action) -> Result<NodeId, ArrangeError> {
    self.insert(action, None)
  }

  /// Adds an action with an explicit kind.
  pub fn add_action_with_kind(
    &mut self,
    action: Action,
    kind: ContextType,
  ) -> Result<NodeId, ArrangeError> {
    self.insert(action, Some(kind))
  }

  fn insert(&mut self, action: Action, kind: Option<ContextType>) -> Result<NodeId, ArrangeError> {
    if self.index.contains_key(&action.action_id) {
      return Err(ArrangeError::DuplicateAction(action.action_id));
    }
    let id = self.nodes.len();
    self.index.insert(action.action_id.clone(), id);
    self.nodes.push(PendingNode {
      action: Arc::new(action),
      kind,
      parents: vec![],
      children: vec![],
    });
    Ok(id)
  }

  /// Adds the edge `from → to`. Repeated edges are ignored.
  pub fn connect(&mut self, from: &str, to: &str) -> Result<(), ArrangeError> {
    let f = self.lookup(from)?;
    let t = self.lookup(to)?;
    if !self.nodes[f].children.contains(&t) {
      self.nodes[f].children.push(t);
      self.nodes[t].parents.push(f);
    }
    Ok(())
  }

  fn lookup(&self, action_id: &str) -> Result<NodeId, ArrangeError> {
    self
      .index
      .get(action_id)
      .copied()
      .ok_or_else(|| ArrangeError::UnknownAction(action_id.to_string()))
  }

  pub fn len(&self) -> usize {
    self.nodes.len()
  }

  pub fn is_empty(&self) -> bool {
    self.nodes.is_empty()
  }

  /// Checks topology and creates one [ActionContext] per action.
  ///
  /// Nodes get a debug channel when `config.debug` is set or their action asks for one.
  #[instrument(level = "trace", skip(self, store, config))]
  pub fn build(
    self,
    store: Arc<dyn Store>,
    config: &EngineConfig,
  ) -> Result<ExecutionGraph, ArrangeError> {
    let mut kinds = Vec::with_capacity(self.nodes.len());
    for pending in &self.nodes {
      let kind = match pending.kind {
        Some(k) => k,
        None => infer_kind(pending)?,
      };
      check_topology(pending, kind)?;
      kinds.push(kind);
    }
    check_acyclic(&self.nodes)?;

    let nodes: Vec<Arc<ActionContext>> = self
      .nodes
      .into_iter()
      .zip(kinds)
      .enumerate()
      .map(|(id, (pending, kind))| {
        let debug = (config.debug || pending.action.debug)
          .then(|| DebugChannel::new(config.terminal_buffer));
        Arc::new(ActionContext::new(
          id,
          kind,
          pending.parents,
          pending.children,
          pending.action,
          store.clone(),
          debug,
        ))
      })
      .collect();

    info!(node_count = nodes.len(), "graph arranged");
    Ok(ExecutionGraph {
      nodes: nodes.into(),
      index: Arc::new(self.index),
      store,
    })
  }
}

fn infer_kind(pending: &PendingNode) -> Result<ContextType, ArrangeError> {
  match (pending.parents.len(), pending.children.len()) {
    (p, c) if p > 1 && c > 1 => {
      Err(ArrangeError::AmbiguousKind(pending.action.action_id.clone()))
    }
    (p, _) if p > 1 => Ok(ContextType::Join),
    (_, c) if c > 1 => Ok(ContextType::Thread),
    _ => Ok(ContextType::Regular),
  }
}

fn check_topology(pending: &PendingNode, kind: ContextType) -> Result<(), ArrangeError> {
  let (p, c) = (pending.parents.len(), pending.children.len());
  let ok = match kind {
    ContextType::Regular => p <= 1 && c <= 1,
    ContextType::Thread => p <= 1 && c >= 1,
    ContextType::Join => p >= 1 && c <= 1,
  };
  if ok {
    Ok(())
  } else {
    Err(ArrangeError::Topology {
      action_id: pending.action.action_id.clone(),
      kind,
      parents: p,
      children: c,
    })
  }
}

fn check_acyclic(nodes: &[PendingNode]) -> Result<(), ArrangeError> {
  let mut indegree: Vec<usize> = nodes.iter().map(|n| n.parents.len()).collect();
  let mut queue: VecDeque<NodeId> = (0..nodes.len()).filter(|&i| indegree[i] == 0).collect();
  let mut seen = 0;
  while let Some(i) = queue.pop_front() {
    seen += 1;
    for &c in &nodes[i].children {
      indegree[c] -= 1;
      if indegree[c] == 0 {
        queue.push_back(c);
      }
    }
  }
  if seen == nodes.len() {
    return Ok(());
  }
  let stuck = indegree
    .iter()
    .position(|&d| d > 0)
    .map(|i| nodes[i].action.action_id.clone())
    .unwrap_or_default();
  Err(ArrangeError::Cycle(stuck))
}

/// An arranged, immutable graph of nodes sharing one store.
///
/// Cloning is cheap; clones refer to the same nodes, so one clone can cancel a run
/// that another drives.
#[derive(Clone)]
pub struct ExecutionGraph {
  nodes: Arc<[Arc<ActionContext>]>,
  index: Arc<HashMap<String, NodeId>>,
  store: Arc<dyn Store>,
}

impl ExecutionGraph {
  pub fn nodes(&self) -> &[Arc<ActionContext>] {
    &self.nodes
  }

  pub fn node(&self, id: NodeId) -> Option<&Arc<ActionContext>> {
    self.nodes.get(id)
  }

  pub fn by_action_id(&self, action_id: &str) -> Option<&Arc<ActionContext>> {
    self.index.get(action_id).and_then(|&id| self.nodes.get(id))
  }

  pub fn store(&self) -> &Arc<dyn Store> {
    &self.store
  }

  pub fn len(&self) -> usize {
    self.nodes.len()
  }

  pub fn is_empty(&self) -> bool {
    self.nodes.is_empty()
  }

  /// Nodes without parents.
  pub fn roots(&self) -> impl Iterator<Item = &Arc<ActionContext>> {
    self.nodes.iter().filter(|n| n.parents().is_empty())
  }

  /// Nodes without children.
  pub fn leaves(&self) -> impl Iterator<Item = &Arc<ActionContext>> {
    self.nodes.iter().filter(|n| n.children().is_empty())
  }

  /// Cancels every node that has not finished, e.g. on user interrupt.
  pub fn cancel_all(&self, cause: ActionError) {
    for n in self.nodes.iter() {
      n.cancel(cause.clone());
    }
  }
}
