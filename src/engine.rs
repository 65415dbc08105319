//! Drives an arranged graph: one task per node, parents gate children.
//!
//! Every node task waits on its parents' `done` signals, then runs its action
//! unless an upstream cause cancelled it first. A `Join` node waits on all of its
//! parents and takes the cause of whichever failed parent it observes first.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::stream::FuturesUnordered;
use futures::{FutureExt, StreamExt};
use serde::{Serialize, Serializer};
use tokio::task::JoinSet;
use tracing::{Instrument, debug, info, info_span, instrument, warn};

use crate::arrange::ExecutionGraph;
use crate::attach::{ChannelRegistry, TerminalChannel, VARIABLES_CHANNEL, VariableChannel};
use crate::config::EngineConfig;
use crate::context::ActionContext;
use crate::error::{ActionError, ArrangeError};
use crate::listener::{EventListener, FanoutListener, StoreRecorder};
use crate::registry::{ActionEnv, ProviderRegistry};
use crate::types::{ActionOutput, ContextType, RunStatus};

/// Runs one execution graph to completion.
pub struct Engine {
  graph: ExecutionGraph,
  config: EngineConfig,
  channels: Arc<ChannelRegistry>,
  listeners: Vec<Arc<dyn EventListener>>,
}

impl Engine {
  /// Resolves and validates every node's action against `registry` and attaches
  /// the run functions. Fails on the first unknown provider or invalid parameters,
  /// before anything runs.
  #[instrument(level = "trace", skip_all)]
  pub fn new(
    graph: ExecutionGraph,
    registry: &ProviderRegistry,
    config: EngineConfig,
  ) -> Result<Self, ArrangeError> {
    let channels = Arc::new(ChannelRegistry::new());
    for node in graph.nodes() {
      let layout = registry.resolve(node.action())?;
      let run = layout.run.clone();
      let weak = Arc::downgrade(node);
      let rehearsal = config.rehearsal;
      node.with_run_func(move || match weak.upgrade() {
        Some(n) => run(ActionEnv::new(n, rehearsal)),
        None => async { Err(ActionError::Cancelled("node dropped".to_string())) }.boxed(),
      });

      if node.debug_channel().is_some() {
        let weak = Arc::downgrade(node);
        let channels = channels.clone();
        let read_timeout = config.attach_read_timeout;
        node.with_debug_init_func(move || {
          if let Some(n) = weak.upgrade() {
            channels.register(
              n.action_id().to_string(),
              Arc::new(TerminalChannel::new(&n, read_timeout)),
            );
          }
        });
      }
    }
    channels.register(
      VARIABLES_CHANNEL,
      Arc::new(VariableChannel::new(graph.store().clone())),
    );
    Ok(Self {
      graph,
      config,
      channels,
      listeners: Vec::new(),
    })
  }

  /// Adds a lifecycle observer. Outputs are always published to the store as well.
  pub fn with_listener(mut self, listener: Arc<dyn EventListener>) -> Self {
    self.listeners.push(listener);
    self
  }

  pub fn graph(&self) -> &ExecutionGraph {
    &self.graph
  }

  /// Channels the attach bridge serves for this run.
  pub fn channels(&self) -> &Arc<ChannelRegistry> {
    &self.channels
  }

  pub fn config(&self) -> &EngineConfig {
    &self.config
  }

  /// Runs every node and waits for all of them to settle.
  #[instrument(level = "trace", skip(self), fields(session = %self.config.session_id))]
  pub async fn run(self) -> RunReport {
    let started_at = Utc::now();
    let recorder = StoreRecorder::new(self.graph.store().clone());
    let mut fanout = FanoutListener::new().with(Arc::new(recorder));
    for l in self.listeners {
      fanout = fanout.with(l);
    }
    let listener: Arc<dyn EventListener> = Arc::new(fanout);
    for node in self.graph.nodes() {
      node.with_event_listener(listener.clone());
    }

    info!(nodes = self.graph.len(), rehearsal = self.config.rehearsal, "run started");
    let mut tasks = JoinSet::new();
    for node in self.graph.nodes() {
      let span = info_span!("node", action_id = %node.action_id(), kind = %node.kind());
      tasks.spawn(
        drive_node(
          self.graph.clone(),
          node.clone(),
          self.config.clone(),
          self.channels.clone(),
        )
        .instrument(span),
      );
    }
    while let Some(joined) = tasks.join_next().await {
      if let Err(e) = joined {
        warn!(error = %e, "node task did not finish");
      }
    }

    let report = RunReport::collect(&self.config.session_id, started_at, &self.graph);
    info!(failures = report.failures().count(), "run finished");
    report
  }
}

async fn drive_node(
  graph: ExecutionGraph,
  node: Arc<ActionContext>,
  config: EngineConfig,
  channels: Arc<ChannelRegistry>,
) {
  if let Err(e) = node.set_run_status(RunStatus::Arranging) {
    warn!(error = %e, "node already driven");
    return;
  }

  tokio::select! {
    upstream = wait_parents(&graph, &node) => {
      if let Some(cause) = upstream {
        node.cancel(cause);
      }
    }
    _ = node.done().wait() => {}
  }
  if node.is_cancelled() || node.is_done() {
    debug!(cause = ?node.cancel_cause(), "not scheduled");
    return;
  }

  if let Err(e) = node.set_run_status(RunStatus::Running) {
    warn!(error = %e, "cannot start node");
    return;
  }
  if node.debug_channel().is_some() {
    node.debug_init();
  }
  let timer = config.timeout.map(|t| node.arm_timeout(t));

  match node.run_action().await {
    Ok(out) => debug!(records = out.map(|o| o.records.len()).unwrap_or(0), "node finished"),
    Err(e) if e.is_cancellation() => debug!(error = %e, "node cancelled while running"),
    Err(e) => info!(error = %e, "node failed"),
  }

  if let Some(t) = timer {
    t.abort();
  }
  if let Some(channel) = node.debug_channel() {
    channels.unregister(node.action_id());
    channel.close().await;
  }
}

/// Resolves once every parent is done, or early with the first cause observed.
async fn wait_parents(graph: &ExecutionGraph, node: &ActionContext) -> Option<ActionError> {
  let mut pending: FuturesUnordered<_> = node
    .parents()
    .iter()
    .filter_map(|&p| graph.node(p))
    .map(|p| {
      let done = p.done();
      async move {
        done.wait().await;
        p
      }
    })
    .collect();
  while let Some(parent) = pending.next().await {
    if let Some(cause) = parent.cancel_cause() {
      if node.is_join_point() {
        debug!(parent = %parent.action_id(), cause = %cause, "join short-circuited");
      }
      return Some(cause.clone());
    }
  }
  None
}

fn display_cause<S: Serializer>(cause: &Option<ActionError>, s: S) -> Result<S::Ok, S::Error> {
  match cause {
    Some(c) => s.serialize_some(&c.to_string()),
    None => s.serialize_none(),
  }
}

/// Final state of one node.
#[derive(Debug, Serialize)]
pub struct NodeReport {
  pub action_id: String,
  pub kind: ContextType,
  pub status: RunStatus,
  #[serde(serialize_with = "display_cause")]
  pub cause: Option<ActionError>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub output: Option<Arc<ActionOutput>>,
}

impl NodeReport {
  /// Ran to completion without a cancel cause.
  pub fn succeeded(&self) -> bool {
    self.status == RunStatus::Done && self.cause.is_none()
  }
}

/// Outcome of [Engine::run], in arrangement order.
#[derive(Debug, Serialize)]
pub struct RunReport {
  pub session_id: String,
  pub started_at: DateTime<Utc>,
  pub finished_at: DateTime<Utc>,
  pub nodes: Vec<NodeReport>,
}

impl RunReport {
  fn collect(session_id: &str, started_at: DateTime<Utc>, graph: &ExecutionGraph) -> Self {
    let nodes = graph
      .nodes()
      .iter()
      .map(|n| NodeReport {
        action_id: n.action_id().to_string(),
        kind: n.kind(),
        status: n.run_status(),
        cause: n.cancel_cause().cloned(),
        output: n.output().cloned(),
      })
      .collect();
    Self {
      session_id: session_id.to_string(),
      started_at,
      finished_at: Utc::now(),
      nodes,
    }
  }

  pub fn node(&self, action_id: &str) -> Option<&NodeReport> {
    self.nodes.iter().find(|n| n.action_id == action_id)
  }

  pub fn is_success(&self) -> bool {
    self.nodes.iter().all(NodeReport::succeeded)
  }

  /// Nodes that failed or were cancelled.
  pub fn failures(&self) -> impl Iterator<Item = &NodeReport> {
    self.nodes.iter().filter(|n| !n.succeeded())
  }
}
