//! Observers of node lifecycle events.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;

use crate::context::ActionContext;
use crate::store::Store;
use crate::types::{ActionOutput, ExecutionEvent};

/// Notified by a node on status changes, cancellation and produced output.
///
/// Callbacks run on the node's task and must not block.
pub trait EventListener: Send + Sync {
  fn on_event(&self, event: ExecutionEvent);

  fn on_output(&self, _node: &ActionContext, _output: &Arc<ActionOutput>) {}
}

/// Forwards every event into an unbounded channel.
pub struct ChannelListener {
  tx: mpsc::UnboundedSender<ExecutionEvent>,
}

impl ChannelListener {
  pub fn new() -> (Self, mpsc::UnboundedReceiver<ExecutionEvent>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (Self { tx }, rx)
  }

  /// Like [ChannelListener::new] but hands back a `Stream` of events.
  pub fn stream() -> (Self, UnboundedReceiverStream<ExecutionEvent>) {
    let (l, rx) = Self::new();
    (l, UnboundedReceiverStream::new(rx))
  }
}

impl EventListener for ChannelListener {
  fn on_event(&self, event: ExecutionEvent) {
    // Receiver gone means nobody is watching any more.
    let _ = self.tx.send(event);
  }
}

/// Publishes every produced output into the shared store so downstream nodes can
/// interpolate it.
pub struct StoreRecorder {
  store: Arc<dyn Store>,
}

impl StoreRecorder {
  pub fn new(store: Arc<dyn Store>) -> Self {
    Self { store }
  }
}

impl EventListener for StoreRecorder {
  fn on_event(&self, _event: ExecutionEvent) {}

  fn on_output(&self, _node: &ActionContext, output: &Arc<ActionOutput>) {
    self.store.insert_output(output);
  }
}

/// Dispatches to several listeners in order.
#[derive(Default)]
pub struct FanoutListener {
  listeners: Vec<Arc<dyn EventListener>>,
}

impl FanoutListener {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn with(mut self, listener: Arc<dyn EventListener>) -> Self {
    self.listeners.push(listener);
    self
  }

  pub fn len(&self) -> usize {
    self.listeners.len()
  }

  pub fn is_empty(&self) -> bool {
    self.listeners.is_empty()
  }
}

impl EventListener for FanoutListener {
  fn on_event(&self, event: ExecutionEvent) {
    for l in &self.listeners {
      l.on_event(event.clone());
    }
  }

  fn on_output(&self, node: &ActionContext, output: &Arc<ActionOutput>) {
    for l in &self.listeners {
      l.on_output(node, output);
    }
  }
}
