//! A node of the execution graph: status, cancellation, run function and debug channel.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock};
use std::time::Duration;

use futures::FutureExt;
use futures::future::BoxFuture;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, instrument, trace};

use crate::error::ActionError;
use crate::listener::EventListener;
use crate::store::Store;
use crate::types::{Action, ActionOutput, ContextType, EventKind, ExecutionEvent, NodeId, RunStatus};
use crate::vterm::DebugChannel;

/// Future returned by a run function.
pub type RunFuture = BoxFuture<'static, Result<Option<Arc<ActionOutput>>, ActionError>>;

/// Action body attached to a node. Called at most once.
pub type RunFunc = Box<dyn FnOnce() -> RunFuture + Send>;

type DebugInitFunc = Box<dyn FnOnce() + Send>;

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
  m.lock().unwrap_or_else(|e| e.into_inner())
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
  if let Some(s) = payload.downcast_ref::<&str>() {
    s.to_string()
  } else if let Some(s) = payload.downcast_ref::<String>() {
    s.clone()
  } else {
    "non-string panic payload".to_string()
  }
}

/// One-shot broadcast that fires when a node completes or is cancelled.
#[derive(Clone)]
pub struct DoneSignal {
  rx: watch::Receiver<bool>,
}

impl DoneSignal {
  pub fn is_fired(&self) -> bool {
    *self.rx.borrow()
  }

  /// Resolves once the signal has fired. Any number of waiters may wait concurrently.
  pub async fn wait(mut self) {
    // The sender lives as long as the node; a closed channel also means "done".
    let _ = self.rx.wait_for(|fired| *fired).await;
  }
}

/// One vertex of the execution graph.
///
/// Topology (`kind`, `parents`, `children`) is fixed at arrangement time; only the
/// run status, the cancel cause and the produced output change during execution.
pub struct ActionContext {
  id: NodeId,
  kind: ContextType,
  parents: Vec<NodeId>,
  children: Vec<NodeId>,
  action: Arc<Action>,
  store: Arc<dyn Store>,
  status: Mutex<RunStatus>,
  run_started: AtomicBool,
  cancel_cause: OnceLock<ActionError>,
  done_tx: watch::Sender<bool>,
  run_func: Mutex<Option<RunFunc>>,
  output: OnceLock<Arc<ActionOutput>>,
  debug: Option<DebugChannel>,
  debug_init_func: Mutex<Option<DebugInitFunc>>,
  listener: OnceLock<Arc<dyn EventListener>>,
}

impl ActionContext {
  pub(crate) fn new(
    id: NodeId,
    kind: ContextType,
    parents: Vec<NodeId>,
    children: Vec<NodeId>,
    action: Arc<Action>,
    store: Arc<dyn Store>,
    debug: Option<DebugChannel>,
  ) -> Self {
    let (done_tx, _) = watch::channel(false);
    Self {
      id,
      kind,
      parents,
      children,
      action,
      store,
      status: Mutex::new(RunStatus::Ready),
      run_started: AtomicBool::new(false),
      cancel_cause: OnceLock::new(),
      done_tx,
      run_func: Mutex::new(None),
      output: OnceLock::new(),
      debug,
      debug_init_func: Mutex::new(None),
      listener: OnceLock::new(),
    }
  }

  pub fn id(&self) -> NodeId {
    self.id
  }

  pub fn kind(&self) -> ContextType {
    self.kind
  }

  pub fn parents(&self) -> &[NodeId] {
    &self.parents
  }

  pub fn children(&self) -> &[NodeId] {
    &self.children
  }

  pub fn is_thread_point(&self) -> bool {
    self.kind == ContextType::Thread
  }

  pub fn is_join_point(&self) -> bool {
    self.kind == ContextType::Join
  }

  pub fn action(&self) -> &Arc<Action> {
    &self.action
  }

  pub fn action_id(&self) -> &str {
    &self.action.action_id
  }

  pub fn store(&self) -> &Arc<dyn Store> {
    &self.store
  }

  pub fn run_status(&self) -> RunStatus {
    *lock(&self.status)
  }

  /// Advances the run status. Only the next state of
  /// Ready → Arranging → Running → Done is accepted.
  pub fn set_run_status(&self, next: RunStatus) -> Result<(), ActionError> {
    {
      let mut status = lock(&self.status);
      if status.next() != Some(next) {
        return Err(ActionError::InvalidTransition {
          from: *status,
          to: next,
        });
      }
      *status = next;
    }
    trace!(action_id = %self.action_id(), status = %next, "status changed");
    self.emit(EventKind::StatusChanged { status: next });
    Ok(())
  }

  /// Attaches the action body. Replaces a previously attached one that never ran.
  pub fn with_run_func<F>(&self, f: F)
  where
    F: FnOnce() -> RunFuture + Send + 'static,
  {
    *lock(&self.run_func) = Some(Box::new(f));
  }

  pub fn has_run_func(&self) -> bool {
    lock(&self.run_func).is_some()
  }

  /// Sets the lifecycle observer. The first listener set wins.
  pub fn with_event_listener(&self, listener: Arc<dyn EventListener>) {
    let _ = self.listener.set(listener);
  }

  pub fn event_listener(&self) -> Option<&Arc<dyn EventListener>> {
    self.listener.get()
  }

  /// Runs the attached run function once.
  ///
  /// Only callable while `Running`; the node moves to `Done` and fires `done` when
  /// the function returns. A failed run records its error as the cancel cause
  /// before `done` fires, so dependents observe it. A missing run function or a
  /// panicking one fails the node the same way.
  #[instrument(level = "trace", skip(self), fields(action_id = %self.action.action_id))]
  pub async fn run_action(&self) -> Result<Option<Arc<ActionOutput>>, ActionError> {
    let status = self.run_status();
    if status != RunStatus::Running || self.run_started.swap(true, Ordering::SeqCst) {
      return Err(ActionError::InvalidStatus {
        action_id: self.action_id().to_string(),
        status,
      });
    }
    let f = lock(&self.run_func).take();
    let result = match f {
      Some(f) => AssertUnwindSafe(async move { f().await })
        .catch_unwind()
        .await
        .unwrap_or_else(|payload| Err(ActionError::Panicked(panic_message(&*payload)))),
      None => Err(ActionError::MissingRunFunc(self.action_id().to_string())),
    };

    match &result {
      Ok(Some(out)) => {
        let _ = self.output.set(out.clone());
        self.emit(EventKind::OutputProduced {
          records: out.records.len(),
        });
        if let Some(l) = self.listener.get() {
          l.on_output(self, out);
        }
      }
      Ok(None) => {}
      Err(e) => {
        debug!(action_id = %self.action_id(), error = %e, "run function failed");
        if self.cancel_cause.set(e.clone()).is_ok() {
          self.emit(EventKind::Cancelled {
            cause: e.to_string(),
          });
        }
      }
    }
    let _ = self.set_run_status(RunStatus::Done);
    self.fire_done();
    result
  }

  /// Output produced by a successful run, if any.
  pub fn output(&self) -> Option<&Arc<ActionOutput>> {
    self.output.get()
  }

  /// Records `cause` unless one is already set, then fires `done` unless already fired.
  ///
  /// A no-op once the node is `Done`. Never blocks; safe from any task.
  pub fn cancel(&self, cause: ActionError) {
    let recorded = {
      let status = lock(&self.status);
      if *status == RunStatus::Done {
        return;
      }
      self.cancel_cause.set(cause.clone()).is_ok()
    };
    if recorded {
      debug!(action_id = %self.action_id(), cause = %cause, "cancelled");
      self.emit(EventKind::Cancelled {
        cause: cause.to_string(),
      });
    }
    self.fire_done();
  }

  /// The first error that cancelled this node.
  pub fn cancel_cause(&self) -> Option<&ActionError> {
    self.cancel_cause.get()
  }

  pub fn is_cancelled(&self) -> bool {
    self.cancel_cause.get().is_some()
  }

  pub fn done(&self) -> DoneSignal {
    DoneSignal {
      rx: self.done_tx.subscribe(),
    }
  }

  pub fn is_done(&self) -> bool {
    *self.done_tx.borrow()
  }

  fn fire_done(&self) -> bool {
    self.done_tx.send_if_modified(|fired| {
      if *fired {
        false
      } else {
        *fired = true;
        true
      }
    })
  }

  /// Cancels the node with [ActionError::Timeout] if `done` has not fired within `after`.
  pub fn arm_timeout(self: &Arc<Self>, after: Duration) -> JoinHandle<()> {
    let node = self.clone();
    tokio::spawn(async move {
      tokio::select! {
        _ = node.done().wait() => {}
        _ = tokio::time::sleep(after) => node.cancel(ActionError::Timeout(after)),
      }
    })
  }

  /// The debug channel, present when the node was arranged with debugging enabled.
  pub fn debug_channel(&self) -> Option<&DebugChannel> {
    self.debug.as_ref()
  }

  /// Registers the function [ActionContext::debug_init] calls.
  pub fn with_debug_init_func<F>(&self, f: F)
  where
    F: FnOnce() + Send + 'static,
  {
    *lock(&self.debug_init_func) = Some(Box::new(f));
  }

  /// Wires the node's stream to its line discipline. Only the first call does anything.
  pub fn debug_init(&self) {
    let f = lock(&self.debug_init_func).take();
    if let Some(f) = f {
      f();
      self.emit(EventKind::DebugAttached);
    }
  }

  fn emit(&self, kind: EventKind) {
    if let Some(l) = self.listener.get() {
      l.on_event(ExecutionEvent::now(self.action_id(), kind));
    }
  }
}

impl std::fmt::Debug for ActionContext {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("ActionContext")
      .field("id", &self.id)
      .field("action_id", &self.action.action_id)
      .field("kind", &self.kind)
      .field("parents", &self.parents)
      .field("children", &self.children)
      .field("status", &self.run_status())
      .field("cancel_cause", &self.cancel_cause.get())
      .finish()
  }
}
