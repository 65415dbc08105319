//! Built-in channel handlers: a node's debug terminal and the variable reader.

use std::io;
use std::sync::{Arc, Weak};
use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use super::{ChannelHandler, RESPONSE_BUFFER_SIZE};
use crate::context::ActionContext;
use crate::error::AttachError;
use crate::store::Store;

/// Channel id under which a session exposes its variable store.
pub const VARIABLES_CHANNEL: &str = "readvar";

/// Types a line into a node's debug terminal and returns what the terminal shows
/// next.
///
/// The message is written to the outer endpoint (a trailing newline is added when
/// missing), then one read waits up to `read_timeout` for output. No output in time
/// yields an empty response; a write the terminal does not take in time fails.
pub struct TerminalChannel {
  node: Weak<ActionContext>,
  read_timeout: Duration,
}

impl TerminalChannel {
  pub fn new(node: &Arc<ActionContext>, read_timeout: Duration) -> Self {
    Self {
      node: Arc::downgrade(node),
      read_timeout,
    }
  }
}

#[async_trait]
impl ChannelHandler for TerminalChannel {
  async fn handle(&self, message: &str) -> Result<Vec<u8>, AttachError> {
    let node = self
      .node
      .upgrade()
      .ok_or_else(|| AttachError::ChannelClosed("node dropped".to_string()))?;
    let channel = node
      .debug_channel()
      .ok_or_else(|| AttachError::ChannelClosed(node.action_id().to_string()))?;

    let mut line = message.as_bytes().to_vec();
    if !line.ends_with(b"\n") {
      line.push(b'\n');
    }
    tokio::time::timeout(self.read_timeout, channel.outer().write(&line))
      .await
      .map_err(|_| {
        io::Error::new(io::ErrorKind::TimedOut, "terminal is not reading input")
      })??;

    let mut buf = vec![0u8; RESPONSE_BUFFER_SIZE];
    match tokio::time::timeout(self.read_timeout, channel.outer().read(&mut buf)).await {
      Ok(Ok(n)) => {
        buf.truncate(n);
        Ok(buf)
      }
      Ok(Err(e)) => Err(e.into()),
      Err(_) => {
        debug!(action_id = %node.action_id(), "no terminal output before timeout");
        Ok(Vec::new())
      }
    }
  }
}

/// Returns the current value of a store variable; the message is its dotted path.
pub struct VariableChannel {
  store: Arc<dyn Store>,
}

impl VariableChannel {
  pub fn new(store: Arc<dyn Store>) -> Self {
    Self { store }
  }
}

#[async_trait]
impl ChannelHandler for VariableChannel {
  async fn handle(&self, message: &str) -> Result<Vec<u8>, AttachError> {
    let path = message.trim();
    let value = self
      .store
      .lookup(path)
      .ok_or_else(|| AttachError::Malformed(format!("undefined variable '{}'", path)))?;
    let text = match value {
      serde_json::Value::String(s) => s,
      other => other.to_string(),
    };
    Ok(text.into_bytes())
  }
}
