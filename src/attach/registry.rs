//! Channels addressable inside one session.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;

use crate::error::AttachError;

/// Answers one attach message.
#[async_trait]
pub trait ChannelHandler: Send + Sync {
  async fn handle(&self, message: &str) -> Result<Vec<u8>, AttachError>;
}

/// Channel id → handler, shared by every connection of a session.
#[derive(Default)]
pub struct ChannelRegistry {
  channels: RwLock<HashMap<String, Arc<dyn ChannelHandler>>>,
}

impl ChannelRegistry {
  pub fn new() -> Self {
    Self::default()
  }

  /// Registers `handler` under `channel_id`, returning the handler it replaced.
  pub fn register(
    &self,
    channel_id: impl Into<String>,
    handler: Arc<dyn ChannelHandler>,
  ) -> Option<Arc<dyn ChannelHandler>> {
    self
      .channels
      .write()
      .unwrap_or_else(|e| e.into_inner())
      .insert(channel_id.into(), handler)
  }

  pub fn unregister(&self, channel_id: &str) -> Option<Arc<dyn ChannelHandler>> {
    self
      .channels
      .write()
      .unwrap_or_else(|e| e.into_inner())
      .remove(channel_id)
  }

  pub fn get(&self, channel_id: &str) -> Option<Arc<dyn ChannelHandler>> {
    self
      .channels
      .read()
      .unwrap_or_else(|e| e.into_inner())
      .get(channel_id)
      .cloned()
  }

  /// Registered channel ids, sorted.
  pub fn ids(&self) -> Vec<String> {
    let mut ids: Vec<String> = self
      .channels
      .read()
      .unwrap_or_else(|e| e.into_inner())
      .keys()
      .cloned()
      .collect();
    ids.sort();
    ids
  }

  pub fn len(&self) -> usize {
    self.channels.read().map(|c| c.len()).unwrap_or(0)
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }
}
