//! Attach client: one request, one response.

use std::path::{Path, PathBuf};

use bytes::Bytes;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::UnixStream;
use tracing::instrument;

use super::{RESPONSE_BUFFER_SIZE, encode_request, endpoint_path};
use crate::error::AttachError;

/// Dials sessions whose sockets live in one directory.
#[derive(Debug, Clone)]
pub struct AttachClient {
  dir: PathBuf,
}

impl AttachClient {
  pub fn new(dir: impl Into<PathBuf>) -> Self {
    Self { dir: dir.into() }
  }

  pub fn dir(&self) -> &Path {
    &self.dir
  }

  /// Sends `message` to `channel_id` of `session_id` and returns the bytes of a
  /// single read, at most [RESPONSE_BUFFER_SIZE] of them. No retry on failure.
  #[instrument(level = "trace", skip(self, message))]
  pub async fn send(
    &self,
    session_id: &str,
    channel_id: &str,
    message: &str,
  ) -> Result<Bytes, AttachError> {
    let mut stream = UnixStream::connect(endpoint_path(&self.dir, session_id)).await?;
    stream
      .write_all(encode_request(session_id, channel_id, message).as_bytes())
      .await?;
    let mut buf = vec![0u8; RESPONSE_BUFFER_SIZE];
    let n = stream.read(&mut buf).await?;
    buf.truncate(n);
    Ok(Bytes::from(buf))
  }
}

impl Default for AttachClient {
  fn default() -> Self {
    Self::new(std::env::temp_dir())
  }
}

/// [AttachClient::send] against sockets in the system temp directory.
pub async fn send(session_id: &str, channel_id: &str, message: &str) -> Result<Bytes, AttachError> {
  AttachClient::default().send(session_id, channel_id, message).await
}
