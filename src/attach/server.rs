//! Per-session attach listener.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

use super::{ChannelRegistry, ERROR_PREFIX, REQUEST_BUFFER_SIZE, decode_request, endpoint_path};
use crate::error::AttachError;

/// How long a connection may take to send its request.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Listens on the socket derived from a session id and answers attach requests.
///
/// Each connection is served on its own task; connections only share the channel
/// registry, so one failing connection never affects another.
pub struct AttachServer {
  session_id: String,
  path: PathBuf,
  listener: UnixListener,
  channels: Arc<ChannelRegistry>,
  request_timeout: Duration,
}

impl AttachServer {
  /// Binds `<dir>/ipc_<session_id>.sock`, replacing a stale socket file.
  pub fn bind(
    dir: &Path,
    session_id: &str,
    channels: Arc<ChannelRegistry>,
  ) -> Result<Self, AttachError> {
    let path = endpoint_path(dir, session_id);
    if path.exists() {
      std::fs::remove_file(&path)?;
    }
    let listener = UnixListener::bind(&path)?;
    info!(session = %session_id, path = %path.display(), "attach server listening");
    Ok(Self {
      session_id: session_id.to_string(),
      path,
      listener,
      channels,
      request_timeout: DEFAULT_REQUEST_TIMEOUT,
    })
  }

  /// Drops connections that send no request within `timeout`.
  pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
    self.request_timeout = timeout;
    self
  }

  pub fn path(&self) -> &Path {
    &self.path
  }

  pub fn session_id(&self) -> &str {
    &self.session_id
  }

  /// Accepts connections until `shutdown` flips to `true` or its sender is dropped.
  pub async fn serve(self, mut shutdown: watch::Receiver<bool>) {
    loop {
      tokio::select! {
        accepted = self.listener.accept() => match accepted {
          Ok((stream, _)) => {
            let session = self.session_id.clone();
            let channels = self.channels.clone();
            let timeout = self.request_timeout;
            tokio::spawn(async move {
              if let Err(e) = handle_connection(stream, &session, &channels, timeout).await {
                debug!(error = %e, "attach connection failed");
              }
            });
          }
          Err(e) => warn!(error = %e, "attach accept failed"),
        },
        changed = shutdown.changed() => {
          if changed.is_err() || *shutdown.borrow() {
            break;
          }
        }
      }
    }
    info!(session = %self.session_id, "attach server stopped");
  }

  /// Serves on a background task. Send `true` (or drop the sender) to stop it.
  pub fn spawn(self) -> (JoinHandle<()>, watch::Sender<bool>) {
    let (tx, rx) = watch::channel(false);
    (tokio::spawn(self.serve(rx)), tx)
  }
}

impl Drop for AttachServer {
  fn drop(&mut self) {
    let _ = std::fs::remove_file(&self.path);
  }
}

#[instrument(level = "trace", skip(stream, channels))]
async fn handle_connection(
  mut stream: UnixStream,
  session_id: &str,
  channels: &ChannelRegistry,
  request_timeout: Duration,
) -> Result<(), AttachError> {
  let mut buf = vec![0u8; REQUEST_BUFFER_SIZE];
  let n = tokio::time::timeout(request_timeout, stream.read(&mut buf))
    .await
    .map_err(|_| io::Error::new(io::ErrorKind::TimedOut, "no request received"))??;
  let response = match respond(&buf[..n], session_id, channels).await {
    Ok(bytes) => bytes,
    Err(e) => format!("{}{}", ERROR_PREFIX, e).into_bytes(),
  };
  stream.write_all(&response).await?;
  stream.shutdown().await?;
  Ok(())
}

async fn respond(
  request: &[u8],
  session_id: &str,
  channels: &ChannelRegistry,
) -> Result<Vec<u8>, AttachError> {
  let req = decode_request(request)?;
  if req.session_id != session_id {
    return Err(AttachError::WrongSession {
      requested: req.session_id,
      served: session_id.to_string(),
    });
  }
  let handler = channels
    .get(&req.channel_id)
    .ok_or_else(|| AttachError::UnknownChannel(req.channel_id.clone()))?;
  debug!(channel = %req.channel_id, bytes = req.message.len(), "attach request");
  handler.handle(&req.message).await
}
