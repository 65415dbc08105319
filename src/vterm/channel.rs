//! Debug channel: the inner/outer endpoint pair of an attachable node.

use std::io;
use std::sync::Arc;

use tokio::io::{AsyncReadExt, AsyncWriteExt, DuplexStream, ReadHalf, WriteHalf};
use tokio::sync::{Mutex, watch};
use tracing::trace;

use super::LineDiscipline;

/// Capacity of each pipe between an endpoint and the line discipline.
pub const DEFAULT_TERMINAL_BUFFER: usize = 64 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Side {
  Inner,
  Outer,
}

/// One side of a debug channel.
///
/// `write` pushes bytes into the pipe and asks the line discipline to relay that
/// many bytes to the opposite side; `read` pulls whatever the other side relayed.
pub struct TerminalEndpoint {
  side: Side,
  chunk: usize,
  reader: Mutex<ReadHalf<DuplexStream>>,
  writer: Mutex<WriteHalf<DuplexStream>>,
  ldisc: Arc<Mutex<LineDiscipline>>,
  closed: watch::Receiver<bool>,
}

impl TerminalEndpoint {
  fn new(
    side: Side,
    chunk: usize,
    stream: DuplexStream,
    ldisc: Arc<Mutex<LineDiscipline>>,
    closed: watch::Receiver<bool>,
  ) -> Self {
    let (r, w) = tokio::io::split(stream);
    Self {
      side,
      chunk,
      reader: Mutex::new(r),
      writer: Mutex::new(w),
      ldisc,
      closed,
    }
  }

  /// Writes `buf` and relays it to the opposite endpoint.
  ///
  /// The relay waits until the opposite side reads, so a write to an unread side
  /// blocks once its pipe fills. Closing the channel aborts a blocked write with
  /// `BrokenPipe`; dropping the returned future does too.
  pub async fn write(&self, buf: &[u8]) -> io::Result<()> {
    let mut closed = self.closed.clone();
    tokio::select! {
      biased;
      _ = closed.wait_for(|c| *c) => {
        Err(io::Error::new(io::ErrorKind::BrokenPipe, "debug channel closed"))
      }
      relayed = self.relay(buf) => relayed,
    }
  }

  /// Writes are split into pipe-sized chunks so a large buffer never blocks on a
  /// full pipe before the line discipline drains it.
  async fn relay(&self, buf: &[u8]) -> io::Result<()> {
    let mut writer = self.writer.lock().await;
    for chunk in buf.chunks(self.chunk.max(1)) {
      writer.write_all(chunk).await?;
      writer.flush().await?;
      let mut ldisc = self.ldisc.lock().await;
      match self.side {
        Side::Inner => ldisc.receive_from_inner(chunk.len()).await,
        Side::Outer => ldisc.receive_from_outer(chunk.len()).await,
      }
    }
    trace!(side = ?self.side, bytes = buf.len(), "terminal write relayed");
    Ok(())
  }

  /// Reads whatever is available, at most `buf.len()` bytes. `Ok(0)` means closed.
  pub async fn read(&self, buf: &mut [u8]) -> io::Result<usize> {
    self.reader.lock().await.read(buf).await
  }

  /// Reads up to and including the next `\n`, returned without the line ending.
  /// Returns `UnexpectedEof` if the channel closes first.
  pub async fn read_line(&self) -> io::Result<String> {
    let mut reader = self.reader.lock().await;
    let mut line = Vec::new();
    loop {
      let b = reader.read_u8().await?;
      if b == b'\n' {
        break;
      }
      line.push(b);
    }
    if line.last() == Some(&b'\r') {
      line.pop();
    }
    Ok(String::from_utf8_lossy(&line).into_owned())
  }
}

/// Linked inner/outer endpoints plus the line discipline between them.
///
/// The inner endpoint belongs to the action (its "process" side); the outer one is
/// what an attached user reads from and writes to.
pub struct DebugChannel {
  inner: TerminalEndpoint,
  outer: TerminalEndpoint,
  ldisc: Arc<Mutex<LineDiscipline>>,
  closed: watch::Sender<bool>,
}

impl DebugChannel {
  pub fn new(buffer: usize) -> Self {
    let (action_io, ldisc_inner) = tokio::io::duplex(buffer);
    let (ldisc_outer, user_io) = tokio::io::duplex(buffer);
    let mut ldisc = LineDiscipline::new();
    ldisc.set_inner_endpoint(ldisc_inner);
    ldisc.set_outer_endpoint(ldisc_outer);
    let ldisc = Arc::new(Mutex::new(ldisc));
    let (closed, closed_rx) = watch::channel(false);
    Self {
      inner: TerminalEndpoint::new(
        Side::Inner,
        buffer,
        action_io,
        ldisc.clone(),
        closed_rx.clone(),
      ),
      outer: TerminalEndpoint::new(Side::Outer, buffer, user_io, ldisc.clone(), closed_rx),
      ldisc,
      closed,
    }
  }

  /// The action-facing endpoint.
  pub fn inner(&self) -> &TerminalEndpoint {
    &self.inner
  }

  /// The user-facing endpoint.
  pub fn outer(&self) -> &TerminalEndpoint {
    &self.outer
  }

  /// Number of relay errors accumulated so far.
  pub async fn error_count(&self) -> usize {
    self.ldisc.lock().await.errors().len()
  }

  pub async fn take_errors(&self) -> Vec<io::Error> {
    self.ldisc.lock().await.take_errors()
  }

  /// Closes the line discipline; pending and later reads on both endpoints see EOF
  /// and blocked writes fail.
  pub async fn close(&self) {
    // Release any relay holding the line discipline before taking it.
    self.closed.send_replace(true);
    self.ldisc.lock().await.close().await;
  }
}

impl Default for DebugChannel {
  fn default() -> Self {
    Self::new(DEFAULT_TERMINAL_BUFFER)
  }
}
