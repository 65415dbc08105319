//! Byte-count driven relay between an inner and an outer endpoint.

use std::io;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, instrument};

/// A duplex byte endpoint the line discipline can own.
pub trait Endpoint: AsyncRead + AsyncWrite + Unpin + Send {}

impl<T: AsyncRead + AsyncWrite + Unpin + Send> Endpoint for T {}

/// Relays bytes between the process-facing (inner) and user-facing (outer) sides.
///
/// Transfer errors never propagate: a hiccup on a debug channel must not abort the
/// action being debugged. They are kept in [LineDiscipline::errors] instead.
#[derive(Default)]
pub struct LineDiscipline {
  inner: Option<Box<dyn Endpoint>>,
  outer: Option<Box<dyn Endpoint>>,
  errs: Vec<io::Error>,
}

impl LineDiscipline {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn set_inner_endpoint(&mut self, endpoint: impl Endpoint + 'static) {
    self.inner = Some(Box::new(endpoint));
  }

  pub fn set_outer_endpoint(&mut self, endpoint: impl Endpoint + 'static) {
    self.outer = Some(Box::new(endpoint));
  }

  /// Copies exactly `n` bytes from the inner endpoint to the outer one.
  #[instrument(level = "trace", skip(self))]
  pub async fn receive_from_inner(&mut self, n: usize) {
    let result = match (self.inner.as_mut(), self.outer.as_mut()) {
      (Some(from), Some(to)) => copy_exact(from, to, n).await,
      _ => Err(not_connected()),
    };
    self.record(result, "inner -> outer");
  }

  /// Copies exactly `n` bytes from the outer endpoint to the inner one.
  #[instrument(level = "trace", skip(self))]
  pub async fn receive_from_outer(&mut self, n: usize) {
    let result = match (self.outer.as_mut(), self.inner.as_mut()) {
      (Some(from), Some(to)) => copy_exact(from, to, n).await,
      _ => Err(not_connected()),
    };
    self.record(result, "outer -> inner");
  }

  /// Errors accumulated by relay calls, oldest first.
  pub fn errors(&self) -> &[io::Error] {
    &self.errs
  }

  pub fn take_errors(&mut self) -> Vec<io::Error> {
    std::mem::take(&mut self.errs)
  }

  pub fn is_closed(&self) -> bool {
    self.inner.is_none() && self.outer.is_none()
  }

  /// Shuts down and drops both endpoints. Safe to call more than once.
  pub async fn close(&mut self) {
    if let Some(mut ep) = self.inner.take() {
      let _ = ep.shutdown().await;
    }
    if let Some(mut ep) = self.outer.take() {
      let _ = ep.shutdown().await;
    }
  }

  fn record(&mut self, result: io::Result<()>, direction: &str) {
    if let Err(e) = result {
      debug!(direction, error = %e, "line discipline transfer failed");
      self.errs.push(e);
    }
  }
}

fn not_connected() -> io::Error {
  io::Error::new(io::ErrorKind::NotConnected, "line discipline endpoint not set")
}

async fn copy_exact<R, W>(from: &mut R, to: &mut W, n: usize) -> io::Result<()>
where
  R: AsyncRead + Unpin + ?Sized,
  W: AsyncWrite + Unpin + ?Sized,
{
  let mut limited = from.take(n as u64);
  let copied = tokio::io::copy(&mut limited, to).await?;
  to.flush().await?;
  if copied < n as u64 {
    return Err(io::Error::new(
      io::ErrorKind::UnexpectedEof,
      format!("relayed {} of {} bytes", copied, n),
    ));
  }
  Ok(())
}
