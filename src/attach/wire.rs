//! Request encoding and endpoint addressing.

use std::path::{Path, PathBuf};

use crate::error::AttachError;

/// Clients read the response once into a buffer of this size.
pub const RESPONSE_BUFFER_SIZE: usize = 1024;

/// Servers read the request once into a buffer of this size.
pub const REQUEST_BUFFER_SIZE: usize = 64 * 1024;

/// Prefix of a response produced for a failed request.
pub const ERROR_PREFIX: &str = "ERR ";

/// Socket path for `session_id` under `dir`.
pub fn endpoint_path(dir: &Path, session_id: &str) -> PathBuf {
  dir.join(format!("ipc_{}.sock", session_id))
}

/// `"<session_id> <channel_id> <message>"`, joined by single spaces.
pub fn encode_request(session_id: &str, channel_id: &str, message: &str) -> String {
  format!("{} {} {}", session_id, channel_id, message)
}

/// A decoded attach request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttachRequest {
  pub session_id: String,
  pub channel_id: String,
  pub message: String,
}

/// Splits a request on the first two spaces. The message keeps any further spaces
/// and may be empty.
pub fn decode_request(buf: &[u8]) -> Result<AttachRequest, AttachError> {
  let text = std::str::from_utf8(buf).map_err(|e| AttachError::Malformed(e.to_string()))?;
  let mut parts = text.splitn(3, ' ');
  let session_id = parts.next().unwrap_or_default();
  let channel_id = parts.next().unwrap_or_default();
  let message = parts.next().unwrap_or_default();
  if session_id.is_empty() || channel_id.is_empty() {
    return Err(AttachError::Malformed(format!("{:?}", text)));
  }
  Ok(AttachRequest {
    session_id: session_id.to_string(),
    channel_id: channel_id.to_string(),
    message: message.to_string(),
  })
}
