//! Cross-process attach bridge.
//!
//! A running engine listens on one Unix socket per session
//! (`<ipc_dir>/ipc_<session_id>.sock`). Another process dials it, writes a single
//! `"<session_id> <channel_id> <message>"` request and reads a single response of at
//! most [RESPONSE_BUFFER_SIZE] bytes. The request has no length prefix and no
//! escaping: a session or channel id containing a space cannot be addressed, and a
//! longer response is truncated by the client.

mod channels;
#[cfg(unix)]
mod client;
mod registry;
#[cfg(unix)]
mod server;
mod wire;
#[cfg(test)]
mod wire_test;

pub use channels::{TerminalChannel, VARIABLES_CHANNEL, VariableChannel};
#[cfg(unix)]
pub use client::{AttachClient, send};
pub use registry::{ChannelHandler, ChannelRegistry};
#[cfg(unix)]
pub use server::{AttachServer, DEFAULT_REQUEST_TIMEOUT};
pub use wire::{
  AttachRequest, ERROR_PREFIX, REQUEST_BUFFER_SIZE, RESPONSE_BUFFER_SIZE, decode_request,
  encode_request, endpoint_path,
};
