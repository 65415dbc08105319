//! Virtual terminal: a line discipline relaying bytes between the two sides of a
//! node's debug channel.
//!
//! ```text
//! action <-> inner endpoint ==pipe== [ ldisc ] ==pipe== outer endpoint <-> user
//! ```
//!
//! Every write announces its byte count to the line discipline, which then moves
//! exactly that many bytes to the other side. Relay is bulk, not per character:
//! raw-mode echo and per-character processing are not emulated.

mod channel;
#[cfg(test)]
mod channel_test;
mod ldisc;

pub use channel::{DEFAULT_TERMINAL_BUFFER, DebugChannel, TerminalEndpoint};
pub use ldisc::{Endpoint, LineDiscipline};
