//! Tests for the attach wire format.

use std::path::Path;

use super::wire::{decode_request, encode_request, endpoint_path};
use crate::error::AttachError;

#[test]
fn endpoint_is_derived_from_session() {
  let p = endpoint_path(Path::new("/tmp"), "s1");
  assert_eq!(p, Path::new("/tmp/ipc_s1.sock"));
  assert_eq!(endpoint_path(Path::new("/tmp"), "s1"), p);
  assert_ne!(endpoint_path(Path::new("/tmp"), "s2"), p);
}

#[test]
fn encode_joins_with_spaces() {
  assert_eq!(encode_request("s1", "c1", "ping"), "s1 c1 ping");
}

#[test]
fn decode_keeps_spaces_in_message() {
  let r = decode_request(b"s1 c1 echo hello world").unwrap();
  assert_eq!(r.session_id, "s1");
  assert_eq!(r.channel_id, "c1");
  assert_eq!(r.message, "echo hello world");
}

#[test]
fn decode_allows_empty_message() {
  let r = decode_request(b"s1 c1").unwrap();
  assert_eq!(r.message, "");
  let r = decode_request(b"s1 c1 ").unwrap();
  assert_eq!(r.message, "");
}

#[test]
fn decode_rejects_missing_channel() {
  assert!(matches!(decode_request(b"s1"), Err(AttachError::Malformed(_))));
  assert!(matches!(decode_request(b""), Err(AttachError::Malformed(_))));
  assert!(matches!(decode_request(b" c1 x"), Err(AttachError::Malformed(_))));
}

#[test]
fn decode_rejects_invalid_utf8() {
  assert!(matches!(decode_request(&[0xff, 0x20, 0x41]), Err(AttachError::Malformed(_))));
}

#[test]
fn space_in_session_id_is_ambiguous() {
  // No escaping: the first space always ends the session id.
  let r = decode_request(encode_request("my session", "c1", "m").as_bytes()).unwrap();
  assert_eq!(r.session_id, "my");
  assert_eq!(r.channel_id, "session");
  assert_eq!(r.message, "c1 m");
}
