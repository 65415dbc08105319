//! Tests for `EngineConfig`.

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use crate::config::{EngineConfig, ENV_DEBUG, ENV_IPC_DIR, ENV_REHEARSAL, ENV_SESSION, ENV_TIMEOUT_SECS};
use crate::error::ConfigError;

fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
  let map: HashMap<String, String> = pairs
    .iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect();
  move |k| map.get(k).cloned()
}

#[test]
fn defaults() {
  let cfg = EngineConfig::default();
  assert!(!cfg.rehearsal);
  assert!(!cfg.debug);
  assert_eq!(cfg.timeout, None);
  assert_eq!(cfg.session_id.len(), 32);
  assert_eq!(cfg.attach_read_timeout, Duration::from_millis(500));
}

#[test]
fn sessions_differ_between_defaults() {
  assert_ne!(EngineConfig::default().session_id, EngineConfig::default().session_id);
}

#[test]
fn env_overrides() {
  let cfg = EngineConfig::from_lookup(lookup(&[
    (ENV_REHEARSAL, "true"),
    (ENV_DEBUG, "1"),
    (ENV_TIMEOUT_SECS, "30"),
    (ENV_SESSION, " s1 "),
    (ENV_IPC_DIR, "/tmp/bp"),
  ]))
  .unwrap();
  assert!(cfg.rehearsal);
  assert!(cfg.debug);
  assert_eq!(cfg.timeout, Some(Duration::from_secs(30)));
  assert_eq!(cfg.session_id, "s1");
  assert_eq!(cfg.ipc_dir, PathBuf::from("/tmp/bp"));
}

#[test]
fn zero_timeout_disables_deadline() {
  let cfg = EngineConfig::from_lookup(lookup(&[(ENV_TIMEOUT_SECS, "0")])).unwrap();
  assert_eq!(cfg.timeout, None);
}

#[test]
fn invalid_bool_is_rejected() {
  let err = EngineConfig::from_lookup(lookup(&[(ENV_REHEARSAL, "maybe")])).unwrap_err();
  assert!(matches!(err, ConfigError::Invalid { var, .. } if var == ENV_REHEARSAL));
}

#[test]
fn invalid_timeout_is_rejected() {
  assert!(EngineConfig::from_lookup(lookup(&[(ENV_TIMEOUT_SECS, "soon")])).is_err());
}
