//! Engine configuration: defaults plus `BLUEPRINT_*` environment overrides.

use std::path::PathBuf;
use std::time::Duration;

use crate::error::ConfigError;
use crate::vterm::DEFAULT_TERMINAL_BUFFER;

pub const ENV_REHEARSAL: &str = "BLUEPRINT_REHEARSAL";
pub const ENV_TIMEOUT_SECS: &str = "BLUEPRINT_TIMEOUT_SECS";
pub const ENV_DEBUG: &str = "BLUEPRINT_DEBUG";
pub const ENV_SESSION: &str = "BLUEPRINT_SESSION";
pub const ENV_IPC_DIR: &str = "BLUEPRINT_IPC_DIR";
pub const ENV_ATTACH_TIMEOUT_MS: &str = "BLUEPRINT_ATTACH_TIMEOUT_MS";

/// Options for arranging and running one blueprint.
#[derive(Debug, Clone)]
pub struct EngineConfig {
  /// Validate everything, run nothing with side effects.
  pub rehearsal: bool,
  /// Per-node deadline; expiry cancels the node with a timeout cause.
  pub timeout: Option<Duration>,
  /// Give every node a debug channel, not only actions flagged `debug`.
  pub debug: bool,
  /// Identifies this run to the attach bridge.
  pub session_id: String,
  /// Directory holding the per-session attach socket.
  pub ipc_dir: PathBuf,
  /// How long a terminal attach waits for the action to answer.
  pub attach_read_timeout: Duration,
  /// Pipe capacity of each debug channel.
  pub terminal_buffer: usize,
}

impl Default for EngineConfig {
  fn default() -> Self {
    Self {
      rehearsal: false,
      timeout: None,
      debug: false,
      session_id: uuid::Uuid::new_v4().simple().to_string(),
      ipc_dir: std::env::temp_dir(),
      attach_read_timeout: Duration::from_millis(500),
      terminal_buffer: DEFAULT_TERMINAL_BUFFER,
    }
  }
}

impl EngineConfig {
  /// Defaults overridden by the process environment.
  pub fn from_env() -> Result<Self, ConfigError> {
    Self::from_lookup(|k| std::env::var(k).ok())
  }

  /// Defaults overridden by whatever `lookup` returns for each `BLUEPRINT_*` key.
  pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
  where
    F: Fn(&str) -> Option<String>,
  {
    let mut cfg = Self::default();
    if let Some(v) = lookup(ENV_REHEARSAL) {
      cfg.rehearsal = parse_bool(ENV_REHEARSAL, &v)?;
    }
    if let Some(v) = lookup(ENV_DEBUG) {
      cfg.debug = parse_bool(ENV_DEBUG, &v)?;
    }
    if let Some(v) = lookup(ENV_TIMEOUT_SECS) {
      let secs: u64 = v.trim().parse().map_err(|_| ConfigError::Invalid {
        var: ENV_TIMEOUT_SECS,
        value: v.clone(),
      })?;
      cfg.timeout = (secs > 0).then(|| Duration::from_secs(secs));
    }
    if let Some(v) = lookup(ENV_ATTACH_TIMEOUT_MS) {
      let ms: u64 = v.trim().parse().map_err(|_| ConfigError::Invalid {
        var: ENV_ATTACH_TIMEOUT_MS,
        value: v.clone(),
      })?;
      cfg.attach_read_timeout = Duration::from_millis(ms);
    }
    if let Some(v) = lookup(ENV_SESSION).filter(|s| !s.trim().is_empty()) {
      cfg.session_id = v.trim().to_string();
    }
    if let Some(v) = lookup(ENV_IPC_DIR).filter(|s| !s.trim().is_empty()) {
      cfg.ipc_dir = PathBuf::from(v);
    }
    Ok(cfg)
  }
}

fn parse_bool(var: &'static str, v: &str) -> Result<bool, ConfigError> {
  match v.trim().to_ascii_lowercase().as_str() {
    "1" | "true" | "yes" | "on" => Ok(true),
    "" | "0" | "false" | "no" | "off" => Ok(false),
    _ => Err(ConfigError::Invalid {
      var,
      value: v.to_string(),
    }),
  }
}
