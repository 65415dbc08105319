//! CLI: send one message to a running blueprint and print the response.
//!
//! Usage: `attach [--dir DIR] <session> <channel> [message...]`
//!
//! The channel is an action id for a node's debug terminal, or `readvar` to read a
//! store variable. At most 1024 bytes of the response are printed.

use std::io::Write;
use std::path::PathBuf;
use std::process;

use blueprint_runtime::attach::{AttachClient, ERROR_PREFIX};
use blueprint_runtime::config::ENV_IPC_DIR;
use clap::Parser;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "attach")]
struct Args {
  /// Directory holding the session sockets. Overridden by BLUEPRINT_IPC_DIR if set.
  #[arg(long, value_name = "DIR")]
  dir: Option<PathBuf>,

  /// Session id printed by run_blueprint
  session: String,

  /// Action id, or `readvar`
  channel: String,

  /// Message words, joined by single spaces
  message: Vec<String>,
}

#[tokio::main]
async fn main() {
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
    .with_writer(std::io::stderr)
    .init();

  let args = Args::parse();
  let dir = std::env::var(ENV_IPC_DIR)
    .ok()
    .filter(|d| !d.trim().is_empty())
    .map(PathBuf::from)
    .or(args.dir)
    .unwrap_or_else(std::env::temp_dir);

  let client = AttachClient::new(dir);
  let response = match client
    .send(&args.session, &args.channel, &args.message.join(" "))
    .await
  {
    Ok(r) => r,
    Err(e) => {
      eprintln!("Error attaching to {}: {}", args.session, e);
      process::exit(1);
    }
  };
  if response.starts_with(ERROR_PREFIX.as_bytes()) {
    eprintln!("{}", String::from_utf8_lossy(&response));
    process::exit(1);
  }
  let mut stdout = std::io::stdout();
  let _ = stdout.write_all(&response);
  if !response.ends_with(b"\n") {
    let _ = stdout.write_all(b"\n");
  }
}
