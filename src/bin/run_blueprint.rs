//! CLI: run a blueprint JSON document with the built-in providers.
//!
//! Usage: `run_blueprint [OPTIONS] <path-to-blueprint>`
//!
//! Prints the run report as JSON on stdout and exits 1 when any node failed or was
//! cancelled. Ctrl-C cancels every node that has not finished.
//!
//! Set RUST_LOG=blueprint_runtime=trace for TRACE-level span enter/exit and events.

use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use std::time::Duration;

use blueprint_runtime::attach::AttachServer;
use blueprint_runtime::{ActionError, Blueprint, Engine, EngineConfig, MemoryStore, providers};
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt::format::FmtSpan};

/// Run a blueprint.
#[derive(Parser, Debug)]
#[command(name = "run_blueprint")]
#[command(
  after_help = r#"Environment variables (override the matching flags when set):
  BLUEPRINT_REHEARSAL          1 to validate and dry-run every action
  BLUEPRINT_TIMEOUT_SECS       Per-node deadline in seconds (0 disables)
  BLUEPRINT_DEBUG              1 to give every node a debug terminal
  BLUEPRINT_SESSION            Session id used by the attach bridge
  BLUEPRINT_IPC_DIR            Directory for the attach socket
  BLUEPRINT_ATTACH_TIMEOUT_MS  How long a terminal attach waits for output

Examples:
  run_blueprint deploy.json
  run_blueprint --rehearsal --attach deploy.json"#
)]
struct Args {
  /// Validate and dry-run: no action has side effects.
  #[arg(long)]
  rehearsal: bool,

  /// Per-node timeout in seconds.
  #[arg(long, value_name = "SECS")]
  timeout: Option<u64>,

  /// Give every node a debug terminal.
  #[arg(long)]
  debug: bool,

  /// Listen for attach requests while the blueprint runs.
  #[arg(long)]
  attach: bool,

  /// Path to the blueprint JSON file
  #[arg(value_name = "path-to-blueprint")]
  blueprint: PathBuf,
}

#[tokio::main]
async fn main() {
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
    .with_span_events(FmtSpan::ENTER | FmtSpan::EXIT)
    .with_writer(std::io::stderr)
    .init();

  let args = Args::parse();
  info!("run_blueprint starting");

  // Flags first, then env vars on top.
  let mut config = match EngineConfig::from_env() {
    Ok(c) => c,
    Err(e) => {
      eprintln!("Error in environment: {}", e);
      process::exit(1);
    }
  };
  config.rehearsal |= args.rehearsal;
  config.debug |= args.debug;
  if config.timeout.is_none() {
    config.timeout = args.timeout.filter(|s| *s > 0).map(Duration::from_secs);
  }
  info!(
    session = %config.session_id,
    rehearsal = config.rehearsal,
    timeout = ?config.timeout,
    debug = config.debug,
    "options (env or flags)"
  );

  let blueprint = match Blueprint::from_path(&args.blueprint) {
    Ok(b) => b,
    Err(e) => {
      eprintln!("Error reading {}: {}", args.blueprint.display(), e);
      process::exit(1);
    }
  };
  let graph = match blueprint
    .into_builder()
    .and_then(|b| b.build(Arc::new(MemoryStore::new()), &config).map_err(Into::into))
  {
    Ok(g) => g,
    Err(e) => {
      eprintln!("Error arranging blueprint: {}", e);
      process::exit(1);
    }
  };
  let engine = match Engine::new(graph.clone(), &providers::default_registry(), config.clone()) {
    Ok(e) => e,
    Err(e) => {
      eprintln!("Error validating blueprint: {}", e);
      process::exit(1);
    }
  };

  let server = if args.attach {
    match AttachServer::bind(&config.ipc_dir, &config.session_id, engine.channels().clone()) {
      Ok(s) => {
        let s = s.with_request_timeout(config.attach_read_timeout);
        eprintln!("Attach: session {} at {}", config.session_id, s.path().display());
        Some(s.spawn())
      }
      Err(e) => {
        warn!(error = %e, "attach server unavailable");
        None
      }
    }
  } else {
    None
  };

  let interrupt = graph.clone();
  tokio::spawn(async move {
    if tokio::signal::ctrl_c().await.is_ok() {
      warn!("interrupted");
      interrupt.cancel_all(ActionError::Cancelled("interrupted by user".to_string()));
    }
  });

  let report = engine.run().await;

  if let Some((handle, shutdown)) = server {
    let _ = shutdown.send(true);
    let _ = handle.await;
  }

  match serde_json::to_string_pretty(&report) {
    Ok(json) => println!("{}", json),
    Err(e) => eprintln!("Error encoding report: {}", e),
  }
  if !report.is_success() {
    for n in report.failures() {
      eprintln!(
        "  {} ({}): {}",
        n.action_id,
        n.status,
        n.cause.as_ref().map(|c| c.to_string()).unwrap_or_default()
      );
    }
    process::exit(1);
  }
}
