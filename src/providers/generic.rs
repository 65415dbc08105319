//! Provider-independent actions.
//!
//! Every body parses its parameters first, returns `Ok(None)` when rehearsing, and
//! only then interpolates and acts, so a rehearsal never touches the store or the
//! outside world.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::instrument::Instrumented;
use tracing::{Instrument, info};

use crate::error::ActionError;
use crate::registry::{ActionEnv, ProviderRegistryBuilder};
use crate::types::{Action, ActionOutput};
use crate::vterm::TerminalEndpoint;

pub const PROVIDER: &str = "generic";

type RunOutput = Result<Option<Arc<ActionOutput>>, ActionError>;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct SleepParams {
  seconds: f64,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct DefineVariableParams {
  value: Value,
  #[serde(default)]
  value_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct PrintParams {
  message: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct AskParams {
  prompt: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct FailParams {
  message: String,
}

fn parse<T: DeserializeOwned>(action: &Action) -> Result<T, ActionError> {
  action.parse_parameters()
}

fn check_sleep(action: &Action) -> Result<(), ActionError> {
  let p: SleepParams = parse(action)?;
  if !p.seconds.is_finite() || p.seconds < 0.0 {
    return Err(ActionError::validation(format!(
      "{}: seconds must be a non-negative number",
      action.action_id
    )));
  }
  Ok(())
}

fn check_define_variable(action: &Action) -> Result<(), ActionError> {
  parse::<DefineVariableParams>(action)?;
  if action.output.as_deref().unwrap_or_default().is_empty() {
    return Err(ActionError::validation(format!(
      "{}: define_variable needs an output name",
      action.action_id
    )));
  }
  Ok(())
}

/// Registers the generic actions on `builder`.
pub fn register(builder: ProviderRegistryBuilder) -> ProviderRegistryBuilder {
  builder
    .validated_action(PROVIDER, "sleep", |env| wrap(env, sleep), check_sleep)
    .validated_action(
      PROVIDER,
      "define_variable",
      |env| wrap(env, define_variable),
      check_define_variable,
    )
    .validated_action(
      PROVIDER,
      "print",
      |env| wrap(env, print),
      |a| parse::<PrintParams>(a).map(drop),
    )
    .validated_action(
      PROVIDER,
      "ask",
      |env| wrap(env, ask),
      |a| parse::<AskParams>(a).map(drop),
    )
    .validated_action(
      PROVIDER,
      "fail",
      |env| wrap(env, fail),
      |a| parse::<FailParams>(a).map(drop),
    )
}

/// Runs `body` inside the action's span.
fn wrap<F, Fut>(env: ActionEnv, body: F) -> Instrumented<Fut>
where
  F: FnOnce(ActionEnv) -> Fut,
  Fut: Future<Output = RunOutput>,
{
  let span = env.span();
  body(env).instrument(span)
}

/// Waits `seconds`, returning early with the cancel cause if the node is cancelled.
async fn sleep(env: ActionEnv) -> RunOutput {
  let p: SleepParams = parse(env.action())?;
  if env.rehearsal {
    return Ok(None);
  }
  tokio::select! {
    _ = tokio::time::sleep(Duration::from_secs_f64(p.seconds)) => Ok(None),
    cause = env.cancelled() => Err(cause),
  }
}

/// Outputs the interpolated `value` under the action's output name.
async fn define_variable(env: ActionEnv) -> RunOutput {
  let mut p: DefineVariableParams = parse(env.action())?;
  if env.rehearsal {
    return Ok(None);
  }
  env.store().deep_interpolate(&mut p.value)?;
  Ok(Some(env.output(p.value, p.value_id)))
}

/// Writes the interpolated message to the debug terminal when there is one,
/// otherwise to the log.
async fn print(env: ActionEnv) -> RunOutput {
  let p: PrintParams = parse(env.action())?;
  if env.rehearsal {
    return Ok(None);
  }
  let message = env.store().interpolate(&p.message)?;
  match env.terminal() {
    Some(term) => write_line(&env, term, &message).await?,
    None => info!(action_id = %env.action().action_id, "{}", message),
  }
  Ok(None)
}

/// Writes `line` to the terminal unless the node is cancelled first. The relay
/// waits for a reader on the outer side, so an unattended terminal can block.
async fn write_line(
  env: &ActionEnv,
  term: &TerminalEndpoint,
  line: &str,
) -> Result<(), ActionError> {
  let bytes = format!("{}\n", line);
  tokio::select! {
    written = term.write(bytes.as_bytes()) => {
      written.map_err(|e| ActionError::provider(e.to_string()))
    }
    cause = env.cancelled() => Err(cause),
  }
}

/// Writes the prompt to the debug terminal and outputs the next line typed back.
async fn ask(env: ActionEnv) -> RunOutput {
  let p: AskParams = parse(env.action())?;
  if env.rehearsal {
    return Ok(None);
  }
  let prompt = env.store().interpolate(&p.prompt)?;
  env.debug_init();
  let term = env.terminal().ok_or_else(|| {
    ActionError::provider(format!(
      "{}: ask needs a debug terminal",
      env.action().action_id
    ))
  })?;
  write_line(&env, term, &prompt).await?;
  let answer = tokio::select! {
    line = term.read_line() => line.map_err(|e| ActionError::provider(e.to_string()))?,
    cause = env.cancelled() => return Err(cause),
  };
  Ok(Some(env.output(Value::String(answer), None)))
}

/// Fails with the interpolated message.
async fn fail(env: ActionEnv) -> RunOutput {
  let p: FailParams = parse(env.action())?;
  if env.rehearsal {
    return Ok(None);
  }
  Err(ActionError::provider(env.store().interpolate(&p.message)?))
}
