//! Tests for the generic provider, run through the engine.

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;

use crate::arrange::GraphBuilder;
use crate::config::EngineConfig;
use crate::engine::{Engine, RunReport};
use crate::error::{ActionError, ArrangeError};
use crate::providers::default_registry;
use crate::store::{MemoryStore, Store};
use crate::types::{Action, RunStatus};

fn generic(id: &str, action: &str, params: serde_json::Value) -> Action {
  Action::new(id, "generic", action).with_parameters(params)
}

fn chain(actions: Vec<Action>) -> GraphBuilder {
  let mut b = GraphBuilder::new();
  let ids: Vec<String> = actions.iter().map(|a| a.action_id.clone()).collect();
  for a in actions {
    b.add_action(a).unwrap();
  }
  for w in ids.windows(2) {
    b.connect(&w[0], &w[1]).unwrap();
  }
  b
}

async fn run(b: GraphBuilder, store: Arc<MemoryStore>, config: EngineConfig) -> RunReport {
  let g = b.build(store, &config).unwrap();
  Engine::new(g, &default_registry(), config).unwrap().run().await
}

#[tokio::test]
async fn define_variable_feeds_downstream_interpolation() {
  let store = Arc::new(MemoryStore::new());
  let b = chain(vec![
    generic("who", "define_variable", json!({"value": "world"})).with_output("who"),
    generic("greet", "define_variable", json!({"value": "hello {{ who }}"})).with_output("greeting"),
    generic("say", "print", json!({"message": "{{ greeting }}!"})),
  ]);
  let report = run(b, store.clone(), EngineConfig::default()).await;
  assert!(report.is_success());
  assert_eq!(store.get("greeting"), Some(json!("hello world")));
}

#[tokio::test]
async fn whole_placeholder_keeps_json_type() {
  let store = Arc::new(MemoryStore::new());
  store.set("server", json!({"id": 42}));
  let b = chain(vec![
    generic("copy", "define_variable", json!({"value": {"sid": "{{ server.id }}"}})).with_output("copy"),
  ]);
  assert!(run(b, store.clone(), EngineConfig::default()).await.is_success());
  assert_eq!(store.lookup("copy.sid"), Some(json!(42)));
}

#[tokio::test]
async fn value_id_is_published() {
  let store = Arc::new(MemoryStore::new());
  let b = chain(vec![
    generic("v", "define_variable", json!({"value": "x", "value_id": "vol-1"})).with_output("vol"),
  ]);
  assert!(run(b, store.clone(), EngineConfig::default()).await.is_success());
  assert_eq!(store.get_by_id("vol-1"), Some(json!("x")));
}

#[tokio::test]
async fn undefined_variable_fails_the_node() {
  let store = Arc::new(MemoryStore::new());
  let b = chain(vec![generic("say", "print", json!({"message": "{{ nope }}"}))]);
  let report = run(b, store, EngineConfig::default()).await;
  assert!(matches!(
    report.node("say").unwrap().cause,
    Some(ActionError::Interpolation(_))
  ));
}

#[tokio::test]
async fn rehearsal_skips_interpolation_and_store() {
  let store = Arc::new(MemoryStore::new());
  let b = chain(vec![
    generic("d", "define_variable", json!({"value": "{{ undefined.thing }}"})).with_output("out"),
    generic("f", "fail", json!({"message": "never"})),
    generic("s", "sleep", json!({"seconds": 3600})),
  ]);
  let config = EngineConfig {
    rehearsal: true,
    ..EngineConfig::default()
  };
  let report = tokio::time::timeout(Duration::from_secs(5), run(b, store.clone(), config))
    .await
    .unwrap();
  assert!(report.is_success());
  assert!(store.is_empty());
}

#[tokio::test]
async fn fail_reports_interpolated_message() {
  let store = Arc::new(MemoryStore::new());
  store.set("zone", json!("fsn1"));
  let b = chain(vec![generic("f", "fail", json!({"message": "no capacity in {{ zone }}"}))]);
  let report = run(b, store, EngineConfig::default()).await;
  assert_eq!(
    report.node("f").unwrap().cause,
    Some(ActionError::provider("no capacity in fsn1"))
  );
}

#[tokio::test(start_paused = true)]
async fn sleep_stops_on_timeout() {
  let store = Arc::new(MemoryStore::new());
  let b = chain(vec![generic("s", "sleep", json!({"seconds": 600}))]);
  let config = EngineConfig {
    timeout: Some(Duration::from_secs(2)),
    ..EngineConfig::default()
  };
  let started = tokio::time::Instant::now();
  let report = run(b, store, config).await;
  assert_eq!(
    report.node("s").unwrap().cause,
    Some(ActionError::Timeout(Duration::from_secs(2)))
  );
  assert!(started.elapsed() < Duration::from_secs(600));
}

#[test]
fn parameters_are_validated_at_arrangement() {
  let cases = vec![
    generic("s", "sleep", json!({"seconds": -1})),
    generic("s", "sleep", json!({"secs": 1})),
    generic("s", "define_variable", json!({"value": 1})),
    generic("s", "print", json!({})),
    generic("s", "ask", json!({"prompt": 3})),
  ];
  for action in cases {
    let name = action.action_name.clone();
    let g = chain(vec![action])
      .build(Arc::new(MemoryStore::new()), &EngineConfig::default())
      .unwrap();
    let err = Engine::new(g, &default_registry(), EngineConfig::default()).err();
    assert!(
      matches!(err, Some(ArrangeError::Validation { .. })),
      "{} should be rejected",
      name
    );
  }
}

#[tokio::test]
async fn print_writes_to_debug_terminal() {
  let store = Arc::new(MemoryStore::new());
  store.set("name", json!("web-1"));
  let b = chain(vec![
    generic("p", "print", json!({"message": "booting {{ name }}"})).with_debug(true),
  ]);
  let config = EngineConfig::default();
  let g = b.build(store, &config).unwrap();
  let node = g.by_action_id("p").unwrap().clone();
  let reader = tokio::spawn(async move {
    node.debug_channel().unwrap().outer().read_line().await.unwrap()
  });
  let report = Engine::new(g, &default_registry(), config).unwrap().run().await;
  assert!(report.is_success());
  assert_eq!(reader.await.unwrap(), "booting web-1");
}

#[tokio::test]
async fn unread_terminal_does_not_outlive_the_timeout() {
  let store = Arc::new(MemoryStore::new());
  let b = chain(vec![
    generic("p", "print", json!({"message": "x".repeat(100)})).with_debug(true),
    generic("after", "print", json!({"message": "unreached"})),
  ]);
  let config = EngineConfig {
    terminal_buffer: 16,
    timeout: Some(Duration::from_millis(200)),
    ..EngineConfig::default()
  };
  let report = tokio::time::timeout(Duration::from_secs(5), run(b, store, config))
    .await
    .expect("run settles after the node timeout");
  let timeout = ActionError::Timeout(Duration::from_millis(200));
  assert_eq!(report.node("p").unwrap().cause, Some(timeout.clone()));
  assert_eq!(report.node("p").unwrap().status, RunStatus::Done);
  assert_eq!(report.node("after").unwrap().cause, Some(timeout));
}

#[tokio::test]
async fn interrupt_stops_a_print_blocked_on_its_terminal() {
  let store = Arc::new(MemoryStore::new());
  let b = chain(vec![
    generic("p", "print", json!({"message": "x".repeat(100)})).with_debug(true),
  ]);
  let config = EngineConfig {
    terminal_buffer: 16,
    ..EngineConfig::default()
  };
  let g = b.build(store, &config).unwrap();
  let engine = Engine::new(g.clone(), &default_registry(), config).unwrap();
  let run = tokio::spawn(engine.run());
  tokio::time::sleep(Duration::from_millis(100)).await;
  g.cancel_all(ActionError::Cancelled("interrupted".into()));
  let report = tokio::time::timeout(Duration::from_secs(5), run)
    .await
    .expect("run settles after the interrupt")
    .unwrap();
  assert_eq!(
    report.node("p").unwrap().cause,
    Some(ActionError::Cancelled("interrupted".into()))
  );
}

#[tokio::test]
async fn ask_outputs_the_typed_answer() {
  let store = Arc::new(MemoryStore::new());
  let b = chain(vec![
    generic("q", "ask", json!({"prompt": "name?"}))
      .with_output("answer")
      .with_debug(true),
  ]);
  let config = EngineConfig::default();
  let g = b.build(store.clone(), &config).unwrap();
  let node = g.by_action_id("q").unwrap().clone();
  let user = tokio::spawn(async move {
    let term = node.debug_channel().unwrap().outer();
    let prompt = term.read_line().await.unwrap();
    term.write(b"alice\n").await.unwrap();
    prompt
  });
  let report = Engine::new(g, &default_registry(), config).unwrap().run().await;
  assert!(report.is_success());
  assert_eq!(user.await.unwrap(), "name?");
  assert_eq!(store.get("answer"), Some(json!("alice")));
  assert_eq!(report.node("q").unwrap().status, RunStatus::Done);
}

#[tokio::test]
async fn ask_without_terminal_fails() {
  let store = Arc::new(MemoryStore::new());
  let b = chain(vec![generic("q", "ask", json!({"prompt": "name?"}))]);
  let report = run(b, store, EngineConfig::default()).await;
  assert!(matches!(
    report.node("q").unwrap().cause,
    Some(ActionError::Provider(ref m)) if m.contains("debug terminal")
  ));
}
