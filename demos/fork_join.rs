//! Run a small fork/join blueprint and print node events as they happen.

use std::sync::Arc;

use blueprint_runtime::listener::ChannelListener;
use blueprint_runtime::{Blueprint, Engine, EngineConfig, MemoryStore, Store, providers};
use futures::StreamExt;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
  let json = r#"{"actions": [
    {"action_id": "fork", "provider": "generic", "action": "define_variable",
     "parameters": {"value": "world"}, "output": "who", "next_action": ["left", "right"]},
    {"action_id": "left", "provider": "generic", "action": "sleep",
     "parameters": {"seconds": 0.2}, "next_action": ["join"]},
    {"action_id": "right", "provider": "generic", "action": "print",
     "parameters": {"message": "hello {{ who }}"}, "next_action": ["join"]},
    {"action_id": "join", "provider": "generic", "action": "define_variable",
     "parameters": {"value": "{{ who }} joined"}, "output": "greeting"}
  ]}"#;

  let config = EngineConfig::default();
  let store = Arc::new(MemoryStore::new());
  let graph = Blueprint::from_json(json)?
    .into_builder()?
    .build(store.clone(), &config)?;

  let (listener, mut events) = ChannelListener::stream();
  let engine = Engine::new(graph, &providers::default_registry(), config)?
    .with_listener(Arc::new(listener));

  let printer = tokio::spawn(async move {
    while let Some(ev) = events.next().await {
      println!("{} {} {:?}", ev.at.format("%H:%M:%S%.3f"), ev.action_id, ev.kind);
    }
  });

  let report = engine.run().await;
  // Nodes (and with them the listener) are dropped once the run is over.
  printer.await?;

  println!("greeting = {:?}", store.get("greeting"));
  println!("success = {}", report.is_success());
  Ok(())
}
