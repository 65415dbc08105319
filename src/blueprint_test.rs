//! Tests for blueprint loading.

use std::sync::Arc;

use crate::blueprint::Blueprint;
use crate::config::EngineConfig;
use crate::error::{ArrangeError, BlueprintError};
use crate::store::MemoryStore;
use crate::types::ContextType;

const FORK_JOIN: &str = r#"{"actions": [
  {"action_id": "a", "provider": "generic", "action": "sleep",
   "parameters": {"seconds": 0}, "next_action": ["b", "c"]},
  {"action_id": "b", "provider": "generic", "action": "print",
   "parameters": {"message": "b"}, "next_action": ["d"]},
  {"action_id": "c", "provider": "generic", "action": "print",
   "parameters": {"message": "c"}, "next_action": ["d"]},
  {"action_id": "d", "provider": "generic", "action": "define_variable",
   "parameters": {"value": 1}, "output": "done"}
]}"#;

#[test]
fn parses_actions_and_edges() {
  let bp = Blueprint::from_json(FORK_JOIN).unwrap();
  assert_eq!(bp.actions.len(), 4);
  assert_eq!(bp.actions[0].next_action, vec!["b", "c"]);
  assert_eq!(bp.actions[0].action.action_name, "sleep");
  assert_eq!(bp.actions[3].action.output.as_deref(), Some("done"));
}

#[test]
fn infers_kinds_from_edges() {
  let graph = Blueprint::from_json(FORK_JOIN)
    .unwrap()
    .into_builder()
    .unwrap()
    .build(Arc::new(MemoryStore::new()), &EngineConfig::default())
    .unwrap();
  let kind = |id: &str| graph.by_action_id(id).unwrap().kind();
  assert_eq!(kind("a"), ContextType::Thread);
  assert_eq!(kind("b"), ContextType::Regular);
  assert_eq!(kind("d"), ContextType::Join);
}

#[test]
fn explicit_kind_is_kept() {
  let json = r#"{"actions": [
    {"action_id": "a", "provider": "generic", "action": "print", "kind": "thread",
     "parameters": {"message": "x"}, "next_action": ["b"]},
    {"action_id": "b", "provider": "generic", "action": "print",
     "parameters": {"message": "y"}}
  ]}"#;
  let graph = Blueprint::from_json(json)
    .unwrap()
    .into_builder()
    .unwrap()
    .build(Arc::new(MemoryStore::new()), &EngineConfig::default())
    .unwrap();
  assert!(graph.by_action_id("a").unwrap().is_thread_point());
}

#[test]
fn dangling_edge_is_rejected() {
  let json = r#"{"actions": [
    {"action_id": "a", "provider": "generic", "action": "print", "next_action": ["zz"]}
  ]}"#;
  let err = Blueprint::from_json(json).unwrap().into_builder().err().unwrap();
  assert!(matches!(err, BlueprintError::Arrange(ArrangeError::UnknownAction(ref id)) if id == "zz"));
}

#[test]
fn invalid_json_is_rejected() {
  assert!(matches!(
    Blueprint::from_json("{\"actions\": 3}"),
    Err(BlueprintError::Json(_))
  ));
}

#[test]
fn loads_from_file() {
  let dir = tempfile::tempdir().unwrap();
  let path = dir.path().join("bp.json");
  std::fs::write(&path, FORK_JOIN).unwrap();
  let bp = Blueprint::from_path(&path).unwrap();
  assert_eq!(bp.actions.len(), 4);
  assert!(matches!(
    Blueprint::from_path(&dir.path().join("missing.json")),
    Err(BlueprintError::Io(_))
  ));
}
