//! Variable store shared by every node of a run.
//!
//! Nodes publish their records here and downstream actions read them back through
//! `{{ ref_name.path }}` placeholders. Implementations must be safe for concurrent
//! calls: sibling nodes interpolate and publish at the same time.

use std::collections::HashMap;
use std::sync::{LazyLock, RwLock};

use regex::Regex;
use serde_json::Value;
use tracing::{instrument, trace};

use crate::error::ActionError;
use crate::types::ActionOutput;

static PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
  Regex::new(r"\{\{\s*([A-Za-z0-9_\-]+(?:\.[A-Za-z0-9_\-]+)*)\s*\}\}").expect("static regex")
});

/// Contract the engine and providers require from the variable substrate.
pub trait Store: Send + Sync {
  /// Replaces every placeholder in `text`.
  fn interpolate(&self, text: &str) -> Result<String, ActionError>;

  /// Interpolates every string inside `value`, recursively.
  ///
  /// A string made of a single placeholder is replaced by the referenced JSON value
  /// itself, so numbers and objects keep their type.
  fn deep_interpolate(&self, value: &mut Value) -> Result<(), ActionError> {
    match value {
      Value::String(s) => {
        if let Some(path) = whole_placeholder(s) {
          *value = self
            .lookup(&path)
            .ok_or_else(|| undefined(&path))?;
        } else if s.contains("{{") {
          *s = self.interpolate(s)?;
        }
        Ok(())
      }
      Value::Array(items) => items.iter_mut().try_for_each(|v| self.deep_interpolate(v)),
      Value::Object(map) => map
        .values_mut()
        .try_for_each(|v| self.deep_interpolate(v)),
      _ => Ok(()),
    }
  }

  /// Publishes every record of `output` that has a ref name or value id.
  fn insert_output(&self, output: &ActionOutput);

  /// Sets a variable directly.
  fn set(&self, ref_name: &str, value: Value);

  fn get(&self, ref_name: &str) -> Option<Value>;

  fn get_by_id(&self, value_id: &str) -> Option<Value>;

  /// Resolves a dotted path (`ref.field.0`) to a value.
  fn lookup(&self, path: &str) -> Option<Value> {
    let mut parts = path.split('.');
    let root = self.get(parts.next()?)?;
    parts.try_fold(root, |v, key| descend(&v, key))
  }
}

fn descend(v: &Value, key: &str) -> Option<Value> {
  match v {
    Value::Object(map) => map.get(key).cloned(),
    Value::Array(items) => key.parse::<usize>().ok().and_then(|i| items.get(i).cloned()),
    _ => None,
  }
}

fn whole_placeholder(s: &str) -> Option<String> {
  let caps = PLACEHOLDER.captures(s)?;
  let m = caps.get(0)?;
  if m.start() == 0 && m.end() == s.len() {
    caps.get(1).map(|p| p.as_str().to_string())
  } else {
    None
  }
}

fn undefined(path: &str) -> ActionError {
  ActionError::Interpolation(format!("undefined variable '{}'", path))
}

fn render(v: &Value) -> String {
  match v {
    Value::String(s) => s.clone(),
    other => other.to_string(),
  }
}

#[derive(Default)]
struct Vars {
  by_ref: HashMap<String, Value>,
  by_id: HashMap<String, Value>,
}

/// In-memory [Store] guarded by a `RwLock`.
#[derive(Default)]
pub struct MemoryStore {
  vars: RwLock<Vars>,
}

impl MemoryStore {
  pub fn new() -> Self {
    Self::default()
  }

  /// Number of variables addressable by ref name.
  pub fn len(&self) -> usize {
    self.vars.read().map(|v| v.by_ref.len()).unwrap_or(0)
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }
}

impl Store for MemoryStore {
  #[instrument(level = "trace", skip(self))]
  fn interpolate(&self, text: &str) -> Result<String, ActionError> {
    let mut out = String::with_capacity(text.len());
    let mut last = 0;
    for caps in PLACEHOLDER.captures_iter(text) {
      let (Some(m), Some(path)) = (caps.get(0), caps.get(1)) else {
        continue;
      };
      let value = self
        .lookup(path.as_str())
        .ok_or_else(|| undefined(path.as_str()))?;
      out.push_str(&text[last..m.start()]);
      out.push_str(&render(&value));
      last = m.end();
    }
    out.push_str(&text[last..]);
    Ok(out)
  }

  fn insert_output(&self, output: &ActionOutput) {
    let Ok(mut vars) = self.vars.write() else {
      return;
    };
    for rec in &output.records {
      if let Some(name) = &rec.ref_name {
        trace!(ref_name = %name, action_id = %rec.action.action_id, "publishing record");
        vars.by_ref.insert(name.clone(), rec.value.clone());
      }
      if let Some(id) = &rec.value_id {
        vars.by_id.insert(id.clone(), rec.value.clone());
      }
    }
  }

  fn set(&self, ref_name: &str, value: Value) {
    if let Ok(mut vars) = self.vars.write() {
      vars.by_ref.insert(ref_name.to_string(), value);
    }
  }

  fn get(&self, ref_name: &str) -> Option<Value> {
    self.vars.read().ok()?.by_ref.get(ref_name).cloned()
  }

  fn get_by_id(&self, value_id: &str) -> Option<Value> {
    self.vars.read().ok()?.by_id.get(value_id).cloned()
  }
}
