//! Output produced by a node run: one or more storage records.

use std::sync::{Arc, Weak};

use serde::Serialize;

use super::Action;

/// One named/addressable value flowing out of a node.
#[derive(Debug, Serialize)]
pub struct StorageRecord {
  pub action: Arc<Action>,
  /// Value before any post-processing.
  pub raw_source: serde_json::Value,
  pub value: serde_json::Value,
  /// External identifier, e.g. a cloud resource id.
  #[serde(skip_serializing_if = "Option::is_none")]
  pub value_id: Option<String>,
  /// Name under which downstream nodes address this value through the store.
  #[serde(skip_serializing_if = "Option::is_none")]
  pub ref_name: Option<String>,
  #[serde(skip)]
  index: usize,
  #[serde(skip)]
  owner: Weak<ActionOutput>,
}

impl StorageRecord {
  /// The output owning this record, while it is alive.
  pub fn owner_output(&self) -> Option<Arc<ActionOutput>> {
    self.owner.upgrade()
  }

  /// Position of this record in its owner's `records`.
  pub fn index(&self) -> usize {
    self.index
  }
}

/// A value plus optional external id, used to build multi-record outputs.
#[derive(Debug, Clone)]
pub struct RecordValue {
  pub value: serde_json::Value,
  pub value_id: Option<String>,
}

/// Output produced once per successful node run.
///
/// The output is the only strong owner of its records; each record points back
/// to it through a `Weak`, so dropping the last `Arc<ActionOutput>` frees both.
#[derive(Debug, Serialize)]
pub struct ActionOutput {
  pub action: Arc<Action>,
  pub records: Vec<StorageRecord>,
}

impl ActionOutput {
  /// Builds an output holding exactly one record for `value`.
  ///
  /// The record's `ref_name` is taken from `action.output`.
  pub fn new(
    action: Arc<Action>,
    value: serde_json::Value,
    value_id: Option<String>,
  ) -> Arc<ActionOutput> {
    Self::with_records(action, vec![RecordValue { value, value_id }])
  }

  /// Builds an output with one record per entry of `values`, in order.
  pub fn with_records(action: Arc<Action>, values: Vec<RecordValue>) -> Arc<ActionOutput> {
    Arc::new_cyclic(|owner| {
      let records = values
        .into_iter()
        .enumerate()
        .map(|(index, rv)| StorageRecord {
          action: action.clone(),
          raw_source: rv.value.clone(),
          value: rv.value,
          value_id: rv.value_id,
          ref_name: action.output.clone(),
          index,
          owner: owner.clone(),
        })
        .collect();
      ActionOutput { action, records }
    })
  }

  pub fn first(&self) -> Option<&StorageRecord> {
    self.records.first()
  }

  pub fn record_by_id(&self, value_id: &str) -> Option<&StorageRecord> {
    self
      .records
      .iter()
      .find(|r| r.value_id.as_deref() == Some(value_id))
  }
}
