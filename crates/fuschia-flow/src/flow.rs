use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::data::{Data, Input, Output};
use crate::error::FlowError;

/// A key/value pair attached to flows and executions.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Label {
  pub key: String,
  pub value: String,
}

impl Label {
  pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
    Self {
      key: key.into(),
      value: value.into(),
    }
  }
}

/// A versioned flow definition.
///
/// The runner only reads flows: it uses the declared inputs and outputs to
/// coerce data and copies identity and labels into new executions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Flow {
  pub id: String,
  pub namespace: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub tenant_id: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub revision: Option<u32>,
  #[serde(default)]
  pub inputs: Vec<Input>,
  #[serde(default)]
  pub outputs: Vec<Output>,
  #[serde(default)]
  pub labels: Vec<Label>,
}

impl Flow {
  pub fn new(namespace: impl Into<String>, id: impl Into<String>) -> Self {
    Self {
      id: id.into(),
      namespace: namespace.into(),
      tenant_id: None,
      revision: None,
      inputs: Vec::new(),
      outputs: Vec::new(),
      labels: Vec::new(),
    }
  }

  /// Check that input and output ids are non-empty and unique per schema.
  pub fn validate(&self) -> Result<(), FlowError> {
    self.check_ids(&self.inputs)?;
    self.check_ids(&self.outputs)
  }

  fn check_ids<D: Data>(&self, schema: &[D]) -> Result<(), FlowError> {
    let mut seen = HashSet::new();
    for data in schema {
      if data.id().is_empty() {
        return Err(FlowError::EmptyId {
          flow_id: self.id.clone(),
          kind: data.kind().to_string(),
        });
      }
      if !seen.insert(data.id()) {
        return Err(FlowError::DuplicateId {
          flow_id: self.id.clone(),
          kind: data.kind().to_string(),
          id: data.id().to_string(),
        });
      }
    }
    Ok(())
  }
}
