//! Execution records.

use serde::Serialize;

use crate::flow::Label;
use crate::state::{State, StateType};
use crate::value::TypedValueMap;

/// Generate a new unique id for executions and task runs.
pub fn new_id() -> String {
  uuid::Uuid::new_v4().to_string()
}

/// The run of one task inside an execution.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaskRun {
  pub id: String,
  pub task_id: String,
  pub state: State,
}

impl TaskRun {
  pub fn new(task_id: impl Into<String>) -> Self {
    Self {
      id: new_id(),
      task_id: task_id.into(),
      state: State::new(),
    }
  }

  pub fn with_state(self, state: StateType) -> Self {
    Self {
      state: self.state.with_state(state),
      ..self
    }
  }
}

/// One run of a flow.
///
/// Executions are never edited in place: the `with_*` methods consume the
/// execution and return the updated copy.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Execution {
  pub id: String,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub tenant_id: Option<String>,
  pub namespace: String,
  pub flow_id: String,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub flow_revision: Option<u32>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub parent_id: Option<String>,
  pub state: State,
  pub task_run_list: Vec<TaskRun>,
  pub inputs: TypedValueMap,
  pub labels: Vec<Label>,
}

impl Execution {
  pub fn with_inputs(self, inputs: TypedValueMap) -> Self {
    Self { inputs, ..self }
  }

  pub fn with_labels(self, labels: Vec<Label>) -> Self {
    Self { labels, ..self }
  }

  pub fn with_state(self, state: StateType) -> Self {
    Self {
      state: self.state.with_state(state),
      ..self
    }
  }

  pub fn with_parent_id(self, parent_id: impl Into<String>) -> Self {
    Self {
      parent_id: Some(parent_id.into()),
      ..self
    }
  }

  pub fn with_task_run_list(self, task_run_list: Vec<TaskRun>) -> Self {
    Self {
      task_run_list,
      ..self
    }
  }

  /// Whether any task run currently satisfies `predicate`.
  pub fn any_task_run(&self, predicate: impl Fn(&TaskRun) -> bool) -> bool {
    self.task_run_list.iter().any(predicate)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::value::TypedValue;

  fn execution() -> Execution {
    Execution {
      id: new_id(),
      tenant_id: None,
      namespace: "company.team".to_string(),
      flow_id: "hello".to_string(),
      flow_revision: Some(1),
      parent_id: None,
      state: State::new(),
      task_run_list: Vec::new(),
      inputs: TypedValueMap::new(),
      labels: Vec::new(),
    }
  }

  #[test]
  fn test_with_methods_return_updated_copies() {
    let original = execution();
    let mut inputs = TypedValueMap::new();
    inputs.insert("name".into(), TypedValue::String("world".into()));

    let updated = original
      .clone()
      .with_inputs(inputs.clone())
      .with_labels(vec![Label::new("env", "prod")])
      .with_state(StateType::Running);

    assert!(original.inputs.is_empty());
    assert!(original.state.is_created());
    assert_eq!(updated.id, original.id);
    assert_eq!(updated.inputs, inputs);
    assert_eq!(updated.labels, vec![Label::new("env", "prod")]);
    assert!(updated.state.is_running());
  }

  #[test]
  fn test_any_task_run() {
    let execution = execution().with_task_run_list(vec![
      TaskRun::new("first").with_state(StateType::Success),
      TaskRun::new("second").with_state(StateType::Paused),
    ]);

    assert!(execution.any_task_run(|run| run.state.is_paused()));
    assert!(!execution.any_task_run(|run| run.state.is_running()));
  }

  #[test]
  fn test_ids_are_unique() {
    assert_ne!(new_id(), new_id());
  }
}
