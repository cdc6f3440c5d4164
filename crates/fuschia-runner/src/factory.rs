use futures::future::BoxFuture;
use fuschia_flow::{Execution, Flow, Label, State, TypedValueMap, new_id};

use crate::error::RunnerError;

/// Produces the typed inputs of a new execution from its flow and the
/// execution itself, so file inputs can be stored under the execution.
pub type InputsSupplier =
  Box<dyn FnOnce(Flow, Execution) -> BoxFuture<'static, Result<TypedValueMap, RunnerError>> + Send>;

/// Create a new execution of `flow` in the created state.
///
/// The labels of the execution are the flow labels followed by `labels`.
pub async fn new_execution(
  flow: &Flow,
  inputs: Option<InputsSupplier>,
  labels: Vec<Label>,
) -> Result<Execution, RunnerError> {
  let mut execution = Execution {
    id: new_id(),
    tenant_id: flow.tenant_id.clone(),
    namespace: flow.namespace.clone(),
    flow_id: flow.id.clone(),
    flow_revision: flow.revision,
    parent_id: None,
    state: State::new(),
    task_run_list: Vec::new(),
    inputs: TypedValueMap::new(),
    labels: Vec::new(),
  };

  if let Some(inputs) = inputs {
    let typed = inputs(flow.clone(), execution.clone()).await?;
    execution = execution.with_inputs(typed);
  }

  let mut all_labels = flow.labels.clone();
  all_labels.extend(labels);
  if !all_labels.is_empty() {
    execution = execution.with_labels(all_labels);
  }

  Ok(execution)
}
