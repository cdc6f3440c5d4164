use fuschia_flow::{Execution, Flow};

/// Decides whether an execution is finished, listeners included.
pub trait ConditionService: Send + Sync {
  fn is_terminated_with_listeners(&self, flow: &Flow, execution: &Execution) -> bool;
}

/// Considers an execution finished once it and all of its task runs are in
/// a terminal state.
#[derive(Debug, Clone, Default)]
pub struct StateConditionService;

impl ConditionService for StateConditionService {
  fn is_terminated_with_listeners(&self, _flow: &Flow, execution: &Execution) -> bool {
    execution.state.is_terminated()
      && execution
        .task_run_list
        .iter()
        .all(|task_run| task_run.state.is_terminated())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use fuschia_flow::{State, StateType, TaskRun, TypedValueMap};

  fn execution(task_runs: Vec<TaskRun>) -> Execution {
    Execution {
      id: "exec-1".to_string(),
      tenant_id: None,
      namespace: "company.team".to_string(),
      flow_id: "hello".to_string(),
      flow_revision: None,
      parent_id: None,
      state: State::new(),
      task_run_list: task_runs,
      inputs: TypedValueMap::new(),
      labels: Vec::new(),
    }
  }

  #[test]
  fn test_waits_for_task_runs() {
    let flow = Flow::new("company.team", "hello");
    let service = StateConditionService;

    let running = execution(vec![TaskRun::new("listener").with_state(StateType::Running)])
      .with_state(StateType::Success);
    assert!(!service.is_terminated_with_listeners(&flow, &running));

    let done = execution(vec![TaskRun::new("listener").with_state(StateType::Success)])
      .with_state(StateType::Success);
    assert!(service.is_terminated_with_listeners(&flow, &done));

    assert!(!service.is_terminated_with_listeners(&flow, &execution(Vec::new())));
  }
}
