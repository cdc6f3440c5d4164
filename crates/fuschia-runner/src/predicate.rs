//! Predicates over execution updates, for use with
//! [`Runner::await_execution`](crate::Runner::await_execution).

use std::sync::Arc;

use fuschia_flow::{Execution, Flow};

use crate::condition::ConditionService;

/// Boxed predicate over execution updates.
pub type ExecutionPredicate = Box<dyn Fn(&Execution) -> bool + Send + Sync>;

/// Matches `execution` once it is finished, listeners included.
pub fn terminated(
  conditions: Arc<dyn ConditionService>,
  execution: &Execution,
  flow: &Flow,
) -> ExecutionPredicate {
  let id = execution.id.clone();
  let flow = flow.clone();
  Box::new(move |update| {
    update.id == id && conditions.is_terminated_with_listeners(&flow, update)
  })
}

/// Matches `execution` once it is paused on a paused task run.
pub fn paused(execution: &Execution) -> ExecutionPredicate {
  let id = execution.id.clone();
  Box::new(move |update| {
    update.id == id
      && update.state.is_paused()
      && update.any_task_run(|task_run| task_run.state.is_paused())
  })
}

/// Matches `execution` once it is running a task.
pub fn running(execution: &Execution) -> ExecutionPredicate {
  let id = execution.id.clone();
  Box::new(move |update| {
    update.id == id
      && update.state.is_running()
      && update.any_task_run(|task_run| task_run.state.is_running())
  })
}

/// Matches the first finished child of `parent`, that is any execution whose
/// parent id is the id of `parent`.
pub fn terminated_child(
  conditions: Arc<dyn ConditionService>,
  parent: &Execution,
  flow: &Flow,
) -> ExecutionPredicate {
  let parent_id = parent.id.clone();
  let flow = flow.clone();
  Box::new(move |update| {
    update.parent_id.as_deref() == Some(parent_id.as_str())
      && conditions.is_terminated_with_listeners(&flow, update)
  })
}
