use std::sync::Arc;
use std::time::Duration;

use fuschia_artifact::Store;
use fuschia_flow::{Execution, Flow, Label};
use fuschia_queue::{ExecutionQueue, QueueError};
use tracing::{info, instrument};

use crate::condition::ConditionService;
use crate::config::RunnerConfig;
use crate::error::RunnerError;
use crate::factory::{InputsSupplier, new_execution};
use crate::parser::TypedValueParser;
use crate::predicate::{self, ExecutionPredicate};
use crate::repository::FlowRepository;

/// The flow to run: a definition at hand, or an identity to look up.
#[derive(Debug, Clone)]
pub enum FlowTarget {
  Flow(Flow),
  Id {
    tenant_id: Option<String>,
    namespace: String,
    flow_id: String,
  },
}

impl FlowTarget {
  pub fn id(
    tenant_id: Option<String>,
    namespace: impl Into<String>,
    flow_id: impl Into<String>,
  ) -> Self {
    Self::Id {
      tenant_id,
      namespace: namespace.into(),
      flow_id: flow_id.into(),
    }
  }
}

impl From<Flow> for FlowTarget {
  fn from(flow: Flow) -> Self {
    Self::Flow(flow)
  }
}

/// Options of a single run.
#[derive(Default)]
pub struct RunOptions {
  /// Revision to look up. Ignored when the flow is given directly.
  pub revision: Option<u32>,
  /// Defaults to the configured timeout.
  pub timeout: Option<Duration>,
  pub inputs: Option<InputsSupplier>,
  pub labels: Vec<Label>,
}

impl RunOptions {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn revision(mut self, revision: u32) -> Self {
    self.revision = Some(revision);
    self
  }

  pub fn timeout(mut self, timeout: Duration) -> Self {
    self.timeout = Some(timeout);
    self
  }

  pub fn inputs(mut self, inputs: InputsSupplier) -> Self {
    self.inputs = Some(inputs);
    self
  }

  pub fn labels(mut self, labels: Vec<Label>) -> Self {
    self.labels = labels;
    self
  }
}

enum Until {
  Terminated,
  Paused,
  Running,
}

/// Starts executions and waits for their outcome, and coerces execution
/// inputs and outputs.
#[derive(Clone)]
pub struct Runner {
  pub(crate) config: RunnerConfig,
  pub(crate) parser: TypedValueParser,
  pub(crate) queue: Arc<dyn ExecutionQueue>,
  pub(crate) flows: Arc<dyn FlowRepository>,
  pub(crate) storage: Arc<dyn Store>,
  pub(crate) conditions: Arc<dyn ConditionService>,
}

impl Runner {
  pub fn new(
    config: RunnerConfig,
    queue: Arc<dyn ExecutionQueue>,
    flows: Arc<dyn FlowRepository>,
    storage: Arc<dyn Store>,
    conditions: Arc<dyn ConditionService>,
  ) -> Self {
    let parser = TypedValueParser::new(storage.clone(), config.secret_key.clone());
    Self {
      config,
      parser,
      queue,
      flows,
      storage,
      conditions,
    }
  }

  /// Start an execution of `target` and wait until it is finished.
  pub async fn run_one(
    &self,
    target: impl Into<FlowTarget>,
    options: RunOptions,
  ) -> Result<Execution, RunnerError> {
    self.run_until(target.into(), options, Until::Terminated).await
  }

  /// Start an execution of `target` and wait until it pauses.
  pub async fn run_one_until_paused(
    &self,
    target: impl Into<FlowTarget>,
    options: RunOptions,
  ) -> Result<Execution, RunnerError> {
    self.run_until(target.into(), options, Until::Paused).await
  }

  /// Start an execution of `target` and wait until it is running.
  pub async fn run_one_until_running(
    &self,
    target: impl Into<FlowTarget>,
    options: RunOptions,
  ) -> Result<Execution, RunnerError> {
    self.run_until(target.into(), options, Until::Running).await
  }

  /// Run `emit`, then wait for a child of `parent` to finish.
  ///
  /// Without a timeout the wait is unbounded.
  pub async fn await_child_execution<E>(
    &self,
    flow: &Flow,
    parent: &Execution,
    emit: E,
    timeout: Option<Duration>,
  ) -> Result<Execution, RunnerError>
  where
    E: FnOnce() -> Result<(), QueueError> + Send,
  {
    let predicate = predicate::terminated_child(self.conditions.clone(), parent, flow);
    self
      .await_execution(predicate, emit, timeout)
      .await
  }

  /// Run `emit`, then wait for `execution` to finish. Without a timeout the
  /// wait is unbounded.
  pub async fn await_flow_execution<E>(
    &self,
    flow: &Flow,
    execution: &Execution,
    emit: E,
    timeout: Option<Duration>,
  ) -> Result<Execution, RunnerError>
  where
    E: FnOnce() -> Result<(), QueueError> + Send,
  {
    let predicate = predicate::terminated(self.conditions.clone(), execution, flow);
    self
      .await_execution(predicate, emit, timeout)
      .await
  }

  #[instrument(name = "execution_run", skip_all)]
  async fn run_until(
    &self,
    target: FlowTarget,
    options: RunOptions,
    until: Until,
  ) -> Result<Execution, RunnerError> {
    let flow = self.resolve(target, options.revision).await?;
    let timeout = self.timeout_or_default(options.timeout);
    let execution = new_execution(&flow, options.inputs, options.labels).await?;

    let predicate: ExecutionPredicate = match until {
      Until::Terminated => predicate::terminated(self.conditions.clone(), &execution, &flow),
      Until::Paused => predicate::paused(&execution),
      Until::Running => predicate::running(&execution),
    };

    info!(
      execution_id = %execution.id,
      namespace = %flow.namespace,
      flow_id = %flow.id,
      "execution_started"
    );

    let queue = self.queue.clone();
    let result = self
      .await_execution(predicate, move || queue.emit(execution), Some(timeout))
      .await?;

    info!(
      execution_id = %result.id,
      state = ?result.state.current,
      "execution_awaited"
    );
    Ok(result)
  }

  async fn resolve(&self, target: FlowTarget, revision: Option<u32>) -> Result<Flow, RunnerError> {
    match target {
      FlowTarget::Flow(flow) => Ok(flow),
      FlowTarget::Id {
        tenant_id,
        namespace,
        flow_id,
      } => self
        .flows
        .find_by_id(tenant_id.as_deref(), &namespace, &flow_id, revision)
        .await
        .ok_or(RunnerError::FlowNotFound {
          namespace,
          flow_id,
          revision,
        }),
    }
  }

  fn timeout_or_default(&self, timeout: Option<Duration>) -> Duration {
    timeout.unwrap_or_else(|| self.config.default_timeout())
  }
}
