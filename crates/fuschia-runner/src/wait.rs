//! Subscribe, emit, then wait for a matching execution update.

use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use fuschia_flow::Execution;
use fuschia_queue::QueueError;
use tokio::sync::oneshot;
use tracing::{debug, instrument, warn};

use crate::error::RunnerError;
use crate::runner::Runner;

impl Runner {
  /// Wait for the first execution update matching `predicate`.
  ///
  /// The subscription is opened before `emit` runs, so an update published
  /// by `emit` itself is observed. Only the first match is delivered. The
  /// subscription is closed on every exit path. Without a timeout the wait
  /// is unbounded.
  #[instrument(
    name = "execution_await",
    skip_all,
    fields(timeout = ?timeout)
  )]
  pub async fn await_execution<P, E>(
    &self,
    predicate: P,
    emit: E,
    timeout: Option<Duration>,
  ) -> Result<Execution, RunnerError>
  where
    P: Fn(&Execution) -> bool + Send + Sync + 'static,
    E: FnOnce() -> Result<(), QueueError> + Send,
  {
    let (sender, receiver) = oneshot::channel();
    let slot = Mutex::new(Some(sender));

    let subscription = self.queue.receive(Box::new(move |update: &Execution| {
      if !predicate(update) {
        return;
      }
      let sender = slot.lock().unwrap_or_else(PoisonError::into_inner).take();
      if let Some(sender) = sender {
        let _ = sender.send(update.clone());
      }
    }));

    if let Err(e) = emit() {
      subscription.cancel();
      return Err(e.into());
    }

    let received = match timeout {
      Some(timeout) => tokio::time::timeout(timeout, receiver)
        .await
        .map_err(|_| RunnerError::AwaitTimeout { timeout }),
      None => Ok(receiver.await),
    };
    subscription.cancel();

    match received {
      Ok(Ok(execution)) => {
        debug!(execution_id = %execution.id, state = ?execution.state.current, "execution_matched");
        Ok(execution)
      }
      // The queue dropped the subscription before anything matched.
      Ok(Err(_)) => Err(QueueError::Closed.into()),
      Err(e) => {
        warn!(error = %e, "execution_await_timeout");
        Err(e)
      }
    }
  }
}
