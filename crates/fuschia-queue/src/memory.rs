use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use fuschia_flow::Execution;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::{ExecutionQueue, Handler, QueueError, Subscription};

struct Subscriber {
  sender: mpsc::UnboundedSender<Execution>,
  task: JoinHandle<()>,
}

#[derive(Default)]
struct Inner {
  subscribers: Mutex<HashMap<u64, Subscriber>>,
  next_id: AtomicU64,
  closed: AtomicBool,
}

impl Inner {
  fn subscribers(&self) -> MutexGuard<'_, HashMap<u64, Subscriber>> {
    self
      .subscribers
      .lock()
      .unwrap_or_else(PoisonError::into_inner)
  }

  fn unsubscribe(&self, id: u64) {
    if let Some(subscriber) = self.subscribers().remove(&id) {
      subscriber.task.abort();
      debug!(subscription_id = id, "unsubscribed from execution queue");
    }
  }
}

/// In-process execution queue.
///
/// Each subscriber owns an unbounded channel drained by its own task, so a
/// slow handler never blocks publishers or other subscribers. Subscribing
/// must happen inside a tokio runtime.
#[derive(Clone, Default)]
pub struct InMemoryQueue {
  inner: Arc<Inner>,
}

impl InMemoryQueue {
  pub fn new() -> Self {
    Self::default()
  }

  /// Number of active subscriptions.
  pub fn subscriber_count(&self) -> usize {
    self.inner.subscribers().len()
  }

  /// Stop accepting messages and drop every subscription.
  pub fn close(&self) {
    self.inner.closed.store(true, Ordering::SeqCst);
    for (_, subscriber) in self.inner.subscribers().drain() {
      subscriber.task.abort();
    }
  }
}

impl ExecutionQueue for InMemoryQueue {
  fn emit(&self, execution: Execution) -> Result<(), QueueError> {
    if self.inner.closed.load(Ordering::SeqCst) {
      return Err(QueueError::Closed);
    }

    let mut subscribers = self.inner.subscribers();
    // Receivers only go away when their task is aborted.
    subscribers.retain(|_, subscriber| subscriber.sender.send(execution.clone()).is_ok());
    Ok(())
  }

  fn receive(&self, handler: Handler) -> Subscription {
    let id = self.inner.next_id.fetch_add(1, Ordering::SeqCst);
    let (sender, mut receiver) = mpsc::unbounded_channel::<Execution>();

    let task = tokio::spawn(async move {
      while let Some(execution) = receiver.recv().await {
        handler(&execution);
      }
    });

    self
      .inner
      .subscribers()
      .insert(id, Subscriber { sender, task });
    debug!(subscription_id = id, "subscribed to execution queue");

    let inner = Arc::downgrade(&self.inner);
    Subscription::new(move || {
      if let Some(inner) = inner.upgrade() {
        inner.unsubscribe(id);
      }
    })
  }
}
