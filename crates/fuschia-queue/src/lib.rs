//! Fuschia Queue
//!
//! This crate provides the execution event queue. Every update of an
//! execution is published to the queue and delivered to all active
//! subscribers, in publication order per subscriber.
//!
//! The [`ExecutionQueue`] trait is the seam for transports (database queues,
//! brokers, etc.). [`InMemoryQueue`] is the in-process implementation.

mod memory;

pub use memory::InMemoryQueue;

use fuschia_flow::Execution;

/// Callback invoked for each delivered execution update.
pub type Handler = Box<dyn Fn(&Execution) + Send + Sync>;

/// Error type for queue operations.
#[derive(Debug, thiserror::Error)]
pub enum QueueError {
  /// The queue no longer accepts messages.
  #[error("queue closed")]
  Closed,

  /// The transport failed to deliver or accept a message.
  #[error("queue transport error: {0}")]
  Transport(String),
}

/// Publish/subscribe queue of execution updates.
pub trait ExecutionQueue: Send + Sync {
  /// Publish an execution update to every active subscriber.
  fn emit(&self, execution: Execution) -> Result<(), QueueError>;

  /// Subscribe `handler` to execution updates.
  ///
  /// Delivery stops once the returned [`Subscription`] is cancelled or
  /// dropped.
  fn receive(&self, handler: Handler) -> Subscription;
}

/// Handle to an active subscription.
///
/// Cancelling is idempotent; dropping the handle cancels it.
pub struct Subscription {
  cancel: Option<Box<dyn FnOnce() + Send>>,
}

impl Subscription {
  pub fn new(cancel: impl FnOnce() + Send + 'static) -> Self {
    Self {
      cancel: Some(Box::new(cancel)),
    }
  }

  /// Stop delivery to this subscription.
  pub fn cancel(mut self) {
    self.run_cancel();
  }

  fn run_cancel(&mut self) {
    if let Some(cancel) = self.cancel.take() {
      cancel();
    }
  }
}

impl Drop for Subscription {
  fn drop(&mut self) {
    self.run_cancel();
  }
}

impl std::fmt::Debug for Subscription {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Subscription")
      .field("active", &self.cancel.is_some())
      .finish()
  }
}
