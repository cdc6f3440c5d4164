use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle status of an execution or task run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StateType {
  Created,
  Restarted,
  Running,
  Paused,
  Killing,
  Success,
  Warning,
  Failed,
  Killed,
}

impl StateType {
  pub fn is_created(&self) -> bool {
    matches!(self, StateType::Created | StateType::Restarted)
  }

  pub fn is_running(&self) -> bool {
    matches!(self, StateType::Running | StateType::Killing)
  }

  pub fn is_paused(&self) -> bool {
    matches!(self, StateType::Paused)
  }

  pub fn is_terminated(&self) -> bool {
    matches!(
      self,
      StateType::Success | StateType::Warning | StateType::Failed | StateType::Killed
    )
  }
}

/// One recorded transition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateHistory {
  pub state: StateType,
  pub date: DateTime<Utc>,
}

/// Current status plus the transitions that led to it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct State {
  pub current: StateType,
  pub histories: Vec<StateHistory>,
}

impl State {
  /// A fresh state in `CREATED`.
  pub fn new() -> Self {
    Self {
      current: StateType::Created,
      histories: vec![StateHistory {
        state: StateType::Created,
        date: Utc::now(),
      }],
    }
  }

  /// Return a new state moved to `next`, with the transition recorded.
  pub fn with_state(&self, next: StateType) -> Self {
    let mut histories = self.histories.clone();
    histories.push(StateHistory {
      state: next,
      date: Utc::now(),
    });
    Self {
      current: next,
      histories,
    }
  }

  pub fn is_created(&self) -> bool {
    self.current.is_created()
  }

  pub fn is_running(&self) -> bool {
    self.current.is_running()
  }

  pub fn is_paused(&self) -> bool {
    self.current.is_paused()
  }

  pub fn is_terminated(&self) -> bool {
    self.current.is_terminated()
  }

  pub fn start_date(&self) -> Option<DateTime<Utc>> {
    self.histories.first().map(|history| history.date)
  }
}

impl Default for State {
  fn default() -> Self {
    Self::new()
  }
}
