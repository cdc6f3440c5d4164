//! Runner configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default wait for an awaited execution.
pub const DEFAULT_TIMEOUT_MS: u64 = 15_000;

/// Default number of multipart files ingested at once.
pub const DEFAULT_UPLOAD_CONCURRENCY: usize = 8;

/// Configuration for [`crate::Runner`].
///
/// Every field has a default, so a partial JSON document is enough.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunnerConfig {
  /// 32-byte key for SECRET values. SECRET inputs and outputs are rejected
  /// while it is unset.
  #[serde(skip_serializing_if = "Option::is_none")]
  pub secret_key: Option<String>,
  pub default_timeout_ms: u64,
  pub upload_concurrency: usize,
}

impl Default for RunnerConfig {
  fn default() -> Self {
    Self {
      secret_key: None,
      default_timeout_ms: DEFAULT_TIMEOUT_MS,
      upload_concurrency: DEFAULT_UPLOAD_CONCURRENCY,
    }
  }
}

impl RunnerConfig {
  pub fn with_secret_key(mut self, key: impl Into<String>) -> Self {
    self.secret_key = Some(key.into());
    self
  }

  pub fn default_timeout(&self) -> Duration {
    Duration::from_millis(self.default_timeout_ms)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_partial_document_uses_defaults() {
    let config: RunnerConfig = serde_json::from_str(r#"{"upload_concurrency": 2}"#).unwrap();

    assert_eq!(config.upload_concurrency, 2);
    assert_eq!(config.secret_key, None);
    assert_eq!(config.default_timeout(), Duration::from_secs(15));
  }
}
