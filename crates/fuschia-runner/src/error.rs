//! Runner error types.

use std::time::Duration;

use fuschia_flow::{Data, DataKind, DataType, ValidationError};
use fuschia_queue::QueueError;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Errors raised by the runner.
#[derive(Debug, thiserror::Error)]
pub enum RunnerError {
  /// A declared input or output could not be produced: it is required and
  /// absent, it failed to parse, or it cannot be handled as configured.
  #[error("{message}")]
  MissingRequiredArgument {
    id: String,
    kind: DataKind,
    data_type: Option<DataType>,
    value: Option<serde_json::Value>,
    message: String,
    #[source]
    cause: Option<BoxError>,
  },

  /// A parsed input failed its declared constraints.
  #[error("invalid value for input '{id}': {source}")]
  Validation {
    id: String,
    #[source]
    source: ValidationError,
  },

  /// A dotted input id collides with another input id.
  #[error("input key '{key}' conflicts with another input")]
  ConflictingKey { key: String },

  /// A multipart file part could not be ingested.
  #[error("failed to upload '{name}': {message}")]
  UploadFailure {
    name: String,
    message: String,
    #[source]
    source: Option<BoxError>,
  },

  /// Two multipart parts share a name.
  #[error("duplicate upload part '{name}'")]
  DuplicatePart { name: String },

  /// No flow matches the requested identity.
  #[error(
    "unable to find flow '{namespace}.{flow_id}'{}",
    .revision.map(|revision| format!(" at revision {revision}")).unwrap_or_default()
  )]
  FlowNotFound {
    namespace: String,
    flow_id: String,
    revision: Option<u32>,
  },

  /// The awaited execution update did not arrive in time.
  #[error("execution did not reach the expected state within {timeout:?}")]
  AwaitTimeout { timeout: Duration },

  /// An upload worker panicked or was cancelled.
  #[error("upload worker failed: {0}")]
  Join(#[from] tokio::task::JoinError),

  #[error(transparent)]
  Serialization(#[from] serde_json::Error),

  #[error(transparent)]
  Queue(#[from] QueueError),

  #[error(transparent)]
  Storage(#[from] fuschia_artifact::Error),
}

impl RunnerError {
  pub(crate) fn missing<D: Data + ?Sized>(data: &D) -> Self {
    Self::MissingRequiredArgument {
      id: data.id().to_string(),
      kind: data.kind(),
      data_type: data.data_type(),
      value: None,
      message: format!("missing required {} '{}'", data.kind(), data.id()),
      cause: None,
    }
  }

  pub(crate) fn secret_without_key<D: Data + ?Sized>(data: &D) -> Self {
    Self::MissingRequiredArgument {
      id: data.id().to_string(),
      kind: data.kind(),
      data_type: data.data_type(),
      value: None,
      message: format!(
        "unable to use SECRET {} '{}': no secret key is configured",
        data.kind(),
        data.id()
      ),
      cause: None,
    }
  }

  pub(crate) fn invalid<D: Data + ?Sized>(
    data: &D,
    value: &serde_json::Value,
    reason: impl std::fmt::Display,
    cause: Option<BoxError>,
  ) -> Self {
    let data_type = data
      .data_type()
      .map(|data_type| data_type.as_str())
      .unwrap_or("untyped");
    Self::MissingRequiredArgument {
      id: data.id().to_string(),
      kind: data.kind(),
      data_type: data.data_type(),
      value: Some(value.clone()),
      message: format!(
        "invalid {} '{}' of type {data_type} with value {value}: {reason}",
        data.kind(),
        data.id()
      ),
      cause,
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use fuschia_flow::Input;

  #[test]
  fn test_invalid_message_names_input_type_and_value() {
    let input = Input::new("count", Some(DataType::Int));
    let err = RunnerError::invalid(&input, &serde_json::json!("abc"), "not an integer", None);

    assert_eq!(
      err.to_string(),
      "invalid input 'count' of type INT with value \"abc\": not an integer"
    );
    match err {
      RunnerError::MissingRequiredArgument { id, value, .. } => {
        assert_eq!(id, "count");
        assert_eq!(value, Some(serde_json::json!("abc")));
      }
      other => panic!("unexpected error: {other}"),
    }
  }

  #[test]
  fn test_flow_not_found_message() {
    let err = RunnerError::FlowNotFound {
      namespace: "company.team".into(),
      flow_id: "hello".into(),
      revision: Some(3),
    };
    assert_eq!(
      err.to_string(),
      "unable to find flow 'company.team.hello' at revision 3"
    );
  }
}
