use thiserror::Error;

#[derive(Debug, Error)]
pub enum FlowError {
  #[error("duplicate {kind} id '{id}' in flow '{flow_id}'")]
  DuplicateId {
    flow_id: String,
    kind: String,
    id: String,
  },

  #[error("flow '{flow_id}' has an empty {kind} id")]
  EmptyId { flow_id: String, kind: String },
}
