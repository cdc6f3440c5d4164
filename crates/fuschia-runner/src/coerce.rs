//! Typed inputs and outputs of an execution.

use std::collections::HashMap;

use fuschia_flow::{
  Data, DataType, EncryptedString, Execution, Flow, Input, TypedValue, TypedValueMap,
};
use serde_json::{Map, Value};
use tracing::{debug, instrument};

use crate::error::RunnerError;
use crate::nested::nest;
use crate::runner::Runner;

/// Raw values keyed by input or output id.
pub type RawValueMap = HashMap<String, Value>;

/// A raw value counts as supplied when it is present and not null.
fn supplied<'a>(raw: &'a RawValueMap, id: &str) -> Option<&'a Value> {
  raw.get(id).filter(|value| !value.is_null())
}

impl Runner {
  /// Coerce `raw` against the declared `inputs` of an execution.
  ///
  /// Each declared input takes its supplied value, else its default. A
  /// required input with neither fails; an optional one yields
  /// [`TypedValue::Null`]. Undeclared keys in `raw` are ignored. Dotted ids
  /// are nested in the result.
  #[instrument(skip_all, fields(execution_id = %execution.id))]
  pub async fn typed_inputs(
    &self,
    inputs: &[Input],
    execution: &Execution,
    raw: &RawValueMap,
  ) -> Result<TypedValueMap, RunnerError> {
    let mut coerced = Vec::with_capacity(inputs.len());

    for input in inputs {
      if input.data_type == Some(DataType::Secret) {
        self.parser.secret_key(input)?;
      }

      let current = supplied(raw, &input.id)
        .or_else(|| input.defaults.as_ref().filter(|value| !value.is_null()))
        .cloned();

      let value = match current {
        None if input.required => return Err(RunnerError::missing(input)),
        None => TypedValue::Null,
        Some(current) => {
          let parsed = self.parser.parse(execution, input, current).await?;
          input
            .validate(&parsed)
            .map_err(|source| RunnerError::Validation {
              id: input.id.clone(),
              source,
            })?;
          parsed
        }
      };

      debug!(input = %input.id, null = value.is_null(), "coerced input");
      coerced.push((input.id.clone(), value));
    }

    nest(coerced)
  }

  /// [`Runner::typed_inputs`] against the inputs declared by `flow`.
  pub async fn typed_flow_inputs(
    &self,
    flow: &Flow,
    execution: &Execution,
    raw: &RawValueMap,
  ) -> Result<TypedValueMap, RunnerError> {
    self.typed_inputs(&flow.inputs, execution, raw).await
  }

  /// Coerce `raw` against the outputs declared by `flow`.
  ///
  /// Missing outputs map to null. SECRET outputs are wrapped in an
  /// [`EncryptedString`] envelope. The result is plain JSON, keyed by output
  /// id without any nesting.
  #[instrument(skip_all, fields(execution_id = %execution.id, flow_id = %flow.id))]
  pub async fn typed_outputs(
    &self,
    flow: &Flow,
    execution: &Execution,
    raw: &RawValueMap,
  ) -> Result<Map<String, Value>, RunnerError> {
    let mut coerced = Map::new();

    for output in &flow.outputs {
      if output.data_type() == Some(DataType::Secret) {
        self.parser.secret_key(output)?;
      }

      let value = match supplied(raw, &output.id) {
        None => TypedValue::Null,
        Some(current) => match self.parser.parse(execution, output, current.clone()).await? {
          TypedValue::Secret(ciphertext) => TypedValue::Encrypted(EncryptedString::new(ciphertext)),
          parsed => parsed,
        },
      };

      coerced.insert(output.id.clone(), serde_json::to_value(&value)?);
    }

    Ok(coerced)
  }
}
