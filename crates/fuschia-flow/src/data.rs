//! Declared inputs and outputs of a flow.

use std::fmt;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::value::TypedValue;

/// The declared type of an input or output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DataType {
  String,
  Enum,
  Secret,
  Int,
  Float,
  Boolean,
  Datetime,
  Date,
  Time,
  Duration,
  File,
  Json,
  Uri,
}

impl DataType {
  pub fn as_str(&self) -> &'static str {
    match self {
      DataType::String => "STRING",
      DataType::Enum => "ENUM",
      DataType::Secret => "SECRET",
      DataType::Int => "INT",
      DataType::Float => "FLOAT",
      DataType::Boolean => "BOOLEAN",
      DataType::Datetime => "DATETIME",
      DataType::Date => "DATE",
      DataType::Time => "TIME",
      DataType::Duration => "DURATION",
      DataType::File => "FILE",
      DataType::Json => "JSON",
      DataType::Uri => "URI",
    }
  }
}

impl fmt::Display for DataType {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

/// Whether a descriptor belongs to the input or the output schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataKind {
  Input,
  Output,
}

impl fmt::Display for DataKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      DataKind::Input => f.write_str("input"),
      DataKind::Output => f.write_str("output"),
    }
  }
}

/// Shape shared by inputs and outputs.
pub trait Data {
  fn id(&self) -> &str;

  fn data_type(&self) -> Option<DataType>;

  fn kind(&self) -> DataKind;
}

/// Error raised by an input's post-parse validation.
#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
  #[error("value '{value}' is not one of {allowed:?}")]
  NotAllowed { value: String, allowed: Vec<String> },

  #[error("value {value} is lower than the minimum {min}")]
  BelowMinimum { value: f64, min: f64 },

  #[error("value {value} is greater than the maximum {max}")]
  AboveMaximum { value: f64, max: f64 },

  #[error("value '{value}' does not match the pattern '{pattern}'")]
  PatternMismatch { value: String, pattern: String },

  #[error("invalid validator pattern '{pattern}': {source}")]
  InvalidPattern {
    pattern: String,
    #[source]
    source: regex::Error,
  },
}

fn default_required() -> bool {
  true
}

/// A declared flow input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Input {
  pub id: String,
  #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
  pub data_type: Option<DataType>,
  #[serde(default = "default_required")]
  pub required: bool,
  /// Raw default, coerced like a supplied value.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub defaults: Option<serde_json::Value>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub description: Option<String>,
  /// Allowed values for `ENUM` inputs.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub values: Option<Vec<String>>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub min: Option<f64>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub max: Option<f64>,
  /// Regex that `STRING` values must match entirely.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub validator: Option<String>,
}

impl Input {
  pub fn new(id: impl Into<String>, data_type: Option<DataType>) -> Self {
    Self {
      id: id.into(),
      data_type,
      required: true,
      defaults: None,
      description: None,
      values: None,
      min: None,
      max: None,
      validator: None,
    }
  }

  pub fn optional(mut self) -> Self {
    self.required = false;
    self
  }

  pub fn with_default(mut self, defaults: serde_json::Value) -> Self {
    self.defaults = Some(defaults);
    self
  }

  pub fn with_values<I, S>(mut self, values: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    self.values = Some(values.into_iter().map(Into::into).collect());
    self
  }

  pub fn with_range(mut self, min: Option<f64>, max: Option<f64>) -> Self {
    self.min = min;
    self.max = max;
    self
  }

  pub fn with_validator(mut self, pattern: impl Into<String>) -> Self {
    self.validator = Some(pattern.into());
    self
  }

  /// Validate a parsed value against the constraints declared on this input.
  pub fn validate(&self, value: &TypedValue) -> Result<(), ValidationError> {
    if let (Some(allowed), TypedValue::String(value)) = (&self.values, value) {
      if !allowed.iter().any(|candidate| candidate == value) {
        return Err(ValidationError::NotAllowed {
          value: value.clone(),
          allowed: allowed.clone(),
        });
      }
    }

    let number = match value {
      TypedValue::Int(value) => Some(*value as f64),
      TypedValue::Float(value) => Some(*value),
      _ => None,
    };
    if let Some(number) = number {
      if let Some(min) = self.min.filter(|min| number < *min) {
        return Err(ValidationError::BelowMinimum { value: number, min });
      }
      if let Some(max) = self.max.filter(|max| number > *max) {
        return Err(ValidationError::AboveMaximum { value: number, max });
      }
    }

    if let (Some(pattern), TypedValue::String(value)) = (&self.validator, value) {
      let regex = Regex::new(&format!("^(?:{pattern})$")).map_err(|source| {
        ValidationError::InvalidPattern {
          pattern: pattern.clone(),
          source,
        }
      })?;
      if !regex.is_match(value) {
        return Err(ValidationError::PatternMismatch {
          value: value.clone(),
          pattern: pattern.clone(),
        });
      }
    }

    Ok(())
  }
}

impl Data for Input {
  fn id(&self) -> &str {
    &self.id
  }

  fn data_type(&self) -> Option<DataType> {
    self.data_type
  }

  fn kind(&self) -> DataKind {
    DataKind::Input
  }
}

/// A declared flow output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Output {
  pub id: String,
  #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
  pub data_type: Option<DataType>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub description: Option<String>,
}

impl Output {
  pub fn new(id: impl Into<String>, data_type: Option<DataType>) -> Self {
    Self {
      id: id.into(),
      data_type,
      description: None,
    }
  }
}

impl Data for Output {
  fn id(&self) -> &str {
    &self.id
  }

  fn data_type(&self) -> Option<DataType> {
    self.data_type
  }

  fn kind(&self) -> DataKind {
    DataKind::Output
  }
}
