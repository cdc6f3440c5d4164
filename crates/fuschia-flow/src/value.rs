//! Typed values produced by input and output coercion.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, NaiveTime, SecondsFormat, TimeDelta, Utc};
use serde::{Deserialize, Serialize, Serializer};
use url::Url;

use crate::duration::format_iso_duration;

/// Typed values keyed by input or output id, nested for dotted ids.
pub type TypedValueMap = BTreeMap<String, TypedValue>;

/// Type tag carried by [`EncryptedString`] once serialized.
pub const ENCRYPTED_STRING_TYPE: &str = "fuschia.datatype:aes_encrypted";

/// Envelope for a secret output kept in storage.
///
/// Distinguishes an encrypted value from a plain string when outputs are
/// rendered later.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedString {
  #[serde(rename = "type")]
  pub kind: String,
  pub value: String,
}

impl EncryptedString {
  pub fn new(value: impl Into<String>) -> Self {
    Self {
      kind: ENCRYPTED_STRING_TYPE.to_string(),
      value: value.into(),
    }
  }
}

/// A coerced value.
#[derive(Debug, Clone, PartialEq)]
pub enum TypedValue {
  /// Declared but absent.
  Null,
  String(String),
  Int(i64),
  Float(f64),
  Boolean(bool),
  DateTime(DateTime<Utc>),
  Date(NaiveDate),
  Time(NaiveTime),
  Duration(TimeDelta),
  /// Storage reference of an ingested file.
  File(Url),
  Json(serde_json::Value),
  Uri(String),
  /// Ciphertext of a secret input.
  Secret(String),
  /// Envelope of a secret output.
  Encrypted(EncryptedString),
  Map(TypedValueMap),
}

impl TypedValue {
  pub fn is_null(&self) -> bool {
    matches!(self, TypedValue::Null)
  }

  pub fn as_map(&self) -> Option<&TypedValueMap> {
    match self {
      TypedValue::Map(map) => Some(map),
      _ => None,
    }
  }
}

impl From<serde_json::Value> for TypedValue {
  fn from(value: serde_json::Value) -> Self {
    match value {
      serde_json::Value::Null => TypedValue::Null,
      serde_json::Value::Bool(value) => TypedValue::Boolean(value),
      serde_json::Value::String(value) => TypedValue::String(value),
      serde_json::Value::Number(number) => match number.as_i64() {
        Some(value) => TypedValue::Int(value),
        None => number
          .as_f64()
          .map(TypedValue::Float)
          .unwrap_or(TypedValue::Json(serde_json::Value::Number(number))),
      },
      other => TypedValue::Json(other),
    }
  }
}

impl Serialize for TypedValue {
  fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
    match self {
      TypedValue::Null => serializer.serialize_none(),
      TypedValue::String(value) | TypedValue::Uri(value) | TypedValue::Secret(value) => {
        serializer.serialize_str(value)
      }
      TypedValue::Int(value) => serializer.serialize_i64(*value),
      TypedValue::Float(value) => serializer.serialize_f64(*value),
      TypedValue::Boolean(value) => serializer.serialize_bool(*value),
      TypedValue::DateTime(value) => {
        serializer.serialize_str(&value.to_rfc3339_opts(SecondsFormat::AutoSi, true))
      }
      TypedValue::Date(value) => serializer.collect_str(value),
      TypedValue::Time(value) => serializer.collect_str(value),
      TypedValue::Duration(value) => serializer.serialize_str(&format_iso_duration(value)),
      TypedValue::File(value) => serializer.serialize_str(value.as_str()),
      TypedValue::Json(value) => value.serialize(serializer),
      TypedValue::Encrypted(value) => value.serialize(serializer),
      TypedValue::Map(map) => serializer.collect_map(map),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  #[test]
  fn test_from_json_scalars() {
    assert_eq!(TypedValue::from(json!(null)), TypedValue::Null);
    assert_eq!(TypedValue::from(json!(true)), TypedValue::Boolean(true));
    assert_eq!(TypedValue::from(json!(3)), TypedValue::Int(3));
    assert_eq!(TypedValue::from(json!(1.5)), TypedValue::Float(1.5));
    assert_eq!(
      TypedValue::from(json!({"a": 1})),
      TypedValue::Json(json!({"a": 1}))
    );
  }

  #[test]
  fn test_serialize_temporal_values() {
    let datetime = DateTime::parse_from_rfc3339("2024-01-01T00:00:00Z")
      .unwrap()
      .with_timezone(&Utc);
    let date = NaiveDate::from_ymd_opt(2024, 2, 29).unwrap();
    let time = NaiveTime::from_hms_opt(8, 30, 0).unwrap();

    assert_eq!(
      serde_json::to_value(TypedValue::DateTime(datetime)).unwrap(),
      json!("2024-01-01T00:00:00Z")
    );
    assert_eq!(
      serde_json::to_value(TypedValue::Date(date)).unwrap(),
      json!("2024-02-29")
    );
    assert_eq!(
      serde_json::to_value(TypedValue::Time(time)).unwrap(),
      json!("08:30:00")
    );
    assert_eq!(
      serde_json::to_value(TypedValue::Duration(TimeDelta::minutes(15))).unwrap(),
      json!("PT15M")
    );
  }

  #[test]
  fn test_serialize_nested_map_and_envelope() {
    let mut inner = TypedValueMap::new();
    inner.insert("b".into(), TypedValue::String("x".into()));
    let mut outer = TypedValueMap::new();
    outer.insert("a".into(), TypedValue::Map(inner));
    outer.insert(
      "token".into(),
      TypedValue::Encrypted(EncryptedString::new("c2VjcmV0")),
    );

    assert_eq!(
      serde_json::to_value(&outer).unwrap(),
      json!({
        "a": { "b": "x" },
        "token": { "type": ENCRYPTED_STRING_TYPE, "value": "c2VjcmV0" }
      })
    );
  }
}
