//! Conversion of raw values into typed values.

use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use fuschia_artifact::{Store, parse_storage_uri};
use fuschia_flow::{Data, DataType, Execution, TypedValue, parse_iso_duration};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

use crate::error::RunnerError;

static URI_PATTERN: Lazy<Regex> = Lazy::new(|| {
  Regex::new(
    r"^[a-z]+://(?:www\.)?[-a-zA-Z0-9@:%._+~#=]{1,256}\.[a-zA-Z0-9()]{1,6}\b(?:[-a-zA-Z0-9()@:%_+.~#?&/=]*)$",
  )
  .expect("uri pattern is valid")
});

/// Parses raw values according to the declared type of an input or output.
///
/// Raw values are JSON: strings as submitted by a form or query string, or
/// already-typed values when a caller passes them through.
#[derive(Clone)]
pub struct TypedValueParser {
  storage: Arc<dyn Store>,
  secret_key: Option<String>,
}

impl TypedValueParser {
  pub fn new(storage: Arc<dyn Store>, secret_key: Option<String>) -> Self {
    Self {
      storage,
      secret_key,
    }
  }

  /// The configured secret key, or an error naming `data`.
  pub fn secret_key<D: Data + ?Sized>(&self, data: &D) -> Result<&str, RunnerError> {
    self
      .secret_key
      .as_deref()
      .ok_or_else(|| RunnerError::secret_without_key(data))
  }

  /// Parse `value` as the declared type of `data`.
  ///
  /// `value` must not be null: absent and null values are handled by the
  /// caller. FILE values that are not storage URIs are treated as local paths
  /// and copied into storage for `execution`.
  pub async fn parse<D: Data + ?Sized + Sync>(
    &self,
    execution: &Execution,
    data: &D,
    value: Value,
  ) -> Result<TypedValue, RunnerError> {
    let Some(data_type) = data.data_type() else {
      return Ok(TypedValue::from(value));
    };

    match data_type {
      DataType::String | DataType::Enum => Ok(TypedValue::from(value)),

      DataType::Secret => {
        let key = self.secret_key(data)?;
        let text = expect_str(data, &value)?;
        fuschia_encryption::encrypt(key, text)
          .map(TypedValue::Secret)
          .map_err(|e| RunnerError::invalid(data, &value, "unable to encrypt", Some(Box::new(e))))
      }

      DataType::Int => match &value {
        Value::Number(number) => number
          .as_i64()
          .map(TypedValue::Int)
          .ok_or_else(|| RunnerError::invalid(data, &value, "not an integer", None)),
        Value::String(text) => text
          .parse::<i64>()
          .map(TypedValue::Int)
          .map_err(|e| RunnerError::invalid(data, &value, "not an integer", Some(Box::new(e)))),
        _ => Err(RunnerError::invalid(data, &value, "not an integer", None)),
      },

      DataType::Float => {
        let number = match &value {
          Value::Number(number) => number
            .as_f64()
            .ok_or_else(|| RunnerError::invalid(data, &value, "not a number", None))?,
          Value::String(text) => text.parse::<f64>().map_err(|e| {
            RunnerError::invalid(data, &value, "not a number", Some(Box::new(e)))
          })?,
          _ => return Err(RunnerError::invalid(data, &value, "not a number", None)),
        };
        if !number.is_finite() {
          return Err(RunnerError::invalid(data, &value, "not a finite number", None));
        }
        Ok(TypedValue::Float(number))
      }

      DataType::Boolean => match &value {
        Value::Bool(flag) => Ok(TypedValue::Boolean(*flag)),
        Value::String(text) if text.eq_ignore_ascii_case("true") => Ok(TypedValue::Boolean(true)),
        Value::String(text) if text.eq_ignore_ascii_case("false") => {
          Ok(TypedValue::Boolean(false))
        }
        _ => Err(RunnerError::invalid(data, &value, "not a boolean", None)),
      },

      DataType::Datetime => {
        let text = expect_str(data, &value)?;
        DateTime::parse_from_rfc3339(text)
          .map(|instant| TypedValue::DateTime(instant.with_timezone(&Utc)))
          .map_err(|e| {
            RunnerError::invalid(data, &value, "not an ISO-8601 instant", Some(Box::new(e)))
          })
      }

      DataType::Date => {
        let text = expect_str(data, &value)?;
        NaiveDate::parse_from_str(text, "%Y-%m-%d")
          .map(TypedValue::Date)
          .map_err(|e| RunnerError::invalid(data, &value, "not an ISO-8601 date", Some(Box::new(e))))
      }

      DataType::Time => {
        let text = expect_str(data, &value)?;
        NaiveTime::parse_from_str(text, "%H:%M:%S%.f")
          .or_else(|_| NaiveTime::parse_from_str(text, "%H:%M"))
          .map(TypedValue::Time)
          .map_err(|e| RunnerError::invalid(data, &value, "not an ISO-8601 time", Some(Box::new(e))))
      }

      DataType::Duration => {
        let text = expect_str(data, &value)?;
        parse_iso_duration(text)
          .map(TypedValue::Duration)
          .map_err(|e| {
            RunnerError::invalid(data, &value, "not an ISO-8601 duration", Some(Box::new(e)))
          })
      }

      DataType::File => {
        let text = expect_str(data, &value)?;
        if let Some(uri) = parse_storage_uri(&text.replace('\\', "/")) {
          return Ok(TypedValue::File(uri));
        }
        self
          .storage
          .from_file(execution, data.id(), Path::new(text))
          .await
          .map(TypedValue::File)
          .map_err(|e| RunnerError::invalid(data, &value, "unable to store file", Some(Box::new(e))))
      }

      DataType::Json => match value {
        Value::String(ref text) => serde_json::from_str(text)
          .map(TypedValue::Json)
          .map_err(|e| RunnerError::invalid(data, &value, "not valid JSON", Some(Box::new(e)))),
        Value::Object(_) | Value::Array(_) => Ok(TypedValue::Json(value)),
        _ => Err(RunnerError::invalid(data, &value, "not valid JSON", None)),
      },

      DataType::Uri => {
        let text = expect_str(data, &value)?;
        if URI_PATTERN.is_match(text) {
          Ok(TypedValue::Uri(text.to_string()))
        } else {
          Err(RunnerError::invalid(data, &value, "not a valid URI", None))
        }
      }
    }
  }
}

fn expect_str<'a, D: Data + ?Sized>(data: &D, value: &'a Value) -> Result<&'a str, RunnerError> {
  value
    .as_str()
    .ok_or_else(|| RunnerError::invalid(data, value, "expected a string", None))
}

#[cfg(test)]
mod tests {
  use super::*;
  use chrono::{TimeDelta, TimeZone};
  use fuschia_artifact::FsStore;
  use fuschia_flow::{Input, Output, State, TypedValueMap};
  use serde_json::json;

  const KEY: &str = "I6EGNzRESu3X3pKZidrqCGOHQFUFC0yK";

  fn execution() -> Execution {
    Execution {
      id: "exec-1".to_string(),
      tenant_id: None,
      namespace: "company.team".to_string(),
      flow_id: "hello".to_string(),
      flow_revision: None,
      parent_id: None,
      state: State::new(),
      task_run_list: Vec::new(),
      inputs: TypedValueMap::new(),
      labels: Vec::new(),
    }
  }

  fn parser(dir: &Path, secret_key: Option<&str>) -> TypedValueParser {
    TypedValueParser::new(
      Arc::new(FsStore::new(dir.join("storage"))),
      secret_key.map(str::to_string),
    )
  }

  async fn parse(data_type: DataType, value: Value) -> Result<TypedValue, RunnerError> {
    let dir = tempfile::tempdir().unwrap();
    let input = Input::new("value", Some(data_type));
    parser(dir.path(), Some(KEY))
      .parse(&execution(), &input, value)
      .await
  }

  #[tokio::test]
  async fn test_scalars() {
    assert_eq!(
      parse(DataType::Int, json!("42")).await.unwrap(),
      TypedValue::Int(42)
    );
    assert_eq!(
      parse(DataType::Int, json!(42)).await.unwrap(),
      TypedValue::Int(42)
    );
    assert_eq!(
      parse(DataType::Float, json!("4.5")).await.unwrap(),
      TypedValue::Float(4.5)
    );
    assert_eq!(
      parse(DataType::Boolean, json!("TRUE")).await.unwrap(),
      TypedValue::Boolean(true)
    );
    assert_eq!(
      parse(DataType::String, json!("hi")).await.unwrap(),
      TypedValue::String("hi".into())
    );

    assert!(parse(DataType::Int, json!("4.5")).await.is_err());
    assert!(parse(DataType::Float, json!("abc")).await.is_err());
    for non_finite in ["NaN", "inf", "-infinity", "1e400"] {
      assert!(
        matches!(
          parse(DataType::Float, json!(non_finite)).await,
          Err(RunnerError::MissingRequiredArgument { ref message, .. })
            if message.ends_with("not a finite number")
        ),
        "{non_finite} should be rejected"
      );
    }
    assert!(parse(DataType::Boolean, json!("yes")).await.is_err());
  }

  #[tokio::test]
  async fn test_untyped_passes_through() {
    let dir = tempfile::tempdir().unwrap();
    let input = Input::new("value", None);
    let parsed = parser(dir.path(), None)
      .parse(&execution(), &input, json!({"a": 1}))
      .await
      .unwrap();

    assert_eq!(parsed, TypedValue::Json(json!({"a": 1})));
  }

  #[tokio::test]
  async fn test_temporal() {
    assert_eq!(
      parse(DataType::Datetime, json!("2013-08-09T14:19:00Z"))
        .await
        .unwrap(),
      TypedValue::DateTime(Utc.with_ymd_and_hms(2013, 8, 9, 14, 19, 0).unwrap())
    );
    assert_eq!(
      parse(DataType::Datetime, json!("2013-08-09T16:19:00+02:00"))
        .await
        .unwrap(),
      TypedValue::DateTime(Utc.with_ymd_and_hms(2013, 8, 9, 14, 19, 0).unwrap())
    );
    assert!(parse(DataType::Datetime, json!("2013-08-09")).await.is_err());

    assert_eq!(
      parse(DataType::Date, json!("2013-08-09")).await.unwrap(),
      TypedValue::Date(NaiveDate::from_ymd_opt(2013, 8, 9).unwrap())
    );
    assert_eq!(
      parse(DataType::Time, json!("14:19:00")).await.unwrap(),
      TypedValue::Time(NaiveTime::from_hms_opt(14, 19, 0).unwrap())
    );
    assert_eq!(
      parse(DataType::Time, json!("14:19")).await.unwrap(),
      TypedValue::Time(NaiveTime::from_hms_opt(14, 19, 0).unwrap())
    );
    assert_eq!(
      parse(DataType::Duration, json!("PT20S")).await.unwrap(),
      TypedValue::Duration(TimeDelta::seconds(20))
    );
    assert!(parse(DataType::Duration, json!("20 seconds")).await.is_err());
  }

  #[tokio::test]
  async fn test_uri() {
    assert_eq!(
      parse(DataType::Uri, json!("https://www.example.com/path?a=1"))
        .await
        .unwrap(),
      TypedValue::Uri("https://www.example.com/path?a=1".into())
    );
    for rejected in ["not a uri", "www.example.com", "HTTP://example.com"] {
      assert!(
        parse(DataType::Uri, json!(rejected)).await.is_err(),
        "{rejected} should be rejected"
      );
    }
  }

  #[tokio::test]
  async fn test_json() {
    assert_eq!(
      parse(DataType::Json, json!(r#"{"a": [1, 2]}"#)).await.unwrap(),
      TypedValue::Json(json!({"a": [1, 2]}))
    );
    assert!(parse(DataType::Json, json!("{broken")).await.is_err());
  }

  #[tokio::test]
  async fn test_secret_is_encrypted() {
    let parsed = parse(DataType::Secret, json!("my secret")).await.unwrap();

    let TypedValue::Secret(ciphertext) = parsed else {
      panic!("expected a secret, got {parsed:?}");
    };
    assert_ne!(ciphertext, "my secret");
    assert_eq!(
      fuschia_encryption::decrypt(KEY, &ciphertext).unwrap(),
      "my secret"
    );
  }

  #[tokio::test]
  async fn test_secret_without_key() {
    let dir = tempfile::tempdir().unwrap();
    let output = Output::new("token", Some(DataType::Secret));
    let err = parser(dir.path(), None)
      .parse(&execution(), &output, json!("value"))
      .await
      .unwrap_err();

    assert!(matches!(err, RunnerError::MissingRequiredArgument { .. }));
    assert!(err.to_string().contains("no secret key"));
  }

  #[tokio::test]
  async fn test_file_storage_uri_passes_through() {
    let parsed = parse(DataType::File, json!("fuschia:///company/team/file.txt"))
      .await
      .unwrap();

    assert_eq!(
      parsed,
      TypedValue::File(url::Url::parse("fuschia:///company/team/file.txt").unwrap())
    );
  }

  #[tokio::test]
  async fn test_file_path_is_copied_into_storage() {
    let dir = tempfile::tempdir().unwrap();
    let source = dir.path().join("report.csv");
    std::fs::write(&source, b"a,b").unwrap();
    let input = Input::new("report", Some(DataType::File));

    let parsed = parser(dir.path(), None)
      .parse(&execution(), &input, json!(source.to_str().unwrap()))
      .await
      .unwrap();

    let TypedValue::File(uri) = parsed else {
      panic!("expected a file, got {parsed:?}");
    };
    assert_eq!(
      uri.as_str(),
      "fuschia:///company/team/hello/executions/exec-1/inputs/report/report.csv"
    );
    assert!(
      dir
        .path()
        .join("storage/company/team/hello/executions/exec-1/inputs/report/report.csv")
        .exists()
    );
  }

  #[tokio::test]
  async fn test_missing_file_fails() {
    let err = parse(DataType::File, json!("/definitely/not/here.txt"))
      .await
      .unwrap_err();

    match err {
      RunnerError::MissingRequiredArgument { cause, .. } => assert!(cause.is_some()),
      other => panic!("unexpected error: {other}"),
    }
  }
}
