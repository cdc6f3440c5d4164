//! Fuschia Artifact
//!
//! Blob storage for execution files. A file supplied as an input is copied
//! into the store and referenced afterwards by a storage URI such as
//! `fuschia:///company/team/hello/executions/<id>/inputs/report/data.csv`.
//!
//! [`Store`] is keyed by plain relative keys; the URI helpers below map keys
//! to URIs and back. Contents move as byte streams in both directions.

mod fs;

use std::path::Path;
use std::pin::Pin;

use async_trait::async_trait;
use bytes::Bytes;
use futures::{Stream, StreamExt};
use fuschia_flow::Execution;
use percent_encoding::percent_decode_str;
use tokio_util::io::ReaderStream;
use url::Url;

pub use fs::FsStore;

/// Scheme of storage URIs.
pub const SCHEME: &str = "fuschia";

/// File contents, chunk by chunk.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, Error>> + Send>>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
  #[error("no stored file at '{0}'")]
  NotFound(String),

  /// The key leaves the store or is empty.
  #[error("invalid storage key: {0}")]
  InvalidKey(String),

  #[error("invalid storage uri '{uri}': {message}")]
  InvalidUri { uri: String, message: String },

  #[error("storage io error: {0}")]
  Io(#[from] std::io::Error),
}

/// Backend holding execution files (local disk, object storage, ...).
#[async_trait]
pub trait Store: Send + Sync {
  /// Read the file stored at `key`.
  async fn get(&self, key: &str) -> Result<ByteStream, Error>;

  /// Write `data` at `key`, replacing what was there.
  async fn put(&self, key: &str, data: ByteStream, content_type: &str) -> Result<(), Error>;

  /// Remove the file stored at `key`.
  async fn delete(&self, key: &str) -> Result<(), Error>;

  /// Copy a local file into the store as input `field` of `execution`.
  ///
  /// Returns the storage URI of the stored copy.
  async fn from_file(&self, execution: &Execution, field: &str, path: &Path) -> Result<Url, Error> {
    let file_name = path
      .file_name()
      .and_then(|name| name.to_str())
      .ok_or_else(|| Error::InvalidKey(path.display().to_string()))?;
    let key = input_key(execution, field, file_name);

    let file = tokio::fs::File::open(path).await.map_err(|e| match e.kind() {
      std::io::ErrorKind::NotFound => Error::NotFound(path.display().to_string()),
      _ => Error::Io(e),
    })?;
    let contents = ReaderStream::new(file).map(|chunk| chunk.map_err(Error::Io));
    self
      .put(&key, Box::pin(contents), "application/octet-stream")
      .await?;

    to_storage_uri(&key)
  }
}

/// Key prefix under which all files of an execution are kept.
pub fn execution_prefix(execution: &Execution) -> String {
  format!(
    "{}/{}/executions/{}",
    execution.namespace.replace('.', "/"),
    execution.flow_id,
    execution.id
  )
}

/// Key of a file supplied for input `field`.
pub fn input_key(execution: &Execution, field: &str, file_name: &str) -> String {
  format!("{}/inputs/{field}/{file_name}", execution_prefix(execution))
}

/// Build the storage URI of a key.
pub fn to_storage_uri(key: &str) -> Result<Url, Error> {
  let uri = format!("{SCHEME}:///{}", key.trim_start_matches('/'));
  Url::parse(&uri).map_err(|e| Error::InvalidUri {
    uri,
    message: e.to_string(),
  })
}

/// Recover the key from a storage URI.
pub fn from_storage_uri(uri: &Url) -> Result<String, Error> {
  if uri.scheme() != SCHEME {
    return Err(Error::InvalidUri {
      uri: uri.to_string(),
      message: format!("expected scheme '{SCHEME}'"),
    });
  }

  percent_decode_str(uri.path().trim_start_matches('/'))
    .decode_utf8()
    .map(|key| key.into_owned())
    .map_err(|e| Error::InvalidUri {
      uri: uri.to_string(),
      message: e.to_string(),
    })
}

/// Parse `value` as a storage URI, if it is one.
pub fn parse_storage_uri(value: &str) -> Option<Url> {
  Url::parse(value)
    .ok()
    .filter(|uri| uri.scheme() == SCHEME)
}

#[cfg(test)]
mod tests {
  use super::*;
  use fuschia_flow::{State, TypedValueMap};

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

  #[test]
  fn test_input_key_layout() {
    assert_eq!(
      input_key(&execution(), "report", "data.csv"),
      "company/team/hello/executions/exec-1/inputs/report/data.csv"
    );
  }

  #[test]
  fn test_storage_uri_round_trip() {
    let key = input_key(&execution(), "report", "my data.csv");
    let uri = to_storage_uri(&key).unwrap();

    assert_eq!(uri.scheme(), SCHEME);
    assert!(uri.as_str().starts_with("fuschia:///company/team/hello/"));
    assert_eq!(from_storage_uri(&uri).unwrap(), key);
  }

  #[test]
  fn test_parse_storage_uri() {
    assert!(parse_storage_uri("fuschia:///a/b.txt").is_some());
    assert!(parse_storage_uri("file:///tmp/b.txt").is_none());
    assert!(parse_storage_uri("/tmp/b.txt").is_none());
  }

  #[test]
  fn test_from_storage_uri_rejects_other_schemes() {
    let uri = Url::parse("https://example.com/a").unwrap();
    assert!(matches!(
      from_storage_uri(&uri),
      Err(Error::InvalidUri { .. })
    ));
  }
}
