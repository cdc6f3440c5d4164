//! Ingestion of multipart form uploads.
//!
//! File parts are spilled to a local temporary file, then copied into
//! storage as an input of the execution. Field parts become plain string
//! values. The result feeds [`Runner::typed_inputs`] like any other raw map.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use bytes::Bytes;
use futures::{Stream, StreamExt};
use fuschia_artifact::{ByteStream, Store, from_storage_uri, parse_storage_uri};
use fuschia_flow::{Execution, Input, TypedValueMap};
use once_cell::sync::Lazy;
use serde_json::Value;
use tempfile::TempDir;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, instrument, warn};

use crate::coerce::RawValueMap;
use crate::error::RunnerError;
use crate::runner::Runner;

/// Temporary upload directories that could not be removed right away.
static PENDING_REMOVAL: Lazy<Mutex<Vec<PathBuf>>> = Lazy::new(|| Mutex::new(Vec::new()));

/// One part of a multipart form.
pub enum UploadPart {
  /// A file, streamed as it arrives.
  File {
    name: String,
    filename: String,
    data: ByteStream,
  },
  /// A plain form field.
  Field { name: String, data: Bytes },
}

impl UploadPart {
  pub fn name(&self) -> &str {
    match self {
      UploadPart::File { name, .. } | UploadPart::Field { name, .. } => name,
    }
  }
}

impl std::fmt::Debug for UploadPart {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    match self {
      UploadPart::File { name, filename, .. } => f
        .debug_struct("File")
        .field("name", name)
        .field("filename", filename)
        .finish_non_exhaustive(),
      UploadPart::Field { name, data } => f
        .debug_struct("Field")
        .field("name", name)
        .field("len", &data.len())
        .finish(),
    }
  }
}

impl Runner {
  /// Ingest every part of a multipart form into a raw value map.
  ///
  /// File parts are ingested concurrently, bounded by
  /// `upload_concurrency`. Each maps to the storage URI of its stored copy.
  /// When any part fails, files already stored for the batch are deleted.
  #[instrument(skip_all, fields(execution_id = %execution.id))]
  pub async fn upload_parts<S>(
    &self,
    execution: &Execution,
    parts: S,
  ) -> Result<RawValueMap, RunnerError>
  where
    S: Stream<Item = UploadPart> + Send,
  {
    let execution = Arc::new(execution.clone());
    let permits = Arc::new(Semaphore::new(self.config.upload_concurrency.max(1)));
    let mut workers = JoinSet::new();
    let mut stored = Vec::new();

    let received = async {
      let mut seen = HashSet::new();
      let mut raw = RawValueMap::new();

      let mut parts = std::pin::pin!(parts);
      while let Some(part) = parts.next().await {
        if !seen.insert(part.name().to_string()) {
          return Err(RunnerError::DuplicatePart {
            name: part.name().to_string(),
          });
        }

        match part {
          UploadPart::Field { name, data } => {
            raw.insert(name, Value::String(String::from_utf8_lossy(&data).into_owned()));
          }
          UploadPart::File {
            name,
            filename,
            data,
          } => {
            let storage = self.storage.clone();
            let execution = execution.clone();
            let permits = permits.clone();
            workers.spawn(async move {
              let _permit = permits
                .acquire_owned()
                .await
                .map_err(|e| RunnerError::UploadFailure {
                  name: name.clone(),
                  message: "upload pool closed".to_string(),
                  source: Some(Box::new(e)),
                })?;
              let uri = ingest(storage.as_ref(), &execution, &name, &filename, data).await?;
              Ok::<_, RunnerError>((name, uri))
            });
          }
        }
      }

      while let Some(joined) = workers.join_next().await {
        let (name, uri) = joined??;
        stored.push(uri.clone());
        raw.insert(name, Value::String(uri));
      }

      Ok::<_, RunnerError>(raw)
    }
    .await;

    if received.is_err() {
      // Files still in flight are awaited so none of them outlives the batch.
      while let Some(joined) = workers.join_next().await {
        if let Ok(Ok((_, uri))) = joined {
          stored.push(uri);
        }
      }
      rollback(self.storage.as_ref(), &stored).await;
    }

    received
  }

  /// Ingest a multipart form, then coerce it against `inputs`.
  pub async fn typed_inputs_from_parts<S>(
    &self,
    inputs: &[Input],
    execution: &Execution,
    parts: S,
  ) -> Result<TypedValueMap, RunnerError>
  where
    S: Stream<Item = UploadPart> + Send,
  {
    let raw = self.upload_parts(execution, parts).await?;
    self.typed_inputs(inputs, execution, &raw).await
  }
}

/// Spill one file part to disk and copy it into storage.
async fn ingest(
  storage: &dyn Store,
  execution: &Execution,
  name: &str,
  filename: &str,
  data: ByteStream,
) -> Result<String, RunnerError> {
  let failure = |message: &str, source: Option<Box<dyn std::error::Error + Send + Sync>>| {
    RunnerError::UploadFailure {
      name: name.to_string(),
      message: message.to_string(),
      source,
    }
  };

  let directory = tempfile::Builder::new()
    .prefix("fuschia-upload-")
    .tempdir()
    .map_err(|e| failure("unable to create a temporary file", Some(Box::new(e))))?;
  let path = directory.path().join(local_name(filename));

  let written = spill(&path, data).await;
  let stored = match written {
    Ok(0) => Err(failure(
      &format!("no bytes received for file '{filename}'"),
      None,
    )),
    Ok(size) => {
      debug!(part = name, size, "spilled upload to disk");
      storage
        .from_file(execution, name, &path)
        .await
        .map(|uri| uri.to_string())
        .map_err(|e| failure("unable to store file", Some(Box::new(e))))
    }
    Err(e) => Err(failure("unable to receive file", Some(e))),
  };

  discard(directory);
  stored
}

/// Remove files stored by a batch that failed as a whole.
async fn rollback(storage: &dyn Store, stored: &[String]) {
  for uri in stored {
    let key = parse_storage_uri(uri)
      .ok_or_else(|| fuschia_artifact::Error::InvalidUri {
        uri: uri.clone(),
        message: "not a storage uri".to_string(),
      })
      .and_then(|uri| from_storage_uri(&uri));
    let removed = match key {
      Ok(key) => storage.delete(&key).await,
      Err(e) => Err(e),
    };
    match removed {
      Ok(()) => debug!(uri = %uri, "removed upload of failed batch"),
      Err(e) => warn!(uri = %uri, error = %e, "unable to remove upload of failed batch"),
    }
  }
}

/// Write `data` to `path`, returning the number of bytes written.
async fn spill(
  path: &Path,
  mut data: ByteStream,
) -> Result<u64, Box<dyn std::error::Error + Send + Sync>> {
  let mut file = File::create(path).await?;
  let mut size = 0u64;

  while let Some(chunk) = data.next().await {
    let chunk = chunk?;
    file.write_all(&chunk).await?;
    size += chunk.len() as u64;
  }

  file.flush().await?;
  Ok(size)
}

/// Keep only the final component of a client supplied file name.
fn local_name(filename: &str) -> &str {
  Path::new(filename)
    .file_name()
    .and_then(|name| name.to_str())
    .filter(|name| !name.is_empty())
    .unwrap_or("upload")
}

fn discard(directory: TempDir) {
  let path = directory.path().to_path_buf();
  if let Err(e) = directory.close() {
    warn!(path = %path.display(), error = %e, "unable to remove upload, deferring");
    PENDING_REMOVAL
      .lock()
      .unwrap_or_else(PoisonError::into_inner)
      .push(path);
  }
}

/// Remove upload leftovers whose immediate removal failed.
///
/// Returns the number of directories that were removed. Meant to run once at
/// shutdown.
pub fn purge_pending_uploads() -> usize {
  let pending: Vec<PathBuf> = PENDING_REMOVAL
    .lock()
    .unwrap_or_else(PoisonError::into_inner)
    .drain(..)
    .collect();

  pending
    .into_iter()
    .filter(|path| match std::fs::remove_dir_all(path) {
      Ok(()) => true,
      Err(e) if e.kind() == std::io::ErrorKind::NotFound => true,
      Err(e) => {
        warn!(path = %path.display(), error = %e, "unable to remove upload");
        false
      }
    })
    .count()
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_local_name_strips_directories() {
    assert_eq!(local_name("report.csv"), "report.csv");
    assert_eq!(local_name("../../etc/passwd"), "passwd");
    assert_eq!(local_name("dir/"), "dir");
    assert_eq!(local_name(""), "upload");
  }

  #[test]
  fn test_purge_removes_deferred_directories() {
    let directory = tempfile::tempdir().unwrap();
    let path = directory.keep();
    PENDING_REMOVAL.lock().unwrap().push(path.clone());

    assert!(purge_pending_uploads() >= 1);
    assert!(!path.exists());
  }
}
