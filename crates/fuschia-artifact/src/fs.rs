use std::io;
use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use futures::StreamExt;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio_util::io::{ReaderStream, StreamReader};

use crate::{ByteStream, Error, Store};

/// Execution files kept under a local directory.
///
/// A key maps to the relative path `{root}/{key}`. Keys that would leave the
/// root are refused. Writes land in a `.part` sibling first and are renamed
/// into place, so readers never see a partial file.
pub struct FsStore {
  root: PathBuf,
}

impl FsStore {
  /// Create a store keeping its files under `root`.
  pub fn new(root: impl Into<PathBuf>) -> Self {
    Self { root: root.into() }
  }

  fn resolve(&self, key: &str) -> Result<PathBuf, Error> {
    let relative = Path::new(key);
    let escapes = relative.components().any(|component| {
      matches!(
        component,
        Component::ParentDir | Component::RootDir | Component::Prefix(_)
      )
    });
    if key.is_empty() || escapes {
      return Err(Error::InvalidKey(key.to_string()));
    }
    Ok(self.root.join(relative))
  }
}

fn missing_as_not_found(key: &str) -> impl FnOnce(io::Error) -> Error + '_ {
  move |e| match e.kind() {
    io::ErrorKind::NotFound => Error::NotFound(key.to_string()),
    _ => Error::Io(e),
  }
}

#[async_trait]
impl Store for FsStore {
  async fn get(&self, key: &str) -> Result<ByteStream, Error> {
    let file = fs::File::open(self.resolve(key)?)
      .await
      .map_err(missing_as_not_found(key))?;
    Ok(Box::pin(ReaderStream::new(file).map(|chunk| chunk.map_err(Error::Io))))
  }

  async fn put(&self, key: &str, data: ByteStream, _content_type: &str) -> Result<(), Error> {
    let target = self.resolve(key)?;
    if let Some(parent) = target.parent() {
      fs::create_dir_all(parent).await?;
    }

    let mut partial = target.clone().into_os_string();
    partial.push(".part");
    let partial = PathBuf::from(partial);

    let mut reader = StreamReader::new(data.map(|chunk| chunk.map_err(io::Error::other)));
    let mut file = fs::File::create(&partial).await?;
    let copied = async {
      tokio::io::copy(&mut reader, &mut file).await?;
      file.flush().await
    }
    .await;
    drop(file);

    if let Err(e) = copied {
      let _ = fs::remove_file(&partial).await;
      return Err(Error::Io(e));
    }
    fs::rename(&partial, &target).await?;
    Ok(())
  }

  async fn delete(&self, key: &str) -> Result<(), Error> {
    fs::remove_file(self.resolve(key)?)
      .await
      .map_err(missing_as_not_found(key))
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::from_storage_uri;
  use bytes::Bytes;
  use fuschia_flow::{Execution, State, TypedValueMap};

  async fn read_all(store: &FsStore, key: &str) -> Vec<u8> {
    let mut stream = store.get(key).await.unwrap();
    let mut out = Vec::new();
    while let Some(chunk) = stream.next().await {
      out.extend_from_slice(&chunk.unwrap());
    }
    out
  }

  fn bytes_stream(data: &'static [u8]) -> ByteStream {
    Box::pin(futures::stream::iter(vec![Ok(Bytes::from_static(data))]))
  }

  #[tokio::test]
  async fn test_put_get_delete() {
    let dir = tempfile::tempdir().unwrap();
    let store = FsStore::new(dir.path());

    store
      .put("a/b/c.txt", bytes_stream(b"hello"), "text/plain")
      .await
      .unwrap();
    assert_eq!(read_all(&store, "a/b/c.txt").await, b"hello");

    store.delete("a/b/c.txt").await.unwrap();
    assert!(matches!(
      store.get("a/b/c.txt").await,
      Err(Error::NotFound(_))
    ));
    assert!(matches!(
      store.delete("a/b/c.txt").await,
      Err(Error::NotFound(_))
    ));
  }

  #[tokio::test]
  async fn test_failed_write_leaves_nothing_behind() {
    let dir = tempfile::tempdir().unwrap();
    let store = FsStore::new(dir.path());
    let broken: ByteStream = Box::pin(futures::stream::iter(vec![
      Ok(Bytes::from_static(b"partial")),
      Err(Error::NotFound("upstream".into())),
    ]));

    assert!(store.put("a/broken.txt", broken, "text/plain").await.is_err());
    assert!(matches!(
      store.get("a/broken.txt").await,
      Err(Error::NotFound(_))
    ));
    assert!(!dir.path().join("a/broken.txt.part").exists());
  }

  #[tokio::test]
  async fn test_rejects_escaping_keys() {
    let dir = tempfile::tempdir().unwrap();
    let store = FsStore::new(dir.path());

    for key in ["../outside.txt", "/etc/passwd", ""] {
      assert!(matches!(
        store.put(key, bytes_stream(b"x"), "text/plain").await,
        Err(Error::InvalidKey(_))
      ));
    }
  }

  #[tokio::test]
  async fn test_from_file() {
    let dir = tempfile::tempdir().unwrap();
    let store = FsStore::new(dir.path().join("storage"));
    let source = dir.path().join("data.csv");
    std::fs::write(&source, b"a,b\n1,2\n").unwrap();

    let execution = Execution {
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
    };

    let uri = store.from_file(&execution, "report", &source).await.unwrap();
    assert_eq!(
      uri.as_str(),
      "fuschia:///company/team/hello/executions/exec-1/inputs/report/data.csv"
    );

    let key = from_storage_uri(&uri).unwrap();
    assert_eq!(read_all(&store, &key).await, b"a,b\n1,2\n");

    let missing = store
      .from_file(&execution, "report", &dir.path().join("missing.csv"))
      .await;
    assert!(matches!(missing, Err(Error::NotFound(_))));
  }
}
