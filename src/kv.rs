//! String-keyed JSON persistence for the scenario cache.

use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use futures::future::{BoxFuture, FutureExt};
use parking_lot::RwLock;

#[derive(Debug, thiserror::Error)]
pub enum KvError {
    #[error("kv io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("kv unavailable: {0}")]
    Unavailable(String),
}

pub trait KeyValueStore: Send + Sync {
    fn get<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<Option<String>, KvError>>;
    fn set<'a>(&'a self, key: &'a str, value: String) -> BoxFuture<'a, Result<(), KvError>>;
    fn remove<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<(), KvError>>;
    fn keys(&self) -> BoxFuture<'_, Result<Vec<String>, KvError>>;
}

#[derive(Default)]
pub struct MemoryKv {
    entries: RwLock<BTreeMap<String, String>>,
}

impl MemoryKv {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryKv {
    fn get<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<Option<String>, KvError>> {
        let value = self.entries.read().get(key).cloned();
        futures::future::ready(Ok(value)).boxed()
    }

    fn set<'a>(&'a self, key: &'a str, value: String) -> BoxFuture<'a, Result<(), KvError>> {
        self.entries.write().insert(key.to_string(), value);
        futures::future::ready(Ok(())).boxed()
    }

    fn remove<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<(), KvError>> {
        self.entries.write().remove(key);
        futures::future::ready(Ok(())).boxed()
    }

    fn keys(&self) -> BoxFuture<'_, Result<Vec<String>, KvError>> {
        let keys = self.entries.read().keys().cloned().collect();
        futures::future::ready(Ok(keys)).boxed()
    }
}

/// One `<key>.json` file per entry under `root`. Path separators in keys are
/// replaced with `_`.
pub struct FileKv {
    root: PathBuf,
}

impl FileKv {
    pub async fn open(root: impl AsRef<Path>) -> Result<Self, KvError> {
        let root = root.as_ref().to_path_buf();
        tokio::fs::create_dir_all(&root).await?;
        Ok(Self { root })
    }

    fn path_for(&self, key: &str) -> PathBuf {
        let file = key.replace(['/', '\\'], "_");
        self.root.join(format!("{file}.json"))
    }
}

impl KeyValueStore for FileKv {
    fn get<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<Option<String>, KvError>> {
        async move {
            match tokio::fs::read_to_string(self.path_for(key)).await {
                Ok(value) => Ok(Some(value)),
                Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
                Err(err) => Err(err.into()),
            }
        }
        .boxed()
    }

    fn set<'a>(&'a self, key: &'a str, value: String) -> BoxFuture<'a, Result<(), KvError>> {
        async move {
            tokio::fs::write(self.path_for(key), value).await?;
            Ok(())
        }
        .boxed()
    }

    fn remove<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<(), KvError>> {
        async move {
            match tokio::fs::remove_file(self.path_for(key)).await {
                Err(err) if err.kind() != ErrorKind::NotFound => Err(err.into()),
                _ => Ok(()),
            }
        }
        .boxed()
    }

    fn keys(&self) -> BoxFuture<'_, Result<Vec<String>, KvError>> {
        async move {
            let mut dir = tokio::fs::read_dir(&self.root).await?;
            let mut keys = Vec::new();
            while let Some(entry) = dir.next_entry().await? {
                let name = entry.file_name().to_string_lossy().into_owned();
                if let Some(key) = name.strip_suffix(".json") {
                    keys.push(key.to_string());
                }
            }
            keys.sort();
            Ok(keys)
        }
        .boxed()
    }
}
