//! Key/value session storage shared by every running instance, with change
//! events so that one instance can follow another's login and logout.

use std::collections::HashMap;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tempfile::NamedTempFile;
use tokio::sync::{broadcast, mpsc};
use tokio_stream::wrappers::{BroadcastStream, ReceiverStream};
use tokio_stream::{Stream, StreamExt};

use crate::error::{AppError, AppResult};

/// A key changed in storage. `new_value == None` means the key was removed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageEvent {
    pub key: String,
    pub old_value: Option<String>,
    pub new_value: Option<String>,
}

pub trait SessionStorage: Send + Sync {
    fn get(&self, key: &str) -> AppResult<Option<String>>;

    fn set(&self, key: &str, value: &str) -> AppResult<()>;

    fn remove(&self, key: &str) -> AppResult<()>;
}

/// One JSON file per key inside a state directory.
pub struct FileStorage {
    dir: PathBuf,
}

impl FileStorage {
    pub fn new(dir: impl Into<PathBuf>) -> AppResult<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path(&self, key: &str) -> PathBuf {
        let name: String = key
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
            .collect();
        self.dir.join(format!("{}.json", name))
    }
}

impl SessionStorage for FileStorage {
    fn get(&self, key: &str) -> AppResult<Option<String>> {
        match std::fs::read_to_string(self.path(key)) {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn set(&self, key: &str, value: &str) -> AppResult<()> {
        // Each write gets its own temp file; readers only ever see a whole record.
        let mut tmp = NamedTempFile::new_in(&self.dir)?;
        tmp.write_all(value.as_bytes())?;
        tmp.persist(self.path(key)).map_err(|e| e.error)?;
        Ok(())
    }

    fn remove(&self, key: &str) -> AppResult<()> {
        match std::fs::remove_file(self.path(key)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Polls `key` every `interval` and yields an event whenever its value
/// changes. The stream ends when the receiver is dropped.
pub fn watch_key(
    storage: Arc<dyn SessionStorage>,
    key: &str,
    interval: Duration,
) -> ReceiverStream<StorageEvent> {
    let (tx, rx) = mpsc::channel(16);
    let key = key.to_string();
    let mut last = storage.get(&key).ok().flatten();

    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            let current = match storage.get(&key) {
                Ok(value) => value,
                Err(e) => {
                    tracing::warn!("Failed to read {} from storage: {}", key, e);
                    continue;
                }
            };
            if current == last {
                continue;
            }
            let event = StorageEvent {
                key: key.clone(),
                old_value: last.take(),
                new_value: current.clone(),
            };
            last = current;
            if tx.send(event).await.is_err() {
                break;
            }
        }
    });

    ReceiverStream::new(rx)
}

/// In-process storage; every write is broadcast to subscribers.
pub struct MemoryStorage {
    values: Mutex<HashMap<String, String>>,
    events: broadcast::Sender<StorageEvent>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(64);
        Self {
            values: Mutex::new(HashMap::new()),
            events,
        }
    }

    pub fn subscribe(&self) -> impl Stream<Item = StorageEvent> + Send + 'static {
        BroadcastStream::new(self.events.subscribe()).filter_map(|event| event.ok())
    }

    fn write(&self, key: &str, value: Option<&str>) -> AppResult<()> {
        let old_value = {
            let mut values = self
                .values
                .lock()
                .map_err(|_| AppError::Internal("storage lock poisoned".to_string()))?;
            match value {
                Some(v) => values.insert(key.to_string(), v.to_string()),
                None => values.remove(key),
            }
        };
        if old_value.as_deref() != value {
            // No subscribers is fine.
            let _ = self.events.send(StorageEvent {
                key: key.to_string(),
                old_value,
                new_value: value.map(str::to_string),
            });
        }
        Ok(())
    }
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionStorage for MemoryStorage {
    fn get(&self, key: &str) -> AppResult<Option<String>> {
        let values = self
            .values
            .lock()
            .map_err(|_| AppError::Internal("storage lock poisoned".to_string()))?;
        Ok(values.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> AppResult<()> {
        self.write(key, Some(value))
    }

    fn remove(&self, key: &str) -> AppResult<()> {
        self.write(key, None)
    }
}
