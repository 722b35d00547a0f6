// Small persisted key/value state (search history). Not a message cache.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::error::{ChatError, ChatResult};

pub trait KvStore: Send + Sync + 'static {
    fn get(&self, key: &str) -> ChatResult<Option<String>>;
    fn set(&self, key: &str, value: &str) -> ChatResult<()>;
}

/// Whole-file JSON map, rewritten on every `set`.
#[derive(Debug)]
pub struct JsonFileKvStore {
    path: PathBuf,
    entries: Mutex<BTreeMap<String, String>>,
}

impl JsonFileKvStore {
    pub const FILE_NAME: &'static str = "kv_store.json";

    /// Opens `<data_dir>/kv_store.json`. A missing or unreadable file starts empty.
    pub fn open(data_dir: &str) -> Self {
        let path = Path::new(data_dir).join(Self::FILE_NAME);
        let entries = match std::fs::read(&path) {
            Ok(bytes) => serde_json::from_slice::<BTreeMap<String, String>>(&bytes)
                .unwrap_or_else(|e| {
                    tracing::warn!(%e, path = %path.display(), "kv store unreadable; starting empty");
                    BTreeMap::new()
                }),
            Err(_) => BTreeMap::new(),
        };
        Self {
            path,
            entries: Mutex::new(entries),
        }
    }
}

impl KvStore for JsonFileKvStore {
    fn get(&self, key: &str) -> ChatResult<Option<String>> {
        let entries = self
            .entries
            .lock()
            .map_err(|_| ChatError::Storage("kv store lock poisoned".into()))?;
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> ChatResult<()> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| ChatError::Storage("kv store lock poisoned".into()))?;
        entries.insert(key.to_string(), value.to_string());
        let json = serde_json::to_vec(&*entries)?;
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, json)?;
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct MemoryKvStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryKvStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KvStore for MemoryKvStore {
    fn get(&self, key: &str) -> ChatResult<Option<String>> {
        let entries = self
            .entries
            .lock()
            .map_err(|_| ChatError::Storage("kv store lock poisoned".into()))?;
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> ChatResult<()> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| ChatError::Storage("kv store lock poisoned".into()))?;
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }
}
