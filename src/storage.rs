use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use thiserror::Error;

use crate::models::StoreState;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("storage io failed at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("stored state is not valid json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

/// Where the canonical snapshot lives between runs. One blob, one key.
///
/// Calls may block. The store runs saves on tokio's blocking pool when a
/// runtime is present.
pub trait StateStorage: Send + Sync {
    fn load(&self) -> Result<Option<StoreState>, StorageError>;
    fn save(&self, state: &StoreState) -> Result<(), StorageError>;
}

/// `<dir>/<key>.json`, replaced atomically on every save.
#[derive(Debug, Clone)]
pub struct JsonFileStorage {
    dir: PathBuf,
    key: String,
}

impl JsonFileStorage {
    pub fn new(dir: impl Into<PathBuf>, key: impl Into<String>) -> Self {
        JsonFileStorage {
            dir: dir.into(),
            key: key.into(),
        }
    }

    pub fn path(&self) -> PathBuf {
        self.dir.join(format!("{}.json", self.key))
    }
}

impl StateStorage for JsonFileStorage {
    fn load(&self) -> Result<Option<StoreState>, StorageError> {
        let path = self.path();
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(source) => return Err(StorageError::Io { path, source }),
        };
        Ok(Some(serde_json::from_slice(&bytes)?))
    }

    fn save(&self, state: &StoreState) -> Result<(), StorageError> {
        let data = serde_json::to_vec_pretty(state)?;
        write_atomic(&self.path(), &data)
    }
}

fn write_atomic(path: &Path, data: &[u8]) -> Result<(), StorageError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(io_err(parent))?;
    }
    let tmp = path.with_extension(format!("tmp.{}", uuid::Uuid::new_v4().simple()));
    fs::write(&tmp, data).map_err(io_err(&tmp))?;
    fs::rename(&tmp, path).map_err(io_err(path))?;
    Ok(())
}

fn io_err(path: &Path) -> impl FnOnce(std::io::Error) -> StorageError {
    let path = path.to_path_buf();
    move |source| StorageError::Io { path, source }
}

/// In-process storage holding the serialized blob, for tests and embedding.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    blob: Mutex<Option<String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_state(state: &StoreState) -> Result<Self, StorageError> {
        Ok(MemoryStorage {
            blob: Mutex::new(Some(serde_json::to_string(state)?)),
        })
    }

    pub fn raw(&self) -> Option<String> {
        self.blob.lock().ok().and_then(|b| b.clone())
    }
}

impl StateStorage for MemoryStorage {
    fn load(&self) -> Result<Option<StoreState>, StorageError> {
        let blob = self
            .blob
            .lock()
            .map_err(|e| StorageError::Unavailable(e.to_string()))?;
        match blob.as_deref() {
            Some(raw) => Ok(Some(serde_json::from_str(raw)?)),
            None => Ok(None),
        }
    }

    fn save(&self, state: &StoreState) -> Result<(), StorageError> {
        let raw = serde_json::to_string(state)?;
        *self
            .blob
            .lock()
            .map_err(|e| StorageError::Unavailable(e.to_string()))? = Some(raw);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::seed;

    #[test]
    fn missing_file_loads_as_none() {
        let dir = tempfile::tempdir().unwrap();
        let storage = JsonFileStorage::new(dir.path(), "lms");
        assert!(storage.load().unwrap().is_none());
    }

    #[test]
    fn file_storage_saves_under_key() {
        let dir = tempfile::tempdir().unwrap();
        let storage = JsonFileStorage::new(dir.path().join("nested"), "lms_canonical_store_v1");
        let state = seed::initial_state();
        storage.save(&state).unwrap();

        assert!(dir.path().join("nested/lms_canonical_store_v1.json").exists());
        assert_eq!(storage.load().unwrap(), Some(state));

        let leftovers: Vec<_> = fs::read_dir(dir.path().join("nested"))
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().contains(".tmp."))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn corrupt_blob_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("lms.json"), b"{not json").unwrap();
        let storage = JsonFileStorage::new(dir.path(), "lms");
        assert!(matches!(storage.load(), Err(StorageError::Json(_))));
    }

    #[test]
    fn persisted_blob_uses_camel_case_keys() {
        let storage = MemoryStorage::new();
        storage.save(&seed::initial_state()).unwrap();
        let raw = storage.raw().unwrap();
        assert!(raw.contains("\"quizConfigs\""));
        assert!(raw.contains("\"pathSlug\""));
    }
}
