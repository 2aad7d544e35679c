use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::warn;
use uuid::Uuid;

use crate::error::CacheError;

const ENTRY_EXTENSION: &str = "json";

/// Entrada persistida: contenido limpio en base64, instante de escritura en
/// milisegundos y tamaño del contenido limpio en bytes.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredEntry {
    pub data: String,
    pub timestamp: i64,
    pub size: u64,
}

/// Almacén clave-valor donde vive la caché.
#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<StoredEntry>, CacheError>;
    async fn set(&self, key: &str, entry: StoredEntry) -> Result<(), CacheError>;
    async fn remove(&self, keys: &[String]) -> Result<(), CacheError>;
    /// Todas las entradas cuya clave empieza por `prefix`.
    async fn entries(&self, prefix: &str) -> Result<Vec<(String, StoredEntry)>, CacheError>;
}

#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, StoredEntry>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CacheStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<StoredEntry>, CacheError> {
        Ok(self.entries.lock().get(key).cloned())
    }

    async fn set(&self, key: &str, entry: StoredEntry) -> Result<(), CacheError> {
        self.entries.lock().insert(key.to_string(), entry);
        Ok(())
    }

    async fn remove(&self, keys: &[String]) -> Result<(), CacheError> {
        let mut entries = self.entries.lock();
        for key in keys {
            entries.remove(key);
        }
        Ok(())
    }

    async fn entries(&self, prefix: &str) -> Result<Vec<(String, StoredEntry)>, CacheError> {
        Ok(self
            .entries
            .lock()
            .iter()
            .filter(|(key, _)| key.starts_with(prefix))
            .map(|(key, entry)| (key.clone(), entry.clone()))
            .collect())
    }
}

#[derive(Serialize, Deserialize)]
struct PersistedEntry {
    key: String,
    #[serde(flatten)]
    entry: StoredEntry,
}

/// Un archivo JSON por entrada dentro de `root`.
pub struct DirectoryStore {
    root: PathBuf,
}

impl DirectoryStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn entry_path(&self, key: &str) -> PathBuf {
        self.root
            .join(format!("{}.{}", urlencoding::encode(key), ENTRY_EXTENSION))
    }

    async fn read_entry(path: &Path) -> Result<Option<PersistedEntry>, CacheError> {
        match tokio::fs::read(path).await {
            Ok(contents) => Ok(Some(serde_json::from_slice(&contents)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

/// Nombre temporal oculto junto al destino; el rename final es atómico.
fn temp_path_for(path: &Path) -> PathBuf {
    let parent = path.parent().unwrap_or_else(|| Path::new("."));
    let stem = path.file_stem().unwrap_or_default().to_string_lossy();
    parent.join(format!(".{}_temp_{}.{}", stem, Uuid::new_v4().simple(), ENTRY_EXTENSION))
}

#[async_trait]
impl CacheStore for DirectoryStore {
    async fn get(&self, key: &str) -> Result<Option<StoredEntry>, CacheError> {
        Ok(Self::read_entry(&self.entry_path(key))
            .await?
            .map(|persisted| persisted.entry))
    }

    async fn set(&self, key: &str, entry: StoredEntry) -> Result<(), CacheError> {
        tokio::fs::create_dir_all(&self.root).await?;

        let path = self.entry_path(key);
        let temp = temp_path_for(&path);
        let contents = serde_json::to_vec(&PersistedEntry {
            key: key.to_string(),
            entry,
        })?;

        tokio::fs::write(&temp, contents).await?;
        if let Err(e) = tokio::fs::rename(&temp, &path).await {
            let _ = tokio::fs::remove_file(&temp).await;
            return Err(e.into());
        }
        Ok(())
    }

    async fn remove(&self, keys: &[String]) -> Result<(), CacheError> {
        for key in keys {
            match tokio::fs::remove_file(self.entry_path(key)).await {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }

    async fn entries(&self, prefix: &str) -> Result<Vec<(String, StoredEntry)>, CacheError> {
        let mut dir = match tokio::fs::read_dir(&self.root).await {
            Ok(dir) => dir,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut found = Vec::new();
        while let Some(item) = dir.next_entry().await? {
            let path = item.path();
            let is_entry = path.extension().and_then(|e| e.to_str()) == Some(ENTRY_EXTENSION)
                && !item.file_name().to_string_lossy().starts_with('.');
            if !is_entry {
                continue;
            }

            match Self::read_entry(&path).await {
                Ok(Some(persisted)) if persisted.key.starts_with(prefix) => {
                    found.push((persisted.key, persisted.entry));
                }
                Ok(_) => {}
                Err(e) => warn!(path = %path.display(), error = %e, "entrada de caché ilegible"),
            }
        }

        Ok(found)
    }
}
