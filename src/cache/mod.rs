//! Caché de resultados limpios indexada por la huella del contenido.
//!
//! Es de mejor esfuerzo: cualquier fallo del almacén se registra y se trata
//! como fallo de búsqueda o como escritura omitida.

mod clock;
mod fingerprint;
mod store;

#[cfg(test)]
mod tests;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::config::CacheSettings;
use crate::error::CacheError;
use crate::file_record::FileRecord;

pub use clock::{Clock, ManualClock, SystemClock};
pub use fingerprint::{FINGERPRINT_PREFIX, fingerprint};
pub use store::{CacheStore, DirectoryStore, MemoryStore, StoredEntry};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub entry_count: usize,
    pub total_bytes: u64,
    pub max_entries: usize,
    pub max_bytes: u64,
}

pub struct FingerprintCache {
    store: Arc<dyn CacheStore>,
    clock: Arc<dyn Clock>,
    settings: CacheSettings,
}

impl FingerprintCache {
    pub fn new(store: Arc<dyn CacheStore>, settings: &CacheSettings) -> Self {
        Self {
            store,
            clock: Arc::new(SystemClock),
            settings: settings.clone(),
        }
    }

    pub fn in_memory(settings: &CacheSettings) -> Self {
        Self::new(Arc::new(MemoryStore::new()), settings)
    }

    /// Usa el directorio configurado o, sin él, un almacén en memoria.
    pub fn from_settings(settings: &CacheSettings) -> Self {
        match &settings.directory {
            Some(directory) => Self::new(Arc::new(DirectoryStore::new(directory.clone())), settings),
            None => Self::in_memory(settings),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Contenido limpio guardado para `file`, si existe y no caducó.
    pub async fn get(&self, file: &FileRecord) -> Option<Vec<u8>> {
        if !self.settings.enabled {
            return None;
        }

        match self.try_get(file).await {
            Ok(hit) => hit,
            Err(e) => {
                warn!(file = %file.name, error = %e, "lectura de caché fallida");
                None
            }
        }
    }

    /// Guarda el resultado limpio de `file`, haciendo sitio antes de escribir.
    pub async fn set(&self, file: &FileRecord, cleaned: &[u8]) {
        if !self.settings.enabled {
            return;
        }

        if let Err(e) = self.try_set(file, cleaned).await {
            warn!(file = %file.name, error = %e, "escritura de caché fallida");
        }
    }

    pub async fn clear(&self) {
        if let Err(e) = self.try_clear().await {
            warn!(error = %e, "no se pudo vaciar la caché");
        }
    }

    pub async fn stats(&self) -> CacheStats {
        let mut stats = CacheStats {
            max_entries: self.settings.max_entries,
            max_bytes: self.settings.max_bytes,
            ..CacheStats::default()
        };

        match self.store.entries(&self.prefix()).await {
            Ok(entries) => {
                stats.entry_count = entries.len();
                stats.total_bytes = entries.iter().map(|(_, entry)| entry.size).sum();
            }
            Err(e) => warn!(error = %e, "no se pudieron leer las estadísticas de caché"),
        }

        stats
    }

    async fn try_clear(&self) -> Result<(), CacheError> {
        let keys: Vec<String> = self
            .store
            .entries(&self.prefix())
            .await?
            .into_iter()
            .map(|(key, _)| key)
            .collect();
        self.store.remove(&keys).await
    }

    async fn try_get(&self, file: &FileRecord) -> Result<Option<Vec<u8>>, CacheError> {
        let hash = fingerprint(&file.bytes);
        let key = self.entry_key(&hash);

        let Some(entry) = self.store.get(&key).await? else {
            return Ok(None);
        };

        let age = self.clock.now_millis() - entry.timestamp;
        if age > clock::duration_millis(self.settings.ttl()) {
            debug!(fingerprint = %hash, age_ms = age, "entrada caducada");
            self.store.remove(&[key]).await?;
            return Ok(None);
        }

        debug!(fingerprint = %hash, file = %file.name, "acierto de caché");
        Ok(Some(STANDARD.decode(entry.data)?))
    }

    async fn try_set(&self, file: &FileRecord, cleaned: &[u8]) -> Result<(), CacheError> {
        let size = cleaned.len() as u64;
        if size > self.settings.max_bytes {
            debug!(file = %file.name, size, "resultado mayor que la capacidad; no se guarda");
            return Ok(());
        }

        let hash = fingerprint(&file.bytes);
        let key = self.entry_key(&hash);
        let data = STANDARD.encode(cleaned);

        self.enforce_limits(&key, size).await?;

        let entry = StoredEntry {
            data,
            timestamp: self.clock.now_millis(),
            size,
        };
        self.store.set(&key, entry).await?;
        debug!(fingerprint = %hash, size, "resultado guardado en caché");
        Ok(())
    }

    /// Expulsa las entradas más antiguas por instante de escritura hasta que
    /// quepa la entrada entrante. Una clave que se sobrescribe no cuenta dos veces.
    async fn enforce_limits(&self, incoming_key: &str, incoming_size: u64) -> Result<(), CacheError> {
        let mut entries: Vec<(String, StoredEntry)> = self
            .store
            .entries(&self.prefix())
            .await?
            .into_iter()
            .filter(|(key, _)| key != incoming_key)
            .collect();
        entries.sort_by_key(|(_, entry)| entry.timestamp);

        let mut count = entries.len() + 1;
        let mut total = entries.iter().map(|(_, entry)| entry.size).sum::<u64>() + incoming_size;
        let mut evicted = Vec::new();

        for (key, entry) in entries {
            if count <= self.settings.max_entries && total <= self.settings.max_bytes {
                break;
            }
            count -= 1;
            total = total.saturating_sub(entry.size);
            evicted.push(key);
        }

        if !evicted.is_empty() {
            info!(evicted = evicted.len(), "entradas expulsadas de la caché");
            self.store.remove(&evicted).await?;
        }
        Ok(())
    }

    fn prefix(&self) -> String {
        format!("{}:", self.settings.namespace)
    }

    fn entry_key(&self, hash: &str) -> String {
        format!("{}:{}", self.settings.namespace, hash)
    }
}
