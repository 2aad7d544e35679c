//! Configuración del motor cargada desde TOML.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::ConfigError;
use crate::transport::MAX_CHUNKS;

const MIB: u64 = 1024 * 1024;

pub const DEFAULT_SUPPORTED_EXTENSIONS: &[&str] = &[
    // Imágenes
    "jpg", "jpeg", "png", "gif", "bmp", "webp", "heic", "ppm", "tiff", "svg", "svgz", "avif",
    "avifs",
    // Documentos
    "pdf", "doc", "dot", "docx", "dotx", "docm", "dotm", "xls", "xlt", "xla", "xlsx", "xltx",
    "xlsm", "xltm", "xlam", "xlsb", "ppt", "pot", "pps", "ppa", "pptx", "potx", "ppsx", "ppam",
    "pptm", "potm", "ppsm", "mdb", "odt", "ods", "odp", "odg", "odc", "odf", "odi", "odm", "odb",
    "ott", "ots", "otp", "otg", "otc", "oti", "oth", "epub",
    // Video
    "mp4", "webm", "ogv", "mpg", "mpeg", "m1v", "m4v", "avi", "mkv", "mov", "wmv",
    // Audio
    "mp3", "aac", "wav", "wv", "ogg", "opus", "flac",
];

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Bloquea la operación completa cuando falla la limpieza.
    pub block_on_error: bool,
    pub debug_mode: bool,
    /// Ancho de la ventana de limpieza simultánea.
    pub concurrency: usize,
    pub max_file_size: u64,
    pub supported_extensions: Vec<String>,
    pub cache: CacheSettings,
    pub transport: TransportSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            block_on_error: false,
            debug_mode: false,
            concurrency: 3,
            max_file_size: 500 * MIB,
            supported_extensions: DEFAULT_SUPPORTED_EXTENSIONS
                .iter()
                .map(|ext| ext.to_string())
                .collect(),
            cache: CacheSettings::default(),
            transport: TransportSettings::default(),
        }
    }
}

impl Settings {
    /// Lee la configuración de un archivo TOML; los campos ausentes toman su valor por defecto.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        let mut settings: Settings = toml::from_str(contents)?;
        settings.normalize();
        Ok(settings)
    }

    /// Ventana efectiva; nunca menor que uno.
    pub fn effective_concurrency(&self) -> usize {
        self.concurrency.max(1)
    }

    fn normalize(&mut self) {
        self.concurrency = self.concurrency.max(1);
        self.transport.max_chunks = self.transport.effective_max_chunks();
        for ext in self.supported_extensions.iter_mut() {
            *ext = ext.trim_start_matches('.').to_lowercase();
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    pub enabled: bool,
    pub namespace: String,
    pub max_entries: usize,
    pub max_bytes: u64,
    pub ttl_secs: u64,
    /// Directorio de persistencia; sin él la caché vive en memoria.
    pub directory: Option<PathBuf>,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            namespace: "scrubgate-file-cache".to_string(),
            max_entries: 100,
            max_bytes: 50 * MIB,
            ttl_secs: 24 * 60 * 60,
            directory: None,
        }
    }
}

impl CacheSettings {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportSettings {
    /// Tamaño máximo de cada fragmento de texto serializado, en bytes.
    pub chunk_size: usize,
    pub max_chunks: usize,
    pub receive_timeout_secs: u64,
}

impl Default for TransportSettings {
    fn default() -> Self {
        Self {
            chunk_size: 5 * MIB as usize,
            max_chunks: 1000,
            receive_timeout_secs: 60,
        }
    }
}

impl TransportSettings {
    /// Límite de fragmentos acotado al máximo del protocolo.
    pub fn effective_max_chunks(&self) -> usize {
        self.max_chunks.clamp(1, MAX_CHUNKS)
    }

    pub fn receive_timeout(&self) -> Duration {
        Duration::from_secs(self.receive_timeout_secs)
    }
}
