//! Tipos de error de cada capa del motor.

use thiserror::Error;

/// Fallos del transporte fragmentado.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Formato de mensaje inválido: {0}")]
    Format(String),

    #[error("Tiempo agotado esperando fragmentos de `{key}` ({received}/{expected})")]
    Timeout {
        key: String,
        received: usize,
        expected: String,
    },

    #[error("El receptor de `{key}` rechazó {what}")]
    Rejected { key: String, what: String },

    #[error("Canal no disponible: {0}")]
    Channel(String),

    #[error("No hay receptor escuchando la clave `{0}`")]
    NoListener(String),

    #[error("Ya existe un receptor para la clave `{0}`")]
    AlreadyListening(String),

    #[error("La carga requiere {fragments} fragmentos (máximo {max})")]
    TooLarge { fragments: usize, max: usize },

    #[error("Error de serialización: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Fallos del orquestador de limpieza. El texto de cada variante es el motivo
/// que se reenvía al contexto de origen.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum CleanError {
    #[error("{0}")]
    Validation(String),

    #[error("No hay limpiador para el archivo: {0}")]
    NoCleaner(String),

    #[error("{0}")]
    CleaningFailed(String),
}

impl CleanError {
    /// Motivo legible que acompaña a la notificación de error.
    pub fn reason(&self) -> String {
        self.to_string()
    }
}

/// Fallos internos de la caché. Nunca salen de `FingerprintCache`.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("E/S de caché: {0}")]
    Io(#[from] std::io::Error),

    #[error("Entrada de caché corrupta: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Contenido base64 inválido: {0}")]
    Decode(#[from] base64::DecodeError),
}

/// Fallos al cargar la configuración.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("No se pudo leer la configuración: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuración TOML inválida: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Fallos de la pasarela que une transporte y orquestador.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("Operación bloqueada: {failures} archivo(s) no se pudieron limpiar")]
    Blocked { failures: usize },
}
