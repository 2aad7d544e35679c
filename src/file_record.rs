//! Registro de archivo que cruza cada límite y su forma serializada `{name, type, data}`.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use infer::Infer;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::Path;

use crate::error::TransportError;

const DEFAULT_MIME: &str = "application/octet-stream";
const ALLOWED_KEYS: [&str; 3] = ["name", "type", "data"];

/// Archivo en memoria: nombre, tipo MIME y contenido binario.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FileRecord {
    pub name: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

impl FileRecord {
    pub fn new(name: impl Into<String>, mime_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            mime_type: mime_type.into(),
            bytes,
        }
    }

    /// Lee un archivo del disco e intenta deducir su tipo MIME a partir del contenido.
    pub async fn from_path(path: &Path) -> std::io::Result<Self> {
        let bytes = tokio::fs::read(path).await?;
        let name = path
            .file_name()
            .map(|value| value.to_string_lossy().into_owned())
            .unwrap_or_default();
        let mime_type = sniff_mime_type(&bytes);
        Ok(Self::new(name, mime_type, bytes))
    }

    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }

    /// Extensión en minúsculas, sin el punto inicial.
    pub fn extension(&self) -> Option<String> {
        extension_of(&self.name)
    }
}

pub(crate) fn extension_of(name: &str) -> Option<String> {
    Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
}

fn sniff_mime_type(bytes: &[u8]) -> String {
    Infer::new()
        .get(bytes)
        .map(|kind| kind.mime_type().to_string())
        .unwrap_or_else(|| DEFAULT_MIME.to_string())
}

/// Forma de transporte de un archivo; `data` viaja en base64.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireFileRecord {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,
}

/// Serializa un archivo; con `cleaned` se envía ese contenido en lugar del original.
pub fn compose(file: &FileRecord, cleaned: Option<&[u8]>) -> WireFileRecord {
    let data = cleaned.unwrap_or(&file.bytes);
    WireFileRecord {
        name: Some(file.name.clone()),
        mime_type: Some(file.mime_type.clone()),
        data: Some(STANDARD.encode(data)),
    }
}

pub fn multi_compose(files: &[FileRecord]) -> Vec<WireFileRecord> {
    files.iter().map(|file| compose(file, None)).collect()
}

/// Reconstruye un archivo. Los campos ausentes quedan vacíos; la validación
/// posterior del orquestador decide si el resultado es aceptable.
pub fn restore(wire: &WireFileRecord) -> Result<FileRecord, TransportError> {
    let bytes = match wire.data.as_deref() {
        Some(data) => STANDARD.decode(data).map_err(|e| {
            TransportError::Format(format!(
                "contenido base64 inválido en `{}`: {}",
                wire.name.as_deref().unwrap_or(""),
                e
            ))
        })?,
        None => Vec::new(),
    };

    Ok(FileRecord::new(
        wire.name.clone().unwrap_or_default(),
        wire.mime_type.clone().unwrap_or_default(),
        bytes,
    ))
}

pub fn multi_restore(wires: &[WireFileRecord]) -> Result<Vec<FileRecord>, TransportError> {
    wires.iter().map(restore).collect()
}

/// Valida la carga reensamblada antes de interpretarla como archivos: una lista
/// de objetos con solo las claves `name`, `type` y `data`, todas de texto.
pub fn validate_wire_records(value: Value) -> Result<Vec<WireFileRecord>, TransportError> {
    let Value::Array(items) = value else {
        return Err(TransportError::Format("se esperaba una lista".to_string()));
    };

    let mut records = Vec::with_capacity(items.len());
    for (index, item) in items.into_iter().enumerate() {
        let Value::Object(map) = item else {
            return Err(TransportError::Format(format!(
                "elemento {index}: se esperaba un objeto"
            )));
        };

        if let Some(key) = map.keys().find(|key| !ALLOWED_KEYS.contains(&key.as_str())) {
            return Err(TransportError::Format(format!(
                "elemento {index}: clave no permitida `{key}`"
            )));
        }

        let field = |key: &str| -> Result<Option<String>, TransportError> {
            match map.get(key) {
                None => Ok(None),
                Some(Value::String(text)) => Ok(Some(text.clone())),
                Some(_) => Err(TransportError::Format(format!(
                    "elemento {index}: `{key}` debe ser texto"
                ))),
            }
        };

        records.push(WireFileRecord {
            name: field("name")?,
            mime_type: field("type")?,
            data: field("data")?,
        });
    }

    Ok(records)
}
