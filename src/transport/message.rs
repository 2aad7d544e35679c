use serde::{Deserialize, Serialize};
use serde_json::Number;

/// Mensaje del protocolo fragmentado. Los campos numéricos se conservan tal
/// como llegan para poder rechazar valores negativos o no enteros.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ChunkMessage {
    #[serde(rename = "_open")]
    Open { key: String, total: Number },
    #[serde(rename = "_chunk")]
    Chunk {
        key: String,
        index: Number,
        chunk: String,
    },
}

impl ChunkMessage {
    pub fn open(key: impl Into<String>, total: usize) -> Self {
        ChunkMessage::Open {
            key: key.into(),
            total: Number::from(total as u64),
        }
    }

    pub fn chunk(key: impl Into<String>, index: usize, chunk: impl Into<String>) -> Self {
        ChunkMessage::Chunk {
            key: key.into(),
            index: Number::from(index as u64),
            chunk: chunk.into(),
        }
    }

    pub fn key(&self) -> &str {
        match self {
            ChunkMessage::Open { key, .. } | ChunkMessage::Chunk { key, .. } => key,
        }
    }
}

/// Interpreta un número del protocolo como entero no negativo.
pub(crate) fn as_index(value: &Number) -> Option<usize> {
    value.as_u64().and_then(|v| usize::try_from(v).ok())
}
