use futures::stream::{FuturesUnordered, StreamExt};
use serde::Serialize;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::{debug, info};

use crate::config::TransportSettings;
use crate::error::TransportError;

use super::bus::ChunkChannel;
use super::message::ChunkMessage;
use super::{CHUNK_SIZE, MAX_CHUNKS, ProgressCallback};

/// Emisor de una carga serializada dividida en fragmentos indexados.
pub struct ChunkSender {
    key: String,
    fragments: Vec<String>,
    on_progress: Option<ProgressCallback>,
}

impl ChunkSender {
    pub fn new<T: Serialize + ?Sized>(
        key: impl Into<String>,
        payload: &T,
    ) -> Result<Self, TransportError> {
        Self::with_limits(key, payload, CHUNK_SIZE, MAX_CHUNKS)
    }

    pub fn with_settings<T: Serialize + ?Sized>(
        key: impl Into<String>,
        payload: &T,
        settings: &TransportSettings,
    ) -> Result<Self, TransportError> {
        Self::with_limits(
            key,
            payload,
            settings.chunk_size,
            settings.effective_max_chunks(),
        )
    }

    /// Serializa `payload` y lo divide en fragmentos de como máximo `chunk_size` bytes.
    pub fn with_limits<T: Serialize + ?Sized>(
        key: impl Into<String>,
        payload: &T,
        chunk_size: usize,
        max_chunks: usize,
    ) -> Result<Self, TransportError> {
        let text = serde_json::to_string(payload)?;
        let fragments = split_fragments(&text, chunk_size);
        if fragments.len() > max_chunks {
            return Err(TransportError::TooLarge {
                fragments: fragments.len(),
                max: max_chunks,
            });
        }

        Ok(Self {
            key: key.into(),
            fragments,
            on_progress: None,
        })
    }

    pub fn with_progress(mut self, callback: impl Fn(usize, usize) + Send + Sync + 'static) -> Self {
        self.on_progress = Some(Arc::new(callback));
        self
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn total(&self) -> usize {
        self.fragments.len()
    }

    pub fn fragments(&self) -> &[String] {
        &self.fragments
    }

    /// Abre la sesión y envía todos los fragmentos a la vez; termina cuando
    /// todos fueron confirmados o con el primer fallo.
    pub async fn send<C: ChunkChannel + ?Sized>(&self, channel: &C) -> Result<(), TransportError> {
        let total = self.total();
        debug!(key = %self.key, total, "abriendo sesión fragmentada");

        let opened = channel.deliver(ChunkMessage::open(&self.key, total)).await?;
        if !opened {
            return Err(TransportError::Rejected {
                key: self.key.clone(),
                what: format!("la apertura de {total} fragmento(s)"),
            });
        }

        let acknowledged = AtomicUsize::new(0);
        let mut pending: FuturesUnordered<_> = self
            .fragments
            .iter()
            .enumerate()
            .map(|(index, fragment)| {
                let acknowledged = &acknowledged;
                async move {
                    let accepted = channel
                        .deliver(ChunkMessage::chunk(&self.key, index, fragment.as_str()))
                        .await?;
                    if !accepted {
                        return Err(TransportError::Rejected {
                            key: self.key.clone(),
                            what: format!("el fragmento {index}"),
                        });
                    }

                    let done = acknowledged.fetch_add(1, Ordering::SeqCst) + 1;
                    if let Some(callback) = &self.on_progress {
                        callback(done, total);
                    }
                    Ok::<(), TransportError>(())
                }
            })
            .collect();

        while let Some(result) = pending.next().await {
            result?;
        }

        info!(key = %self.key, total, "envío fragmentado completado");
        Ok(())
    }
}

/// Divide el texto respetando los límites de carácter UTF-8. Una carga vacía
/// produce un único fragmento vacío para que el total nunca sea cero.
pub(crate) fn split_fragments(text: &str, chunk_size: usize) -> Vec<String> {
    let chunk_size = chunk_size.max(1);
    let mut fragments = Vec::new();
    let mut start = 0;

    while start < text.len() {
        let mut end = (start + chunk_size).min(text.len());
        while !text.is_char_boundary(end) {
            end -= 1;
        }
        if end == start {
            end = start + text[start..].chars().next().map_or(1, char::len_utf8);
        }
        fragments.push(text[start..end].to_string());
        start = end;
    }

    if fragments.is_empty() {
        fragments.push(String::new());
    }

    fragments
}
