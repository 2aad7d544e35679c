use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use tokio::sync::{mpsc, oneshot};
use tracing::debug;

use crate::error::TransportError;

use super::message::ChunkMessage;

/// Canal de mensajes con confirmación: cada entrega devuelve el `ack` del receptor.
#[async_trait]
pub trait ChunkChannel: Send + Sync {
    async fn deliver(&self, message: ChunkMessage) -> Result<bool, TransportError>;
}

/// Mensaje entregado a un oyente junto con su canal de confirmación.
pub struct Envelope {
    pub message: ChunkMessage,
    ack: oneshot::Sender<bool>,
}

impl Envelope {
    pub(crate) fn into_parts(self) -> (ChunkMessage, oneshot::Sender<bool>) {
        (self.message, self.ack)
    }
}

/// Bus en proceso que enruta cada mensaje al oyente registrado para su clave.
#[derive(Default)]
pub struct MessageBus {
    listeners: Mutex<HashMap<String, mpsc::UnboundedSender<Envelope>>>,
}

impl MessageBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_registered(&self, key: &str) -> bool {
        self.listeners.lock().contains_key(key)
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.lock().len()
    }

    pub(crate) fn register(
        &self,
        key: &str,
    ) -> Result<mpsc::UnboundedReceiver<Envelope>, TransportError> {
        let mut listeners = self.listeners.lock();
        if listeners.contains_key(key) {
            return Err(TransportError::AlreadyListening(key.to_string()));
        }

        let (sender, receiver) = mpsc::unbounded_channel();
        listeners.insert(key.to_string(), sender);
        debug!(key, "oyente registrado");
        Ok(receiver)
    }

    pub(crate) fn unregister(&self, key: &str) -> bool {
        let removed = self.listeners.lock().remove(key).is_some();
        if removed {
            debug!(key, "oyente retirado");
        }
        removed
    }
}

#[async_trait]
impl ChunkChannel for MessageBus {
    async fn deliver(&self, message: ChunkMessage) -> Result<bool, TransportError> {
        let key = message.key().to_string();
        let (ack, confirmation) = oneshot::channel();

        {
            let listeners = self.listeners.lock();
            let listener = listeners
                .get(&key)
                .ok_or_else(|| TransportError::NoListener(key.clone()))?;
            listener
                .send(Envelope { message, ack })
                .map_err(|_| TransportError::Channel(format!("el oyente de `{key}` ya no existe")))?;
        }

        confirmation.await.map_err(|_| {
            TransportError::Channel(format!("el oyente de `{key}` terminó sin confirmar"))
        })
    }
}
