//! Transporte fragmentado para canales con tamaño de mensaje limitado y sin
//! garantía de orden: apertura con el total, fragmentos indexados y
//! confirmación por mensaje.

mod bus;
mod message;
mod receiver;
mod sender;


use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

pub use bus::{ChunkChannel, Envelope, MessageBus};
pub use message::ChunkMessage;
pub use receiver::{ChunkReceiver, PendingTransfer};
pub use sender::ChunkSender;

/// Tamaño máximo de un fragmento de texto serializado (5 MiB).
pub const CHUNK_SIZE: usize = 5 * 1024 * 1024;
/// Máximo de fragmentos aceptados por sesión.
pub const MAX_CHUNKS: usize = 1000;
pub const RECEIVE_TIMEOUT: Duration = Duration::from_secs(60);

/// Recibe `(recibidos, total)` cada vez que avanza una sesión.
pub type ProgressCallback = Arc<dyn Fn(usize, usize) + Send + Sync>;

/// Clave nueva y única para una sesión.
pub fn new_key() -> String {
    Uuid::new_v4().to_string()
}
