use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{error, info};

/// Contexto que originó una operación. `Detached` no tiene a quién avisar.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Target {
    Detached,
    Context(u64),
}

/// Eventos que se envían al contexto de origen.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum CleanupEvent {
    Error { message: String },
    Finished { cleaned: usize, failed: usize },
}

pub trait Notifier: Send + Sync {
    fn notify(&self, context: u64, event: CleanupEvent);
}

/// Deja constancia de los eventos en el registro.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, context: u64, event: CleanupEvent) {
        match event {
            CleanupEvent::Error { message } => error!(context, %message, "error de limpieza"),
            CleanupEvent::Finished { cleaned, failed } => {
                info!(context, cleaned, failed, "limpieza terminada")
            }
        }
    }
}

/// Reenvía los eventos por un canal para que otro componente los consuma.
#[derive(Clone, Debug)]
pub struct ChannelNotifier {
    sender: mpsc::UnboundedSender<(u64, CleanupEvent)>,
}

impl ChannelNotifier {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<(u64, CleanupEvent)>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }
}

impl Notifier for ChannelNotifier {
    fn notify(&self, context: u64, event: CleanupEvent) {
        let _ = self.sender.send((context, event));
    }
}
