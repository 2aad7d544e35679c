use serde_json::{Number, Value};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::config::TransportSettings;
use crate::error::TransportError;
use crate::file_record::{WireFileRecord, validate_wire_records};

use super::bus::{Envelope, MessageBus};
use super::message::{ChunkMessage, as_index};
use super::{MAX_CHUNKS, ProgressCallback, RECEIVE_TIMEOUT};

/// Receptor de una única sesión identificada por su clave.
pub struct ChunkReceiver {
    key: String,
    bus: Arc<MessageBus>,
    timeout: Duration,
    max_chunks: usize,
    on_progress: Option<ProgressCallback>,
}

impl ChunkReceiver {
    pub fn new(key: impl Into<String>, bus: Arc<MessageBus>) -> Self {
        Self {
            key: key.into(),
            bus,
            timeout: RECEIVE_TIMEOUT,
            max_chunks: MAX_CHUNKS,
            on_progress: None,
        }
    }

    pub fn with_settings(mut self, settings: &TransportSettings) -> Self {
        self.timeout = settings.receive_timeout();
        self.max_chunks = settings.effective_max_chunks();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_progress(mut self, callback: impl Fn(usize, usize) + Send + Sync + 'static) -> Self {
        self.on_progress = Some(Arc::new(callback));
        self
    }

    /// Registra el oyente de inmediato y procesa la sesión en segundo plano.
    /// El plazo empieza a contar desde el registro.
    pub fn listen(self) -> Result<PendingTransfer, TransportError> {
        let mut session = Session::new(self.key.clone(), self.max_chunks, self.on_progress);
        let inbox = session.register(&self.bus)?;
        let (abort, abort_signal) = oneshot::channel();
        let deadline = Instant::now() + self.timeout;

        let handle = tokio::spawn(run_session(session, self.bus, inbox, deadline, abort_signal));

        Ok(PendingTransfer {
            key: self.key,
            handle,
            abort,
        })
    }
}

/// Resultado pendiente de una sesión en curso.
pub struct PendingTransfer {
    key: String,
    handle: JoinHandle<Result<Vec<WireFileRecord>, TransportError>>,
    abort: oneshot::Sender<()>,
}

impl PendingTransfer {
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Espera los archivos reensamblados o el error que cerró la sesión.
    pub async fn wait(self) -> Result<Vec<WireFileRecord>, TransportError> {
        let PendingTransfer { handle, abort, .. } = self;
        let result = handle.await;
        drop(abort);
        result.map_err(|e| TransportError::Channel(format!("la sesión terminó de forma inesperada: {e}")))?
    }

    /// Abandona la sesión y retira su oyente.
    pub async fn abort(self) {
        let PendingTransfer { key, handle, abort } = self;
        let _ = abort.send(());
        if handle.await.is_err() {
            warn!(key = %key, "la sesión abandonada no terminó limpiamente");
        }
    }
}

async fn run_session(
    mut session: Session,
    bus: Arc<MessageBus>,
    mut inbox: mpsc::UnboundedReceiver<Envelope>,
    deadline: Instant,
    mut abort_signal: oneshot::Receiver<()>,
) -> Result<Vec<WireFileRecord>, TransportError> {
    let expiry = tokio::time::sleep_until(deadline);
    tokio::pin!(expiry);

    loop {
        tokio::select! {
            envelope = inbox.recv() => {
                let Some(envelope) = envelope else {
                    session.close(&bus, SessionState::Aborted);
                    return Err(TransportError::Channel(format!("el bus de `{}` se cerró", session.key)));
                };

                let (message, ack) = envelope.into_parts();
                match session.handle(message) {
                    Step::Ack(accepted) => {
                        let _ = ack.send(accepted);
                    }
                    Step::Complete(text) => {
                        session.close(&bus, SessionState::Resolved);
                        let result = parse_payload(&text);
                        let _ = ack.send(true);
                        match &result {
                            Ok(records) => info!(key = %session.key, files = records.len(), "sesión completada"),
                            Err(e) => warn!(key = %session.key, error = %e, "carga reensamblada inválida"),
                        }
                        return result;
                    }
                }
            }
            _ = &mut expiry => {
                let (received, expected) = session.progress();
                session.close(&bus, SessionState::TimedOut);
                let expected = expected.map_or_else(|| "?".to_string(), |total| total.to_string());
                warn!(key = %session.key, received, expected = %expected, "tiempo agotado");
                return Err(TransportError::Timeout {
                    key: session.key.clone(),
                    received,
                    expected,
                });
            }
            _ = &mut abort_signal => {
                session.close(&bus, SessionState::Aborted);
                debug!(key = %session.key, "sesión abandonada");
                return Err(TransportError::Channel(format!("la sesión `{}` fue abandonada", session.key)));
            }
        }
    }
}

fn parse_payload(text: &str) -> Result<Vec<WireFileRecord>, TransportError> {
    let value: Value = serde_json::from_str(text)
        .map_err(|e| TransportError::Format(format!("JSON inválido: {e}")))?;
    validate_wire_records(value)
}

#[derive(Debug, PartialEq, Eq)]
enum SessionState {
    Unregistered,
    AwaitingOpen { early: BTreeMap<usize, String> },
    Accumulating { total: usize, fragments: BTreeMap<usize, String> },
    Resolved,
    TimedOut,
    Aborted,
}

#[derive(Debug, PartialEq, Eq)]
enum Step {
    Ack(bool),
    Complete(String),
}

struct Session {
    key: String,
    max_chunks: usize,
    state: SessionState,
    on_progress: Option<ProgressCallback>,
}

impl Session {
    fn new(key: String, max_chunks: usize, on_progress: Option<ProgressCallback>) -> Self {
        Self {
            key,
            max_chunks,
            state: SessionState::Unregistered,
            on_progress,
        }
    }

    fn register(&mut self, bus: &MessageBus) -> Result<mpsc::UnboundedReceiver<Envelope>, TransportError> {
        let inbox = bus.register(&self.key)?;
        self.state = SessionState::AwaitingOpen {
            early: BTreeMap::new(),
        };
        Ok(inbox)
    }

    fn is_listening(&self) -> bool {
        matches!(
            self.state,
            SessionState::AwaitingOpen { .. } | SessionState::Accumulating { .. }
        )
    }

    /// Pasa a un estado terminal. Solo la primera llamada retira el oyente.
    fn close(&mut self, bus: &MessageBus, terminal: SessionState) -> bool {
        if !self.is_listening() {
            return false;
        }
        self.state = terminal;
        bus.unregister(&self.key)
    }

    fn progress(&self) -> (usize, Option<usize>) {
        match &self.state {
            SessionState::AwaitingOpen { early } => (early.len(), None),
            SessionState::Accumulating { total, fragments } => (fragments.len(), Some(*total)),
            _ => (0, None),
        }
    }

    fn handle(&mut self, message: ChunkMessage) -> Step {
        if message.key() != self.key {
            return Step::Ack(false);
        }

        match message {
            ChunkMessage::Open { total, .. } => self.on_open(&total),
            ChunkMessage::Chunk { index, chunk, .. } => self.on_chunk(&index, chunk),
        }
    }

    fn on_open(&mut self, total: &Number) -> Step {
        let Some(total) = as_index(total).filter(|t| (1..=self.max_chunks).contains(t)) else {
            warn!(key = %self.key, total = %total, "total de fragmentos fuera de rango");
            return Step::Ack(false);
        };

        let early = match &mut self.state {
            SessionState::AwaitingOpen { early } => std::mem::take(early),
            SessionState::Accumulating { .. } => {
                debug!(key = %self.key, "apertura repetida ignorada");
                return Step::Ack(true);
            }
            _ => return Step::Ack(false),
        };

        let before = early.len();
        let fragments: BTreeMap<usize, String> =
            early.into_iter().filter(|(index, _)| *index < total).collect();
        if fragments.len() < before {
            warn!(key = %self.key, discarded = before - fragments.len(), "fragmentos anticipados fuera de rango");
        }

        let received = fragments.len();
        self.state = SessionState::Accumulating { total, fragments };
        if received > 0 {
            self.report(received, total);
        }
        self.try_complete()
    }

    fn on_chunk(&mut self, index: &Number, chunk: String) -> Step {
        let Some(index) = as_index(index) else {
            warn!(key = %self.key, index = %index, "índice de fragmento inválido");
            return Step::Ack(false);
        };

        let progress = match &mut self.state {
            SessionState::AwaitingOpen { early } => {
                if index >= self.max_chunks {
                    return Step::Ack(false);
                }
                early.entry(index).or_insert(chunk);
                None
            }
            SessionState::Accumulating { total, fragments } => {
                if index >= *total {
                    warn!(key = %self.key, index, total = *total, "índice fuera del total declarado");
                    return Step::Ack(false);
                }
                if fragments.contains_key(&index) {
                    debug!(key = %self.key, index, "fragmento duplicado");
                    None
                } else {
                    fragments.insert(index, chunk);
                    Some((fragments.len(), *total))
                }
            }
            _ => return Step::Ack(false),
        };

        if let Some((received, total)) = progress {
            self.report(received, total);
        }
        self.try_complete()
    }

    fn report(&self, received: usize, total: usize) {
        if let Some(callback) = &self.on_progress {
            callback(received, total);
        }
    }

    fn try_complete(&self) -> Step {
        if let SessionState::Accumulating { total, fragments } = &self.state
            && fragments.len() == *total
        {
            return Step::Complete(fragments.values().map(String::as_str).collect());
        }
        Step::Ack(true)
    }
}
