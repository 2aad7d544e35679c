//! Pasarela entre el transporte fragmentado y el orquestador: recibe una
//! selección de archivos, la limpia y devuelve la respuesta por otra clave.

use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

use crate::cleaner::{
    CleaningStats, Cleaner, CleanupEvent, Delivery, FallbackPolicy, Notifier, Target,
    TracingNotifier,
};
use crate::config::{Settings, TransportSettings};
use crate::error::{GatewayError, TransportError};
use crate::file_record::{FileRecord, WireFileRecord, compose, multi_compose, multi_restore};
use crate::transport::{ChunkReceiver, ChunkSender, MessageBus, PendingTransfer, new_key};

/// Resumen de una selección atendida.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ServeReport {
    pub cleaned: usize,
    /// Archivos que se devolvieron sin limpiar.
    pub originals: usize,
    pub storage_saved: u64,
}

pub struct Gateway {
    settings: Settings,
    bus: Arc<MessageBus>,
    cleaner: Cleaner,
    notifier: Arc<dyn Notifier>,
    stats: Mutex<CleaningStats>,
}

impl Gateway {
    pub fn new(
        settings: Settings,
        bus: Arc<MessageBus>,
        cleaner: Cleaner,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            settings,
            bus,
            cleaner,
            notifier,
            stats: Mutex::new(CleaningStats::default()),
        }
    }

    pub fn from_settings(settings: Settings, bus: Arc<MessageBus>) -> Self {
        let cleaner = Cleaner::from_settings(&settings);
        Self::new(settings, bus, cleaner, Arc::new(TracingNotifier))
    }

    pub fn bus(&self) -> &Arc<MessageBus> {
        &self.bus
    }

    pub fn cleaner(&self) -> &Cleaner {
        &self.cleaner
    }

    pub fn stats(&self) -> CleaningStats {
        self.stats.lock().clone()
    }

    /// Registra un receptor para una clave nueva. La clave se comunica al emisor
    /// con `PendingTransfer::key`.
    pub fn open_inbound(&self) -> Result<PendingTransfer, TransportError> {
        ChunkReceiver::new(new_key(), Arc::clone(&self.bus))
            .with_settings(&self.settings.transport)
            .listen()
    }

    pub async fn serve(
        &self,
        target: Target,
        inbound: PendingTransfer,
        reply: ReplyPort,
    ) -> Result<ServeReport, GatewayError> {
        self.serve_for_site(target, None, inbound, reply).await
    }

    /// Espera la selección, la limpia y envía la respuesta por `reply`.
    /// Con la política `Block`, un solo fallo vacía la respuesta y devuelve
    /// `GatewayError::Blocked`.
    pub async fn serve_for_site(
        &self,
        target: Target,
        site: Option<&str>,
        inbound: PendingTransfer,
        reply: ReplyPort,
    ) -> Result<ServeReport, GatewayError> {
        let key = inbound.key().to_string();
        let files = multi_restore(&inbound.wait().await?)?;
        info!(key = %key, files = files.len(), "selección recibida");

        let outcome = self
            .cleaner
            .process_batch(&files, target, self.settings.effective_concurrency())
            .await;
        let storage_saved = outcome.storage_saved;
        let failed = outcome.failed_count();

        let policy = FallbackPolicy::from(&self.settings);
        let mut deliveries: Vec<Option<Delivery>> = vec![None; files.len()];
        for (index, result) in outcome.results {
            deliveries[index] = Some(policy.decide(Ok(result)));
        }
        for (index, error) in outcome.failures {
            deliveries[index] = Some(policy.decide(Err(error)));
        }

        if deliveries.iter().flatten().any(Delivery::is_blocked) {
            warn!(key = %key, failed, "selección bloqueada por fallos de limpieza");
            self.reply(reply, &[]).await?;
            self.finish(target, 0, failed);
            return Err(GatewayError::Blocked { failures: failed });
        }

        let mut report = ServeReport {
            storage_saved,
            ..ServeReport::default()
        };
        let mut stats = CleaningStats::default();
        let records: Vec<WireFileRecord> = files
            .iter()
            .zip(&deliveries)
            .map(|(file, delivery)| match delivery {
                Some(Delivery::Cleaned(result)) => {
                    report.cleaned += 1;
                    stats.record_file(result.category);
                    compose(file, Some(&result.data))
                }
                _ => {
                    report.originals += 1;
                    compose(file, None)
                }
            })
            .collect();

        self.reply(reply, &records).await?;
        self.record(stats, report.cleaned, site, storage_saved);
        self.finish(target, report.cleaned, failed);
        Ok(report)
    }

    /// Anuncia la respuesta y la envía una vez que el cliente escucha su clave.
    async fn reply(&self, reply: ReplyPort, records: &[WireFileRecord]) -> Result<(), TransportError> {
        let sender = ChunkSender::with_settings(new_key(), records, &self.settings.transport)?;
        reply.announce(sender.key()).await?;
        sender.send(self.bus.as_ref()).await
    }

    fn record(&self, batch: CleaningStats, cleaned: usize, site: Option<&str>, saved: u64) {
        let mut stats = self.stats.lock();
        stats.record_batch(cleaned, site, saved);
        stats.files_by_type.images += batch.files_by_type.images;
        stats.files_by_type.videos += batch.files_by_type.videos;
        stats.files_by_type.documents += batch.files_by_type.documents;
        stats.files_by_type.audio += batch.files_by_type.audio;
    }

    fn finish(&self, target: Target, cleaned: usize, failed: usize) {
        if let Target::Context(context) = target {
            self.notifier
                .notify(context, CleanupEvent::Finished { cleaned, failed });
        }
    }
}

struct ReplyOffer {
    key: String,
    ready: oneshot::Sender<bool>,
}

/// Extremo de la pasarela para devolver la respuesta de una selección.
pub struct ReplyPort {
    offers: oneshot::Sender<ReplyOffer>,
}

/// Extremo del cliente. La sesión de recepción, y con ella su plazo, solo
/// empieza cuando la pasarela anuncia que la respuesta está lista.
pub struct ReplyListener {
    bus: Arc<MessageBus>,
    transport: TransportSettings,
    offers: oneshot::Receiver<ReplyOffer>,
}

/// Crea los dos extremos de una respuesta sobre `bus`.
pub fn reply_channel(bus: Arc<MessageBus>, transport: &TransportSettings) -> (ReplyPort, ReplyListener) {
    let (offers, incoming) = oneshot::channel();
    (
        ReplyPort { offers },
        ReplyListener {
            bus,
            transport: transport.clone(),
            offers: incoming,
        },
    )
}

impl ReplyPort {
    /// Comunica la clave de la respuesta y espera a que el cliente la escuche.
    async fn announce(self, key: &str) -> Result<(), TransportError> {
        let (ready, confirmation) = oneshot::channel();
        self.offers
            .send(ReplyOffer {
                key: key.to_string(),
                ready,
            })
            .map_err(|_| TransportError::Channel("el cliente abandonó la respuesta".to_string()))?;

        match confirmation.await {
            Ok(true) => Ok(()),
            _ => Err(TransportError::NoListener(key.to_string())),
        }
    }
}

impl ReplyListener {
    /// Espera el anuncio, abre la sesión para la clave ofrecida y devuelve los
    /// archivos recibidos.
    pub async fn wait(self) -> Result<Vec<WireFileRecord>, TransportError> {
        let offer = self.offers.await.map_err(|_| {
            TransportError::Channel("la pasarela terminó sin enviar respuesta".to_string())
        })?;

        let listening = ChunkReceiver::new(offer.key.clone(), self.bus)
            .with_settings(&self.transport)
            .listen();
        match listening {
            Ok(pending) => {
                debug!(key = %offer.key, "escuchando la respuesta");
                let _ = offer.ready.send(true);
                pending.wait().await
            }
            Err(e) => {
                let _ = offer.ready.send(false);
                Err(e)
            }
        }
    }
}

/// Envía `files` al receptor `inbound_key` y prepara los extremos de la
/// respuesta. Es el lado cliente de `Gateway::serve`.
pub async fn exchange(
    bus: &Arc<MessageBus>,
    inbound_key: &str,
    files: &[FileRecord],
    settings: &Settings,
) -> Result<(ReplyPort, ReplyListener), TransportError> {
    ChunkSender::with_settings(inbound_key, &multi_compose(files), &settings.transport)?
        .send(bus.as_ref())
        .await?;
    Ok(reply_channel(Arc::clone(bus), &settings.transport))
}
