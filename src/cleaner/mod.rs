//! Orquestador de limpieza: valida, consulta la caché, despacha al primer
//! limpiador que corresponda y procesa lotes en ventanas de concurrencia fija.

mod category;
mod notify;
mod policy;
mod registry;
mod stats;
mod validation;

#[cfg(test)]
mod tests;

use futures::future::join_all;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info};

use crate::cache::FingerprintCache;
use crate::capabilities::default_registry;
use crate::config::Settings;
use crate::error::CleanError;
use crate::file_record::FileRecord;

pub use category::{FileCategory, classify};
pub use notify::{ChannelNotifier, CleanupEvent, Notifier, Target, TracingNotifier};
pub use policy::{Delivery, FallbackPolicy};
pub use registry::{Capability, Registry};
pub use stats::{CleaningStats, FilesByType};
pub use validation::{ValidationRules, validate};

/// Resultado de limpiar un archivo.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CleaningResult {
    pub data: Vec<u8>,
    pub category: FileCategory,
    pub original_size: u64,
    pub cleaned_size: u64,
    pub storage_saved: u64,
    pub from_cache: bool,
}

/// Resultado de un lote. Los índices apuntan a la lista de entrada.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BatchOutcome {
    pub results: Vec<(usize, CleaningResult)>,
    pub failures: Vec<(usize, CleanError)>,
    pub storage_saved: u64,
}

impl BatchOutcome {
    pub fn cleaned_count(&self) -> usize {
        self.results.len()
    }

    pub fn failed_count(&self) -> usize {
        self.failures.len()
    }
}

pub struct Cleaner {
    registry: Registry,
    cache: Arc<FingerprintCache>,
    notifier: Arc<dyn Notifier>,
    rules: ValidationRules,
}

impl Cleaner {
    pub fn new(
        registry: Registry,
        cache: Arc<FingerprintCache>,
        notifier: Arc<dyn Notifier>,
        rules: ValidationRules,
    ) -> Self {
        Self {
            registry,
            cache,
            notifier,
            rules,
        }
    }

    /// Limpiadores integrados, caché según la configuración y avisos al registro.
    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(
            default_registry(),
            Arc::new(FingerprintCache::from_settings(&settings.cache)),
            Arc::new(TracingNotifier),
            ValidationRules::from(settings),
        )
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn cache(&self) -> &FingerprintCache {
        &self.cache
    }

    pub async fn clean(&self, target: Target, file: &FileRecord) -> Result<CleaningResult, CleanError> {
        self.clean_with_progress(target, file, |_| {}).await
    }

    /// Como `clean`, informando 10, 90 y 100 por ciento alrededor del limpiador.
    pub async fn clean_with_progress(
        &self,
        target: Target,
        file: &FileRecord,
        on_progress: impl Fn(u8),
    ) -> Result<CleaningResult, CleanError> {
        debug!(file = %file.name, size = file.size(), "procesando archivo");

        if let Err(e) = validate(Some(file), &self.rules) {
            return Err(self.report(target, &file.name, e));
        }

        let category = classify(&file.name);

        if let Some(cached) = self.cache.get(file).await {
            debug!(file = %file.name, "resultado tomado de la caché");
            return Ok(CleaningResult {
                category,
                original_size: file.size(),
                cleaned_size: cached.len() as u64,
                storage_saved: 0,
                from_cache: true,
                data: cached,
            });
        }

        let Some(capability) = self.registry.select(&file.name) else {
            let e = CleanError::NoCleaner(file.name.clone());
            return Err(self.report(target, &file.name, e));
        };

        let started = Instant::now();
        on_progress(10);
        let cleaned = match capability.clean(file).await {
            Ok(bytes) if bytes.is_empty() => Err(CleanError::CleaningFailed(
                "El limpiador devolvió un resultado vacío".to_string(),
            )),
            Ok(bytes) => Ok(bytes),
            Err(e) => Err(CleanError::CleaningFailed(format!("{e:#}"))),
        };
        let cleaned = match cleaned {
            Ok(bytes) => bytes,
            Err(e) => return Err(self.report(target, &file.name, e)),
        };
        on_progress(90);

        let original_size = file.size();
        let cleaned_size = cleaned.len() as u64;
        info!(
            file = %file.name,
            capability = capability.name(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "archivo limpiado"
        );

        self.cache.set(file, &cleaned).await;
        on_progress(100);

        Ok(CleaningResult {
            data: cleaned,
            category,
            original_size,
            cleaned_size,
            storage_saved: original_size.saturating_sub(cleaned_size),
            from_cache: false,
        })
    }

    /// Limpia y aplica la política de respaldo para decidir qué se entrega.
    pub async fn clean_for_upload(
        &self,
        target: Target,
        file: &FileRecord,
        policy: FallbackPolicy,
    ) -> Delivery {
        policy.decide(self.clean(target, file).await)
    }

    /// Procesa el lote en ventanas consecutivas de `concurrency` archivos. Cada
    /// ventana se espera completa antes de iniciar la siguiente; los fallos no
    /// interrumpen al resto.
    pub async fn process_batch(
        &self,
        files: &[FileRecord],
        target: Target,
        concurrency: usize,
    ) -> BatchOutcome {
        let width = concurrency.max(1);
        let mut outcome = BatchOutcome::default();

        for (window_index, window) in files.chunks(width).enumerate() {
            let settled = join_all(window.iter().map(|file| self.clean(target, file))).await;

            for (offset, result) in settled.into_iter().enumerate() {
                let index = window_index * width + offset;
                match result {
                    Ok(result) => {
                        outcome.storage_saved += result.storage_saved;
                        outcome.results.push((index, result));
                    }
                    Err(e) => outcome.failures.push((index, e)),
                }
            }
        }

        info!(
            total = files.len(),
            cleaned = outcome.cleaned_count(),
            failed = outcome.failed_count(),
            storage_saved = outcome.storage_saved,
            "lote procesado"
        );
        outcome
    }

    fn report(&self, target: Target, file: &str, e: CleanError) -> CleanError {
        error!(file, error = %e, "limpieza fallida");
        if let Target::Context(context) = target {
            self.notifier.notify(
                context,
                CleanupEvent::Error {
                    message: e.reason(),
                },
            );
        }
        e
    }
}
