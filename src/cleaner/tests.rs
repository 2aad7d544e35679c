use super::{
    Capability, ChannelNotifier, Cleaner, CleanupEvent, Delivery, FallbackPolicy, FileCategory,
    Registry, Target, ValidationRules,
};
use crate::cache::FingerprintCache;
use crate::config::CacheSettings;
use crate::error::CleanError;
use crate::file_record::FileRecord;
use anyhow::anyhow;
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc::UnboundedReceiver;

/// Devuelve siempre un único byte con su marca.
struct Tagging {
    name: &'static str,
    tag: u8,
    calls: AtomicUsize,
}

impl Tagging {
    fn new(name: &'static str, tag: u8) -> Arc<Self> {
        Arc::new(Self {
            name,
            tag,
            calls: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl Capability for Tagging {
    fn name(&self) -> &str {
        self.name
    }

    async fn clean(&self, _file: &FileRecord) -> anyhow::Result<Vec<u8>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(vec![self.tag])
    }
}

struct Failing;

#[async_trait]
impl Capability for Failing {
    fn name(&self) -> &str {
        "falla"
    }

    async fn clean(&self, _file: &FileRecord) -> anyhow::Result<Vec<u8>> {
        Err(anyhow!("decodificación imposible"))
    }
}

struct Empty;

#[async_trait]
impl Capability for Empty {
    fn name(&self) -> &str {
        "vacío"
    }

    async fn clean(&self, _file: &FileRecord) -> anyhow::Result<Vec<u8>> {
        Ok(Vec::new())
    }
}

/// Recorta cada archivo a cuatro bytes, falla con los nombres marcados y
/// registra cuántas limpiezas llegan a solaparse.
#[derive(Default)]
struct Windowed {
    active: AtomicUsize,
    peak: AtomicUsize,
}

#[async_trait]
impl Capability for Windowed {
    fn name(&self) -> &str {
        "ventana"
    }

    async fn clean(&self, file: &FileRecord) -> anyhow::Result<Vec<u8>> {
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        tokio::task::yield_now().await;
        self.active.fetch_sub(1, Ordering::SeqCst);

        if file.name.contains("roto") {
            return Err(anyhow!("contenido corrupto"));
        }
        Ok(file.bytes[..4].to_vec())
    }
}

fn cleaner_with(registry: Registry) -> (Cleaner, UnboundedReceiver<(u64, CleanupEvent)>) {
    let (notifier, events) = ChannelNotifier::new();
    let cleaner = Cleaner::new(
        registry,
        Arc::new(FingerprintCache::in_memory(&CacheSettings::default())),
        Arc::new(notifier),
        ValidationRules::default(),
    );
    (cleaner, events)
}

fn file(name: &str, bytes: &[u8]) -> FileRecord {
    FileRecord::new(name, "application/octet-stream", bytes.to_vec())
}

#[tokio::test]
async fn first_registered_capability_wins() -> Result<(), CleanError> {
    let first = Tagging::new("primero", 1);
    let second = Tagging::new("segundo", 2);
    let registry = Registry::new()
        .register(first.clone(), &["tiff"])
        .register(second.clone(), &[".TIFF", ".png"]);
    let (cleaner, _events) = cleaner_with(registry);

    for n in 0..5u8 {
        let result = cleaner
            .clean(Target::Detached, &file("escaneo.tiff", &[n, 9, 9]))
            .await?;
        assert_eq!(result.data, vec![1]);
    }
    assert_eq!(first.calls.load(Ordering::SeqCst), 5);
    assert_eq!(second.calls.load(Ordering::SeqCst), 0);

    let png = cleaner.clean(Target::Detached, &file("logo.PNG", b"png")).await?;
    assert_eq!(png.data, vec![2]);
    assert_eq!(cleaner.registry().names(), vec!["primero", "segundo"]);
    Ok(())
}

#[tokio::test]
async fn cleaning_result_reports_sizes() -> Result<(), CleanError> {
    let (cleaner, _events) = cleaner_with(Registry::new().register(Tagging::new("t", 7), &["jpg"]));
    let result = cleaner
        .clean(Target::Detached, &file("foto.jpg", &[0; 10]))
        .await?;

    assert_eq!(result.category, FileCategory::Image);
    assert_eq!(result.original_size, 10);
    assert_eq!(result.cleaned_size, 1);
    assert_eq!(result.storage_saved, 9);
    assert!(!result.from_cache);
    Ok(())
}

#[tokio::test]
async fn cache_hit_saves_nothing_and_skips_capability() -> Result<(), CleanError> {
    let capability = Tagging::new("t", 3);
    let (cleaner, _events) = cleaner_with(Registry::new().register(capability.clone(), &["png"]));
    let original = file("a.png", &[5; 32]);

    let first = cleaner.clean(Target::Detached, &original).await?;
    let second = cleaner.clean(Target::Detached, &original).await?;

    assert!(!first.from_cache);
    assert!(second.from_cache);
    assert_eq!(second.storage_saved, 0);
    assert_eq!(second.data, vec![3]);
    assert_eq!(second.original_size, 32);
    assert_eq!(second.cleaned_size, 1);
    assert_eq!(capability.calls.load(Ordering::SeqCst), 1);
    Ok(())
}

#[tokio::test]
async fn fallback_policy_decides_between_block_and_original() {
    let (cleaner, mut events) = cleaner_with(Registry::new().register(Arc::new(Failing), &["png"]));
    let upload = file("perfil.png", b"datos");

    let blocked = cleaner
        .clean_for_upload(Target::Context(4), &upload, FallbackPolicy::Block)
        .await;
    assert!(blocked.is_blocked());

    let proceeded = cleaner
        .clean_for_upload(
            Target::Context(4),
            &upload,
            FallbackPolicy::from_block_on_error(false),
        )
        .await;
    let Delivery::Original { reason } = proceeded else {
        panic!("se esperaba el archivo original, se obtuvo {proceeded:?}");
    };
    assert!(matches!(reason, CleanError::CleaningFailed(_)));

    for _ in 0..2 {
        let (context, event) = events.try_recv().expect("aviso de error");
        assert_eq!(context, 4);
        assert_eq!(
            event,
            CleanupEvent::Error {
                message: "decodificación imposible".to_string()
            }
        );
    }
    assert!(events.try_recv().is_err());
}

#[tokio::test]
async fn notifications_only_reach_real_targets() {
    let (cleaner, mut events) = cleaner_with(Registry::new().register(Tagging::new("t", 1), &["png"]));
    let bad = file("../salida.png", b"x");

    let detached = cleaner.clean(Target::Detached, &bad).await;
    assert!(matches!(detached, Err(CleanError::Validation(_))));
    assert!(events.try_recv().is_err());

    let attached = cleaner.clean(Target::Context(9), &bad).await;
    assert!(matches!(attached, Err(CleanError::Validation(_))));
    let (context, event) = events.try_recv().expect("aviso de error");
    assert_eq!(context, 9);
    assert_eq!(
        event,
        CleanupEvent::Error {
            message: "Nombre de archivo inválido: se detectó un recorrido de rutas".to_string()
        }
    );
}

#[tokio::test]
async fn supported_file_without_capability_is_no_cleaner() {
    let (cleaner, mut events) = cleaner_with(Registry::new().register(Tagging::new("t", 1), &["png"]));

    let result = cleaner.clean(Target::Context(2), &file("acta.pdf", b"%PDF")).await;
    assert_eq!(result, Err(CleanError::NoCleaner("acta.pdf".to_string())));

    let (_, event) = events.try_recv().expect("aviso de error");
    assert_eq!(
        event,
        CleanupEvent::Error {
            message: "No hay limpiador para el archivo: acta.pdf".to_string()
        }
    );
}

#[tokio::test]
async fn empty_output_is_a_failure() {
    let (cleaner, _events) = cleaner_with(Registry::new().register(Arc::new(Empty), &["gif"]));
    let result = cleaner.clean(Target::Detached, &file("a.gif", b"GIF89a")).await;
    assert!(matches!(result, Err(CleanError::CleaningFailed(_))));
}

#[tokio::test]
async fn progress_is_reported_around_the_capability() -> Result<(), CleanError> {
    let (cleaner, _events) = cleaner_with(Registry::new().register(Tagging::new("t", 1), &["bmp"]));
    let steps = Mutex::new(Vec::new());

    cleaner
        .clean_with_progress(Target::Detached, &file("a.bmp", b"BM.."), |percent| {
            steps.lock().expect("progreso").push(percent);
        })
        .await?;

    assert_eq!(*steps.lock().expect("progreso"), vec![10, 90, 100]);
    Ok(())
}

#[tokio::test]
async fn batch_isolates_failures_within_windows() {
    let capability = Arc::new(Windowed::default());
    let (cleaner, _events) = cleaner_with(Registry::new().register(capability.clone(), &["png"]));

    let files: Vec<FileRecord> = (0..7)
        .map(|n| {
            let name = if n == 3 {
                "f3_roto.png".to_string()
            } else {
                format!("f{n}.png")
            };
            FileRecord::new(name, "image/png", vec![n as u8; 10])
        })
        .collect();

    let outcome = cleaner.process_batch(&files, Target::Detached, 3).await;

    assert_eq!(outcome.cleaned_count(), 6);
    assert_eq!(outcome.failed_count(), 1);
    assert_eq!(outcome.failures[0].0, 3);
    assert_eq!(outcome.storage_saved, 6 * 6);

    let indices: Vec<usize> = outcome.results.iter().map(|(index, _)| *index).collect();
    assert_eq!(indices, vec![0, 1, 2, 4, 5, 6]);

    let peak = capability.peak.load(Ordering::SeqCst);
    assert!(peak > 1 && peak <= 3, "solapamiento inesperado: {peak}");
}

#[tokio::test]
async fn zero_concurrency_still_processes_sequentially() {
    let capability = Arc::new(Windowed::default());
    let (cleaner, _events) = cleaner_with(Registry::new().register(capability.clone(), &["png"]));
    let files: Vec<FileRecord> = (0..3)
        .map(|n| FileRecord::new(format!("g{n}.png"), "image/png", vec![n as u8; 8]))
        .collect();

    let outcome = cleaner.process_batch(&files, Target::Detached, 0).await;
    assert_eq!(outcome.cleaned_count(), 3);
    assert_eq!(capability.peak.load(Ordering::SeqCst), 1);
}
