use anyhow::{Context, bail};
use clap::Parser;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use walkdir::WalkDir;

use scrubgate::cleaner::Target;
use scrubgate::config::Settings;
use scrubgate::file_record::{FileRecord, multi_restore};
use scrubgate::formatting::format_size;
use scrubgate::gateway::{Gateway, exchange};
use scrubgate::logging;
use scrubgate::naming::{sanitize_filename, unique_filename};
use scrubgate::transport::MessageBus;

#[derive(Parser, Debug)]
#[clap(name = "scrubgate")]
#[clap(about = "Elimina la metadata de archivos antes de compartirlos", long_about = None)]
struct Cli {
    /// Archivos o directorios a limpiar.
    #[clap(required = true)]
    paths: Vec<PathBuf>,

    /// Directorio donde se escriben los archivos limpios.
    #[clap(short, long, default_value = "cleaned")]
    output: PathBuf,

    /// Configuración TOML.
    #[clap(short, long)]
    config: Option<PathBuf>,

    #[clap(long)]
    concurrency: Option<usize>,

    /// Aborta todo el lote si algún archivo no se puede limpiar.
    #[clap(long)]
    block_on_error: bool,

    #[clap(long)]
    debug: bool,

    /// Recorre los subdirectorios.
    #[clap(short, long)]
    recursive: bool,

    /// Persiste la caché de resultados en este directorio.
    #[clap(long)]
    cache_dir: Option<PathBuf>,
}

impl Cli {
    fn settings(&self) -> anyhow::Result<Settings> {
        let mut settings = match &self.config {
            Some(path) => Settings::load(path)
                .with_context(|| format!("No se pudo cargar `{}`", path.display()))?,
            None => Settings::default(),
        };

        if let Some(concurrency) = self.concurrency {
            settings.concurrency = concurrency.max(1);
        }
        settings.block_on_error |= self.block_on_error;
        settings.debug_mode |= self.debug;
        if let Some(dir) = &self.cache_dir {
            settings.cache.directory = Some(dir.clone());
        }
        Ok(settings)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let settings = cli.settings()?;
    logging::init(settings.debug_mode);

    let paths = collect_files(&cli.paths, cli.recursive)?;
    if paths.is_empty() {
        bail!("No se encontraron archivos para limpiar");
    }

    let mut files = Vec::with_capacity(paths.len());
    for path in &paths {
        let file = FileRecord::from_path(path)
            .await
            .with_context(|| format!("No se pudo leer `{}`", path.display()))?;
        files.push(file);
    }

    let bus = Arc::new(MessageBus::new());
    let gateway = Gateway::from_settings(settings.clone(), Arc::clone(&bus));

    let inbound = gateway.open_inbound()?;
    let inbound_key = inbound.key().to_string();
    let (port, listener) = exchange(&bus, &inbound_key, &files, &settings).await?;

    let (report, returned) = tokio::join!(
        gateway.serve(Target::Detached, inbound, port),
        listener.wait()
    );
    let report = report?;
    let returned = multi_restore(&returned?)?;

    tokio::fs::create_dir_all(&cli.output)
        .await
        .with_context(|| format!("No se pudo crear `{}`", cli.output.display()))?;

    let mut used = HashSet::new();
    for file in &returned {
        let name = unique_filename(&mut used, &sanitize_filename(&file.name));
        let destination = cli.output.join(&name);
        tokio::fs::write(&destination, &file.bytes)
            .await
            .with_context(|| format!("No se pudo escribir `{}`", destination.display()))?;
    }

    println!("Archivos limpiados: {}", report.cleaned);
    if report.originals > 0 {
        println!("Copiados sin limpiar: {}", report.originals);
    }
    println!("Espacio ahorrado: {}", format_size(report.storage_saved));
    println!("Destino: {}", cli.output.display());

    if settings.debug_mode {
        for line in gateway.stats().summary_lines() {
            println!("{line}");
        }
    }

    Ok(())
}

fn collect_files(paths: &[PathBuf], recursive: bool) -> anyhow::Result<Vec<PathBuf>> {
    let mut files = Vec::new();

    for path in paths {
        if path.is_file() {
            files.push(path.clone());
        } else if path.is_dir() {
            files.extend(walk_directory(path, recursive));
        } else {
            bail!("No se encontró `{}`", path.display());
        }
    }

    Ok(files)
}

fn walk_directory(dir: &Path, recursive: bool) -> impl Iterator<Item = PathBuf> {
    let depth = if recursive { usize::MAX } else { 1 };
    WalkDir::new(dir)
        .max_depth(depth)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
}
