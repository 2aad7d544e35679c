use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::formatting::{format_optional_datetime, format_size};

use super::FileCategory;

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilesByType {
    pub images: u64,
    pub videos: u64,
    pub documents: u64,
    pub audio: u64,
}

/// Estadísticas acumuladas de limpieza.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CleaningStats {
    pub total_files_cleaned: u64,
    pub files_by_type: FilesByType,
    pub storage_saved: u64,
    pub sites_cleaned_on: BTreeMap<String, u64>,
    pub last_cleaned: Option<DateTime<Utc>>,
}

impl CleaningStats {
    /// Registra un lote de `count` archivos procesados.
    pub fn record_batch(&mut self, count: usize, site: Option<&str>, storage_saved: u64) {
        self.total_files_cleaned += count as u64;
        self.storage_saved += storage_saved;
        self.last_cleaned = Some(Utc::now());

        if let Some(site) = site.filter(|site| !site.is_empty()) {
            *self.sites_cleaned_on.entry(site.to_string()).or_insert(0) += 1;
        }
    }

    /// Cuenta un archivo en su categoría; `Other` se agrupa con los documentos.
    pub fn record_file(&mut self, category: FileCategory) {
        let counter = match category {
            FileCategory::Image => &mut self.files_by_type.images,
            FileCategory::Video => &mut self.files_by_type.videos,
            FileCategory::Audio => &mut self.files_by_type.audio,
            FileCategory::Document | FileCategory::Other => &mut self.files_by_type.documents,
        };
        *counter += 1;
    }

    /// Resumen legible de las estadísticas.
    pub fn summary_lines(&self) -> Vec<String> {
        let mut lines = vec![
            format!("Archivos limpiados: {}", self.total_files_cleaned),
            format!(
                "Por tipo: {} imágenes, {} videos, {} documentos, {} audio",
                self.files_by_type.images,
                self.files_by_type.videos,
                self.files_by_type.documents,
                self.files_by_type.audio
            ),
            format!("Espacio ahorrado: {}", format_size(self.storage_saved)),
            format!(
                "Última limpieza: {}",
                format_optional_datetime(self.last_cleaned)
            ),
        ];

        for (site, count) in &self.sites_cleaned_on {
            lines.push(format!("  {site}: {count}"));
        }
        lines
    }
}
