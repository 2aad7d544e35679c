use async_trait::async_trait;
use std::collections::BTreeSet;
use std::sync::Arc;

use crate::file_record::{FileRecord, extension_of};

/// Limpiador específico de un formato: recibe el archivo y devuelve su contenido sin metadata.
#[async_trait]
pub trait Capability: Send + Sync {
    fn name(&self) -> &str;
    async fn clean(&self, file: &FileRecord) -> anyhow::Result<Vec<u8>>;
}

#[derive(Clone)]
struct RegistryEntry {
    capability: Arc<dyn Capability>,
    extensions: BTreeSet<String>,
}

/// Lista ordenada de limpiadores. El orden es la prioridad: un archivo que
/// encaja con varias entradas lo procesa solo la primera.
#[derive(Clone, Default)]
pub struct Registry {
    entries: Vec<RegistryEntry>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Añade una entrada al final de la lista de prioridad.
    pub fn register(mut self, capability: Arc<dyn Capability>, extensions: &[&str]) -> Self {
        let extensions = extensions
            .iter()
            .map(|ext| ext.trim_start_matches('.').to_lowercase())
            .collect();
        self.entries.push(RegistryEntry {
            capability,
            extensions,
        });
        self
    }

    pub fn select(&self, filename: &str) -> Option<&Arc<dyn Capability>> {
        let ext = extension_of(filename)?;
        self.entries
            .iter()
            .find(|entry| entry.extensions.contains(&ext))
            .map(|entry| &entry.capability)
    }

    /// Nombres de los limpiadores en orden de prioridad.
    pub fn names(&self) -> Vec<&str> {
        self.entries
            .iter()
            .map(|entry| entry.capability.name())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
