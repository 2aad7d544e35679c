use std::collections::HashSet;

use crate::config::Settings;
use crate::error::CleanError;
use crate::file_record::{FileRecord, extension_of};

const MIB: u64 = 1024 * 1024;

/// Reglas de admisión de archivos.
#[derive(Clone, Debug)]
pub struct ValidationRules {
    pub max_file_size: u64,
    pub supported_extensions: HashSet<String>,
}

impl From<&Settings> for ValidationRules {
    fn from(settings: &Settings) -> Self {
        Self {
            max_file_size: settings.max_file_size,
            supported_extensions: settings.supported_extensions.iter().cloned().collect(),
        }
    }
}

impl Default for ValidationRules {
    fn default() -> Self {
        Self::from(&Settings::default())
    }
}

/// Comprueba que el archivo pueda entrar al orquestador.
pub fn validate(file: Option<&FileRecord>, rules: &ValidationRules) -> Result<(), CleanError> {
    let Some(file) = file else {
        return Err(CleanError::Validation(
            "No se proporcionó ningún archivo".to_string(),
        ));
    };

    if file.name.trim().is_empty() {
        return Err(CleanError::Validation(
            "Nombre de archivo inválido".to_string(),
        ));
    }

    if file.name.contains("..") || file.name.contains('/') || file.name.contains('\\') {
        return Err(CleanError::Validation(
            "Nombre de archivo inválido: se detectó un recorrido de rutas".to_string(),
        ));
    }

    if file.size() > rules.max_file_size {
        return Err(CleanError::Validation(format!(
            "Archivo demasiado grande. El tamaño máximo es {} MB",
            rules.max_file_size / MIB
        )));
    }

    if file.size() == 0 {
        return Err(CleanError::Validation("El archivo está vacío".to_string()));
    }

    let supported = extension_of(&file.name)
        .is_some_and(|ext| rules.supported_extensions.contains(&ext));
    if !supported {
        return Err(CleanError::Validation(format!(
            "Formato de archivo no soportado: {}",
            file.name
        )));
    }

    Ok(())
}
