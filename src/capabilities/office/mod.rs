//! Limpieza de paquetes Office basados en ZIP (OOXML): restablece las
//! propiedades de `docProps` y conserva el resto del contenido intacto.

mod constants;
mod package;
mod properties;
mod verify;


use anyhow::{Context, bail};
use async_trait::async_trait;
use tracing::debug;

use crate::cleaner::Capability;
use crate::file_record::FileRecord;

use constants::{APP_PART, APP_RESETS, CORE_PART, CORE_RESETS, CUSTOM_PART};
use package::rewrite_package;
use properties::{empty_custom_properties, reset_properties};

pub use verify::verify_office_clean;

pub const OFFICE_EXTENSIONS: &[&str] = &[
    "docx", "dotx", "docm", "dotm", "xlsx", "xltx", "xlsm", "xltm", "xlsb", "pptx", "potx",
    "ppsx", "pptm", "potm", "ppsm", "ppam",
];

#[derive(Clone, Copy, Debug, Default)]
pub struct OfficeCapability;

#[async_trait]
impl Capability for OfficeCapability {
    fn name(&self) -> &str {
        "office"
    }

    async fn clean(&self, file: &FileRecord) -> anyhow::Result<Vec<u8>> {
        let bytes = file.bytes.clone();
        tokio::task::spawn_blocking(move || clean_office_package(&bytes))
            .await
            .context("La limpieza del documento terminó de forma inesperada")?
    }
}

/// Devuelve una copia del paquete sin metadata de autoría.
pub fn clean_office_package(bytes: &[u8]) -> anyhow::Result<Vec<u8>> {
    let (cleaned, rewritten) = rewrite_package(bytes, |name, contents| match name {
        CORE_PART => reset_properties(contents, &CORE_RESETS),
        APP_PART => reset_properties(contents, &APP_RESETS),
        CUSTOM_PART => Ok(empty_custom_properties(contents)),
        _ => Ok(None),
    })?;

    if !verify_office_clean(&cleaned)? {
        bail!("La verificación indicó que la metadata no se eliminó correctamente");
    }

    debug!(rewritten, "propiedades del documento restablecidas");
    Ok(cleaned)
}
