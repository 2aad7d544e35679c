//! Limpiadores incluidos por defecto.

mod image;
mod office;

use std::sync::Arc;

use crate::cleaner::Registry;

pub use image::{IMAGE_EXTENSIONS, ImageCapability, clean_image, verify_image_clean};
pub use office::{OFFICE_EXTENSIONS, OfficeCapability, clean_office_package, verify_office_clean};

/// Registro con las imágenes primero y los documentos Office después.
pub fn default_registry() -> Registry {
    Registry::new()
        .register(Arc::new(ImageCapability), IMAGE_EXTENSIONS)
        .register(Arc::new(OfficeCapability), OFFICE_EXTENSIONS)
}
