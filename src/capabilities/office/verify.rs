use super::constants::{APP_PART, APP_RESETS, CORE_PART, CORE_RESETS, CUSTOM_PART};
use super::package::read_part;
use super::properties::{custom_properties_are_clean, properties_are_clean};

/// Comprueba que un paquete limpio no conserva metadata sensible. Las partes
/// ausentes cuentan como limpias.
pub fn verify_office_clean(bytes: &[u8]) -> anyhow::Result<bool> {
    if let Some(core) = read_part(bytes, CORE_PART)?
        && !properties_are_clean(&core, &CORE_RESETS)?
    {
        return Ok(false);
    }

    if let Some(app) = read_part(bytes, APP_PART)?
        && !properties_are_clean(&app, &APP_RESETS)?
    {
        return Ok(false);
    }

    match read_part(bytes, CUSTOM_PART)? {
        Some(custom) => custom_properties_are_clean(&custom),
        None => Ok(true),
    }
}
