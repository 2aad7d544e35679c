//! Inicialización del registro de eventos.

use tracing_subscriber::EnvFilter;

/// Instala el suscriptor global. Sin modo depuración solo se emiten errores;
/// `RUST_LOG` tiene prioridad sobre ambos niveles.
pub fn init(debug_mode: bool) {
    let default_level = if debug_mode { "debug" } else { "error" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}
