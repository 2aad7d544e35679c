use serde::{Deserialize, Serialize};

use crate::config::Settings;
use crate::error::CleanError;

use super::CleaningResult;

/// Qué hacer con un archivo cuya limpieza falló.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum FallbackPolicy {
    /// Bloquear la operación completa.
    Block,
    /// Seguir adelante con el archivo original sin modificar.
    #[default]
    ProceedWithOriginal,
}

impl FallbackPolicy {
    pub fn from_block_on_error(block_on_error: bool) -> Self {
        if block_on_error {
            FallbackPolicy::Block
        } else {
            FallbackPolicy::ProceedWithOriginal
        }
    }

    pub fn decide(self, outcome: Result<CleaningResult, CleanError>) -> Delivery {
        match (outcome, self) {
            (Ok(result), _) => Delivery::Cleaned(result),
            (Err(reason), FallbackPolicy::Block) => Delivery::Blocked { reason },
            (Err(reason), FallbackPolicy::ProceedWithOriginal) => Delivery::Original { reason },
        }
    }
}

impl From<&Settings> for FallbackPolicy {
    fn from(settings: &Settings) -> Self {
        Self::from_block_on_error(settings.block_on_error)
    }
}

/// Acción resultante para un archivo.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Delivery {
    Cleaned(CleaningResult),
    Original { reason: CleanError },
    Blocked { reason: CleanError },
}

impl Delivery {
    pub fn is_blocked(&self) -> bool {
        matches!(self, Delivery::Blocked { .. })
    }
}
