//! Motor de scrubgate: transporte fragmentado, caché por huella y
//! orquestación de limpiadores de metadata.

pub mod cache;
pub mod capabilities;
pub mod cleaner;
pub mod config;
pub mod error;
pub mod file_record;
pub mod formatting;
pub mod gateway;
pub mod logging;
pub mod naming;
pub mod transport;

pub use cleaner::{Cleaner, CleaningResult, FallbackPolicy, Target};
pub use config::Settings;
pub use error::{CleanError, GatewayError, TransportError};
pub use file_record::FileRecord;
pub use gateway::Gateway;
