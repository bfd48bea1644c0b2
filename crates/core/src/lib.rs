//! tsquery-core – Gemeinsame Typen, Ereignisse und Fehlertypen
//!
//! Dieses Crate stellt die Bausteine bereit, die Protokoll-Grammatik,
//! Dispatcher und Host-Binary gemeinsam nutzen.

pub mod error;
pub mod event;
pub mod types;

// Re-Exporte fuer bequemen Zugriff
pub use error::{QueryError, Result};
pub use event::{SocketFehlerArt, VerbindungsEreignis};
pub use types::{BanInfo, ProtokollVariante, SchandlerId, VerbindungsZustand};
