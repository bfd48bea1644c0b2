//! Fehlertypen fuer tsquery
//!
//! Zentraler Fehler-Enum fuer Verbindungsaufbau, Handshake, Dispatch und
//! Grammatik. Transportfehler tragen den OS-Fehlercode mit.

use thiserror::Error;

use crate::types::BanInfo;

/// Globaler Result-Alias fuer tsquery
pub type Result<T> = std::result::Result<T, QueryError>;

/// Alle moeglichen Fehler einer Query-Verbindung
#[derive(Debug, Error)]
pub enum QueryError {
    // --- Verbindungsaufbau ---
    #[error("Host '{host}' konnte nicht aufgeloest werden: {grund}")]
    Aufloesung { host: String, grund: String },

    #[error("Keine IPv4-Adresse fuer Host '{0}' gefunden")]
    KeineIpv4Adresse(String),

    #[error("Begruessung fehlgeschlagen: {0}")]
    BegruessungFehlgeschlagen(String),

    // --- Transport ---
    #[error("Socket-Fehler (code={code:?}): {quelle}")]
    Socket {
        code: Option<i32>,
        #[source]
        quelle: std::io::Error,
    },

    #[error("Verbindung vom Server getrennt")]
    Getrennt,

    #[error("Nicht verbunden")]
    NichtVerbunden,

    #[error("Verbindung noch nicht bereit fuer Befehle")]
    NichtBereit,

    #[error("Zeitlimit ueberschritten: {0}")]
    Zeitlimit(String),

    // --- Protokoll ---
    #[error("Verbindung gebannt: {0}")]
    Gebannt(BanInfo),

    #[error("Befehl fehlgeschlagen (id={id}): {msg}")]
    Befehlsfehler { id: u32, msg: String },

    // --- Grammatik ---
    #[error("Ungueltiger Gruppenindex {index} (vorhanden: {anzahl})")]
    UngueltigerIndex { index: usize, anzahl: usize },

    #[error("Wert '{wert}' fuer '{name}' nicht konvertierbar")]
    Konvertierung { name: String, wert: String },
}

impl QueryError {
    /// Baut einen Socket-Fehler und uebernimmt den OS-Fehlercode
    pub fn socket(quelle: std::io::Error) -> Self {
        Self::Socket {
            code: quelle.raw_os_error(),
            quelle,
        }
    }

    /// Gibt true zurueck wenn ein erneuter Verbindungsversuch sinnvoll sein koennte
    pub fn ist_wiederholbar(&self) -> bool {
        matches!(
            self,
            Self::Zeitlimit(_) | Self::Socket { .. } | Self::Getrennt | Self::NichtVerbunden
        )
    }

    /// Gibt true zurueck wenn der Fehler die Verbindung beendet hat
    pub fn ist_verbindungsabbruch(&self) -> bool {
        matches!(
            self,
            Self::Socket { .. } | Self::Getrennt | Self::Gebannt(_) | Self::BegruessungFehlgeschlagen(_)
        )
    }

    /// Stabiler numerischer Fehler-Code fuer Logs und Metriken
    pub fn fehler_code(&self) -> u32 {
        match self {
            Self::Aufloesung { .. } => 1001,
            Self::KeineIpv4Adresse(_) => 1002,
            Self::BegruessungFehlgeschlagen(_) => 1003,
            Self::Socket { .. } => 2001,
            Self::Getrennt => 2002,
            Self::NichtVerbunden => 2003,
            Self::NichtBereit => 2004,
            Self::Zeitlimit(_) => 2005,
            Self::Gebannt(_) => 3001,
            Self::Befehlsfehler { .. } => 3002,
            Self::UngueltigerIndex { .. } => 4001,
            Self::Konvertierung { .. } => 4002,
        }
    }
}

impl From<std::io::Error> for QueryError {
    fn from(e: std::io::Error) -> Self {
        Self::socket(e)
    }
}
