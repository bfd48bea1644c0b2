//! Verbindungs-Ereignisse
//!
//! Alle Signale, die ein Dispatcher nach aussen meldet: Bereitschaft,
//! Schliessen, Socket-Fehler, Ban und rohe Benachrichtigungen. Die
//! Zustellung erfolgt ueber einen vom Aufrufer abonnierten Kanal, ohne
//! implizite Thread-Affinitaet.

use serde::{Deserialize, Serialize};

use crate::types::{BanInfo, ProtokollVariante, SchandlerId};

/// Art eines Socket-Fehlers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SocketFehlerArt {
    /// Gegenstelle hat geschlossen, Ban oder Reset
    Zurueckgesetzt,
    /// Sonstiger IO-Fehler
    Io,
}

/// Alle Ereignisse einer Query-Verbindung
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum VerbindungsEreignis {
    /// Handshake abgeschlossen, Befehle duerfen gesendet werden
    Bereit {
        variante: ProtokollVariante,
        schandler_id: Option<SchandlerId>,
    },
    /// Verbindung wurde geschlossen (lokal oder durch die Gegenstelle)
    Geschlossen,
    /// Transportfehler, die Verbindung ist getrennt
    SocketFehler {
        art: SocketFehlerArt,
        code: Option<i32>,
        beschreibung: String,
    },
    /// Ban-Statuszeile erkannt, die Verbindung ist getrennt
    Gebannt(BanInfo),
    /// Roher Text einer Benachrichtigung (`notify...`)
    Benachrichtigung(String),
}

impl VerbindungsEreignis {
    /// Gibt den Ereignis-Namen zurueck (fuer Logs)
    pub fn name(&self) -> &'static str {
        match self {
            Self::Bereit { .. } => "bereit",
            Self::Geschlossen => "geschlossen",
            Self::SocketFehler { .. } => "socket_fehler",
            Self::Gebannt(_) => "gebannt",
            Self::Benachrichtigung(_) => "benachrichtigung",
        }
    }

    /// Baut ein Reset-Ereignis (Peer geschlossen oder Ban)
    pub fn zurueckgesetzt(beschreibung: impl Into<String>) -> Self {
        Self::SocketFehler {
            art: SocketFehlerArt::Zurueckgesetzt,
            code: None,
            beschreibung: beschreibung.into(),
        }
    }
}
