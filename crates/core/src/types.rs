//! Gemeinsame Typen fuer Query-Verbindungen
//!
//! Lebenszyklus-Zustand, erkannte Protokoll-Variante und Ban-Details.

use serde::{Deserialize, Serialize};

/// Variante des Query-Protokolls, erkannt am Banner
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProtokollVariante {
    /// Fernverwaltung einer Server-Instanz (Banner `TS3`)
    ServerQuery,
    /// Lokale Steuerung eines laufenden Clients (Banner `TS3 Client`)
    ClientQuery,
}

impl std::fmt::Display for ProtokollVariante {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ServerQuery => write!(f, "ServerQuery"),
            Self::ClientQuery => write!(f, "ClientQuery"),
        }
    }
}

/// Lebenszyklus einer Verbindung
///
/// ```text
/// Getrennt -> Aufloesen -> Verbinden -> WarteAufBanner
///   -> VarianteErkennen -> WarteAufVariantenRumpf -> Bereit
/// ```
/// `Fehlerhaft` ist von jedem Schritt aus erreichbar.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerbindungsZustand {
    #[default]
    Getrennt,
    Aufloesen,
    Verbinden,
    WarteAufBanner,
    VarianteErkennen,
    WarteAufVariantenRumpf,
    Bereit,
    Fehlerhaft,
}

impl VerbindungsZustand {
    /// Gibt true zurueck solange ein Socket existiert
    pub fn ist_verbunden(&self) -> bool {
        matches!(
            self,
            Self::WarteAufBanner | Self::VarianteErkennen | Self::WarteAufVariantenRumpf | Self::Bereit
        )
    }

    /// Gibt true zurueck wenn Befehle gesendet werden duerfen
    pub fn ist_bereit(&self) -> bool {
        *self == Self::Bereit
    }
}

/// Server-Connection-Handler-ID (nur ClientQuery)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SchandlerId(pub u64);

impl std::fmt::Display for SchandlerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "schandler:{}", self.0)
    }
}

/// Details einer erkannten Ban-Statuszeile
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BanInfo {
    /// Fehler-ID der Statuszeile
    pub id: u32,
    /// Unescapte `msg`
    pub nachricht: String,
    /// Unescapte `extra_msg`, falls vorhanden
    pub extra_nachricht: Option<String>,
    /// Ban-Dauer in Sekunden, soweit ermittelbar
    pub dauer_sek: Option<u64>,
}

impl std::fmt::Display for BanInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "id={} msg={}", self.id, self.nachricht)?;
        if let Some(extra) = &self.extra_nachricht {
            write!(f, " ({extra})")?;
        }
        if let Some(dauer) = self.dauer_sek {
            write!(f, " dauer={dauer}s")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zustand_standard_ist_getrennt() {
        let z = VerbindungsZustand::default();
        assert_eq!(z, VerbindungsZustand::Getrennt);
        assert!(!z.ist_verbunden());
    }

    #[test]
    fn zustand_bereit_ist_verbunden() {
        assert!(VerbindungsZustand::Bereit.ist_verbunden());
        assert!(VerbindungsZustand::Bereit.ist_bereit());
        assert!(VerbindungsZustand::WarteAufBanner.ist_verbunden());
        assert!(!VerbindungsZustand::WarteAufBanner.ist_bereit());
        assert!(!VerbindungsZustand::Fehlerhaft.ist_verbunden());
    }

    #[test]
    fn ban_info_anzeige() {
        let ban = BanInfo {
            id: 3329,
            nachricht: "connection failed, you are banned".into(),
            extra_nachricht: Some("you may retry in 600 seconds".into()),
            dauer_sek: Some(600),
        };
        let text = ban.to_string();
        assert!(text.starts_with("id=3329"));
        assert!(text.contains("dauer=600s"));
    }

    #[test]
    fn variante_ist_serde_kompatibel() {
        let json = serde_json::to_string(&ProtokollVariante::ClientQuery).unwrap();
        assert_eq!(json, "\"client_query\"");
    }
}
