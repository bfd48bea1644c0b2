//! Verbindungskonfiguration
//!
//! Alle Felder haben Standardwerte, eine leere TOML-Sektion ergibt eine
//! lauffaehige Konfiguration fuer einen lokalen ServerQuery-Port.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tsquery_protocol::status::STANDARD_BAN_CODES;

/// Parameter einer Query-Verbindung
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VerbindungsKonfig {
    /// Hostname oder IP-Literal
    pub host: String,
    pub port: u16,
    /// Bei `false` werden nur IP-Literale akzeptiert
    pub dns_aufloesen: bool,
    /// Frist fuer Verbindungsaufbau und Begruessung (0 = keine)
    pub verbindungs_timeout_ms: u64,
    /// Frist fuer einen einzelnen Dispatch (0 = keine)
    pub dispatch_timeout_ms: u64,
    /// Groesse eines einzelnen Lesevorgangs
    pub lese_puffer_bytes: usize,
    /// Statuscodes, die als Ban gewertet werden
    pub ban_codes: Vec<u32>,
    /// Kapazitaet des Ereignis-Kanals
    pub ereignis_kapazitaet: usize,
}

impl Default for VerbindungsKonfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 10011,
            dns_aufloesen: true,
            verbindungs_timeout_ms: 10_000,
            dispatch_timeout_ms: 0,
            lese_puffer_bytes: 4096,
            ban_codes: STANDARD_BAN_CODES.to_vec(),
            ereignis_kapazitaet: 256,
        }
    }
}

impl VerbindungsKonfig {
    /// Konfiguration fuer einen bestimmten Host und Port
    pub fn neu(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            ..Self::default()
        }
    }

    pub fn verbindungs_timeout(&self) -> Option<Duration> {
        millis(self.verbindungs_timeout_ms)
    }

    pub fn dispatch_timeout(&self) -> Option<Duration> {
        millis(self.dispatch_timeout_ms)
    }

    /// Lesegroesse, mindestens ein Byte
    pub fn lese_groesse(&self) -> usize {
        self.lese_puffer_bytes.max(1)
    }
}

fn millis(ms: u64) -> Option<Duration> {
    (ms > 0).then(|| Duration::from_millis(ms))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standardwerte() {
        let konfig = VerbindungsKonfig::default();
        assert_eq!(konfig.port, 10011);
        assert_eq!(konfig.ban_codes, vec![3329, 3331]);
        assert_eq!(konfig.verbindungs_timeout(), Some(Duration::from_secs(10)));
        assert_eq!(konfig.dispatch_timeout(), None);
    }

    #[test]
    fn teilweise_toml_sektion() {
        let konfig: VerbindungsKonfig = toml::from_str(
            r#"
            host = "ts.example.org"
            port = 25639
            dispatch_timeout_ms = 500
            "#,
        )
        .unwrap();
        assert_eq!(konfig.host, "ts.example.org");
        assert_eq!(konfig.port, 25639);
        assert_eq!(konfig.dispatch_timeout(), Some(Duration::from_millis(500)));
        assert!(konfig.dns_aufloesen);
        assert_eq!(konfig.lese_puffer_bytes, 4096);
    }

    #[test]
    fn lese_groesse_nie_null() {
        let konfig = VerbindungsKonfig {
            lese_puffer_bytes: 0,
            ..Default::default()
        };
        assert_eq!(konfig.lese_groesse(), 1);
    }
}
