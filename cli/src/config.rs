//! CLI-Konfiguration
//!
//! Wird beim Start aus einer TOML-Datei geladen. Alle Felder haben
//! Standardwerte, ohne Datei verbindet sich die CLI mit einem lokalen
//! ServerQuery-Port.

use serde::{Deserialize, Serialize};
use tsquery_client::befehle::BenachrichtigungsKlasse;
use tsquery_client::VerbindungsKonfig;
use tsquery_observability::{log_format_gueltig, log_level_gueltig};

/// Vollstaendige CLI-Konfiguration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CliConfig {
    /// Ziel und Zeitlimits der Query-Verbindung
    pub verbindung: VerbindungsKonfig,
    pub logging: LoggingEinstellungen,
    pub cli: CliEinstellungen,
    /// Observability-Einstellungen (Metriken, Health)
    pub observability: ObservabilityEinstellungen,
}

/// Logging-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingEinstellungen {
    /// Log-Level oder Filter-Direktive
    pub level: String,
    /// Format: "json" oder "text"
    pub format: String,
}

impl Default for LoggingEinstellungen {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: "text".into(),
        }
    }
}

/// Welcher Dispatcher die Befehle ausfuehrt
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Modus {
    /// Ereignisgesteuert, Benachrichtigungen werden laufend ausgegeben
    #[default]
    Async,
    /// Blockierend, Benachrichtigungen werden nicht zugestellt
    Sync,
}

/// Verhalten der interaktiven Sitzung
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CliEinstellungen {
    pub modus: Modus,
    /// Query-Login; ohne Passwort wird nicht angemeldet
    pub login: Option<String>,
    pub passwort: Option<String>,
    /// Virtueller Server fuer `use sid=`
    pub virtueller_server: Option<u32>,
    /// Ereignisklassen fuer `servernotifyregister`, z.B. "server", "textprivate"
    pub benachrichtigungen: Vec<String>,
}

impl CliEinstellungen {
    /// Bekannte Ereignisklassen, unbekannte Namen werden uebersprungen
    pub fn benachrichtigungs_klassen(&self) -> Vec<BenachrichtigungsKlasse> {
        self.benachrichtigungen
            .iter()
            .filter_map(|name| {
                let klasse = BenachrichtigungsKlasse::parsen(name);
                if klasse.is_none() {
                    tracing::warn!(klasse = %name, "Unbekannte Ereignisklasse ignoriert");
                }
                klasse
            })
            .collect()
    }
}

/// Observability-Einstellungen (Metriken + Health-Check)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ObservabilityEinstellungen {
    /// Aktiviert den Observability-Server
    pub aktiviert: bool,
    pub bind_adresse: String,
    /// Port fuer Metriken und Health (Standard: 9300)
    pub port: u16,
}

impl Default for ObservabilityEinstellungen {
    fn default() -> Self {
        Self {
            aktiviert: false,
            bind_adresse: "127.0.0.1".into(),
            port: 9300,
        }
    }
}

impl CliConfig {
    /// Laedt die Konfiguration aus einer TOML-Datei.
    /// Gibt die Standardkonfiguration zurueck wenn die Datei nicht existiert.
    pub fn laden(pfad: &str) -> anyhow::Result<Self> {
        match std::fs::read_to_string(pfad) {
            Ok(inhalt) => {
                let config: Self = toml::from_str(&inhalt)
                    .map_err(|e| anyhow::anyhow!("Konfigurationsfehler in '{pfad}': {e}"))?;
                config
                    .pruefen()
                    .map_err(|e| anyhow::anyhow!("Konfigurationsfehler in '{pfad}': {e}"))?;
                Ok(config)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::warn!(
                    pfad = pfad,
                    "Konfigurationsdatei nicht gefunden, verwende Standardwerte"
                );
                Ok(Self::default())
            }
            Err(e) => Err(anyhow::anyhow!(
                "Konfigurationsdatei '{pfad}' nicht lesbar: {e}"
            )),
        }
    }

    /// Prueft Werte, die serde allein nicht abfangen kann
    pub fn pruefen(&self) -> anyhow::Result<()> {
        if !log_level_gueltig(&self.logging.level) {
            anyhow::bail!("Ungueltiger Log-Level: '{}'", self.logging.level);
        }
        if !log_format_gueltig(&self.logging.format) {
            anyhow::bail!(
                "Ungueltiges Log-Format: '{}' (erlaubt: text, json)",
                self.logging.format
            );
        }
        Ok(())
    }

    /// Gibt die Bind-Adresse fuer den Observability-Server zurueck
    pub fn observability_bind_adresse(&self) -> String {
        format!(
            "{}:{}",
            self.observability.bind_adresse, self.observability.port
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_config_ist_valide() {
        let cfg = CliConfig::default();
        assert_eq!(cfg.verbindung.port, 10011);
        assert_eq!(cfg.cli.modus, Modus::Async);
        assert_eq!(cfg.logging.level, "info");
        assert!(!cfg.observability.aktiviert);
        assert_eq!(cfg.observability_bind_adresse(), "127.0.0.1:9300");
    }

    #[test]
    fn config_aus_toml_string() {
        let toml = r#"
            [verbindung]
            host = "ts.example.org"
            port = 25639

            [cli]
            modus = "sync"
            login = "serveradmin"
            passwort = "geheim"
            virtueller_server = 1
            benachrichtigungen = ["server", "TextPrivate", "gibtsnicht"]
        "#;
        let cfg: CliConfig = toml::from_str(toml).unwrap();
        assert_eq!(cfg.verbindung.host, "ts.example.org");
        assert_eq!(cfg.verbindung.port, 25639);
        assert_eq!(cfg.cli.modus, Modus::Sync);
        assert_eq!(cfg.cli.virtueller_server, Some(1));
        assert_eq!(
            cfg.cli.benachrichtigungs_klassen(),
            vec![BenachrichtigungsKlasse::Server, BenachrichtigungsKlasse::TextPrivate]
        );
        // Nicht angegebene Felder behalten Standardwerte
        assert_eq!(cfg.verbindung.verbindungs_timeout_ms, 10_000);
        assert_eq!(cfg.observability.port, 9300);
    }

    #[test]
    fn fehlende_datei_ergibt_standardwerte() {
        let cfg = CliConfig::laden("/nicht/vorhanden/tsquery.toml").unwrap();
        assert_eq!(cfg.verbindung.host, "127.0.0.1");
    }

    #[test]
    fn logging_werte_werden_geprueft() {
        assert!(CliConfig::default().pruefen().is_ok());

        let cfg: CliConfig = toml::from_str("[logging]\nformat = \"xml\"\n").unwrap();
        assert!(cfg.pruefen().is_err());

        let cfg: CliConfig = toml::from_str("[logging]\nlevel = \"\"\n").unwrap();
        assert!(cfg.pruefen().is_err());

        let cfg: CliConfig =
            toml::from_str("[logging]\nlevel = \"tsquery_client=debug,info\"\nformat = \"json\"\n")
                .unwrap();
        assert!(cfg.pruefen().is_ok());
    }

    #[test]
    fn ungueltige_datei_wird_abgelehnt() {
        let pfad = std::env::temp_dir().join(format!("tsquery-cli-test-{}.toml", std::process::id()));
        std::fs::write(&pfad, "[logging]\nformat = \"xml\"\n").unwrap();
        let ergebnis = CliConfig::laden(pfad.to_str().unwrap());
        std::fs::remove_file(&pfad).unwrap();
        let fehler = ergebnis.unwrap_err().to_string();
        assert!(fehler.contains("Log-Format"), "{fehler}");
    }

    #[test]
    fn unbekannter_modus_ist_fehler() {
        let ergebnis: Result<CliConfig, _> = toml::from_str("[cli]\nmodus = \"udp\"\n");
        assert!(ergebnis.is_err());
    }
}
