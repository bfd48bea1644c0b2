//! tsquery-cli – Bibliotheks-Root
//!
//! Interaktive Query-Sitzung: verbindet, meldet sich optional an und
//! reicht jede Eingabezeile unveraendert als Befehl an den Dispatcher.

pub mod config;

use std::io::{BufRead, Write};
use std::net::SocketAddr;
use std::time::Instant;

use anyhow::{Context, Result};
use async_trait::async_trait;
use config::{CliConfig, CliEinstellungen, Modus};
use tokio::io::AsyncBufReadExt;
use tokio::sync::broadcast;
use tsquery_client::befehle;
use tsquery_client::events::{ClientBetritt, ClientBewegt, ClientVerlaesst, Textnachricht};
use tsquery_client::{
    AsyncDispatcher, BenachrichtigungsHandler, BenachrichtigungsRouter, SyncDispatcher,
};
use tsquery_core::{QueryError, VerbindungsEreignis};
use tsquery_observability::{observability_server_starten, QueryMetrics, VerbindungsGesundheit};
use tsquery_protocol::status::Status;
use tsquery_protocol::wire::ZEILENENDE;
use tsquery_protocol::{Befehl, ParameterListe};

/// Eingaben, die die Sitzung beenden statt gesendet zu werden
const BEENDEN: [&str; 2] = ["quit", "exit"];

/// Haelt Konfiguration und geteilte Observability-Zustaende zusammen
pub struct Cli {
    pub config: CliConfig,
    metriken: QueryMetrics,
    gesundheit: VerbindungsGesundheit,
}

impl Cli {
    pub fn neu(config: CliConfig) -> Result<Self> {
        Ok(Self {
            config,
            metriken: QueryMetrics::neu()?,
            gesundheit: VerbindungsGesundheit::neu(),
        })
    }

    /// Startet die Sitzung im konfigurierten Modus und laeuft bis `quit`,
    /// Eingabeende oder Verbindungsabbruch
    pub async fn starten(self) -> Result<()> {
        tracing::info!(
            host = %self.config.verbindung.host,
            port = self.config.verbindung.port,
            modus = ?self.config.cli.modus,
            "Query-Sitzung startet"
        );

        if self.config.observability.aktiviert {
            self.observability_starten()?;
        }

        let modus = self.config.cli.modus;
        match modus {
            Modus::Async => self.async_sitzung().await,
            Modus::Sync => tokio::task::spawn_blocking(move || self.sync_sitzung())
                .await
                .context("Sync-Sitzung abgebrochen")?,
        }
    }

    fn observability_starten(&self) -> Result<()> {
        let adresse: SocketAddr = self
            .config
            .observability_bind_adresse()
            .parse()
            .context("Ungueltige Observability-Adresse")?;
        let metriken = self.metriken.clone();
        let gesundheit = self.gesundheit.clone();
        tokio::spawn(async move {
            if let Err(e) = observability_server_starten(adresse, metriken, gesundheit).await {
                tracing::error!(fehler = %e, "Observability-Server beendet");
            }
        });
        Ok(())
    }

    async fn async_sitzung(self) -> Result<()> {
        let dispatcher = AsyncDispatcher::neu(self.config.verbindung.clone())
            .mit_router(BenachrichtigungsRouter::neu(Ausgabe));
        tokio::spawn(ereignisse_erfassen(
            dispatcher.abonnieren(),
            self.metriken.clone(),
            self.gesundheit.clone(),
        ));

        dispatcher.connect().await?;
        println!(
            "Verbunden ({}, schandlerid={:?})",
            dispatcher
                .variante()
                .map(|v| v.to_string())
                .unwrap_or_default(),
            dispatcher.schandler_id().map(|id| id.0)
        );

        for befehl in anmelde_befehle(&self.config.cli) {
            let antwort = dispatcher.ausfuehren(&befehl).await?.pruefen()?;
            tracing::debug!(befehl = befehl.name(), status = %antwort.status, "Anmeldeschritt ok");
        }

        let mut zeilen = tokio::io::BufReader::new(tokio::io::stdin()).lines();
        loop {
            let zeile = tokio::select! {
                zeile = zeilen.next_line() => zeile?,
                _ = tokio::signal::ctrl_c() => {
                    tracing::info!("Ctrl-C empfangen, Sitzung wird beendet");
                    None
                }
            };
            let Some(zeile) = zeile else { break };
            let befehl = zeile.trim();
            if befehl.is_empty() {
                continue;
            }
            if BEENDEN.contains(&befehl) {
                break;
            }

            let start = Instant::now();
            let ergebnis = dispatcher.dispatch(befehl).await;
            match ergebnis {
                Ok(Some(text)) => {
                    self.metriken
                        .dispatch_erfassen(start.elapsed(), antwort_erfolgreich(&text));
                    println!("{}", antwort_formatieren(&text));
                }
                Ok(None) => {
                    self.metriken.dispatch_erfassen(start.elapsed(), false);
                    println!("Verbindung beendet");
                    break;
                }
                Err(e) => {
                    self.metriken.dispatch_erfassen(start.elapsed(), false);
                    println!("Fehler: {e}");
                    if e.ist_verbindungsabbruch() {
                        break;
                    }
                }
            }
        }

        dispatcher.disconnect().await;
        Ok(())
    }

    fn sync_sitzung(self) -> Result<()> {
        let dispatcher = SyncDispatcher::neu(self.config.verbindung.clone());
        let ergebnis = dispatcher.connect();
        self.gesundheit.zustand_setzen(dispatcher.zustand());
        ergebnis?;
        println!(
            "Verbunden ({}, schandlerid={:?})",
            dispatcher
                .variante()
                .map(|v| v.to_string())
                .unwrap_or_default(),
            dispatcher.schandler_id().map(|id| id.0)
        );

        for befehl in anmelde_befehle(&self.config.cli) {
            dispatcher.ausfuehren(&befehl)?.pruefen()?;
        }
        if !self.config.cli.benachrichtigungen.is_empty() {
            tracing::warn!("Benachrichtigungen werden im Sync-Modus nicht ausgegeben");
        }

        let stdin = std::io::stdin();
        self.sync_repl(&dispatcher, stdin.lock(), &mut std::io::stdout())?;

        dispatcher.disconnect();
        self.gesundheit.zustand_setzen(dispatcher.zustand());
        Ok(())
    }
}

impl Cli {
    /// Blockierende REPL: eine Zeile, ein Befehl
    ///
    /// Endet bei `quit`, Eingabeende oder sobald der Dispatcher nicht mehr
    /// verbunden ist. Gibt die Anzahl gesendeter Befehle zurueck.
    pub fn sync_repl(
        &self,
        dispatcher: &SyncDispatcher,
        eingabe: impl BufRead,
        ausgabe: &mut impl Write,
    ) -> Result<usize> {
        let mut gesendet = 0;
        for zeile in eingabe.lines() {
            let zeile = zeile?;
            let befehl = zeile.trim();
            if befehl.is_empty() {
                continue;
            }
            if BEENDEN.contains(&befehl) {
                break;
            }

            let start = Instant::now();
            let ergebnis = dispatcher.dispatch(befehl);
            gesendet += 1;
            self.gesundheit.zustand_setzen(dispatcher.zustand());
            match ergebnis {
                Ok(text) => {
                    self.metriken
                        .dispatch_erfassen(start.elapsed(), antwort_erfolgreich(&text));
                    writeln!(ausgabe, "{}", antwort_formatieren(&text))?;
                }
                Err(e) => {
                    self.metriken.dispatch_erfassen(start.elapsed(), false);
                    if let QueryError::Gebannt(ban) = &e {
                        self.metriken
                            .ereignis_erfassen(&VerbindungsEreignis::Gebannt(ban.clone()));
                    }
                    writeln!(ausgabe, "Fehler: {e}")?;
                }
            }
            ausgabe.flush()?;

            // Auch ein Zeitlimit trennt die blockierende Verbindung
            if !dispatcher.ist_verbunden() {
                self.metriken
                    .ereignis_erfassen(&VerbindungsEreignis::Geschlossen);
                writeln!(ausgabe, "Verbindung beendet")?;
                break;
            }
        }
        Ok(gesendet)
    }
}

/// Befehle, die nach dem Verbindungsaufbau der Reihe nach laufen
pub fn anmelde_befehle(einstellungen: &CliEinstellungen) -> Vec<Befehl> {
    let mut befehle = Vec::new();
    if let (Some(login), Some(passwort)) = (&einstellungen.login, &einstellungen.passwort) {
        befehle.push(befehle::login(login, passwort));
    }
    if let Some(sid) = einstellungen.virtueller_server {
        befehle.push(befehle::use_sid(sid));
    }
    if einstellungen.modus == Modus::Async {
        befehle.extend(
            einstellungen
                .benachrichtigungs_klassen()
                .into_iter()
                .map(befehle::servernotifyregister),
        );
    }
    befehle
}

/// Wandelt die Zeilenenden einer Antwort fuer die Ausgabe um
pub fn antwort_formatieren(text: &str) -> String {
    text.split(ZEILENENDE)
        .filter(|zeile| !zeile.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

fn antwort_erfolgreich(text: &str) -> bool {
    Status::aus_antwort(text).is_some_and(|status| status.ist_erfolg())
}

/// Uebertraegt Verbindungs-Ereignisse in Metriken und Health-Zustand
async fn ereignisse_erfassen(
    mut ereignisse: broadcast::Receiver<VerbindungsEreignis>,
    metriken: QueryMetrics,
    gesundheit: VerbindungsGesundheit,
) {
    loop {
        match ereignisse.recv().await {
            Ok(ereignis) => {
                metriken.ereignis_erfassen(&ereignis);
                gesundheit.ereignis_anwenden(&ereignis);
            }
            Err(broadcast::error::RecvError::Lagged(anzahl)) => {
                tracing::warn!(anzahl, "Ereignisse verpasst");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}

/// Gibt typisierte Benachrichtigungen auf stdout aus
struct Ausgabe;

#[async_trait]
impl BenachrichtigungsHandler for Ausgabe {
    async fn client_betritt(&self, e: ClientBetritt) {
        println!("* {} (clid={}) betritt Kanal {}", e.nickname, e.clid, e.ziel_kanal);
    }

    async fn client_verlaesst(&self, e: ClientVerlaesst) {
        match e.grund_text {
            Some(grund) => println!("* clid={} verlaesst den Server: {grund}", e.clid),
            None => println!("* clid={} verlaesst den Server", e.clid),
        }
    }

    async fn client_bewegt(&self, e: ClientBewegt) {
        println!("* clid={} wechselt in Kanal {}", e.clid, e.ziel_kanal);
    }

    async fn textnachricht(&self, e: Textnachricht) {
        println!("<{}> {}", e.aufrufer_name, e.nachricht);
    }

    async fn unbekannt(&self, name: String, gruppen: ParameterListe) {
        println!("* {name} ({} Gruppen)", gruppen.len());
    }
}
