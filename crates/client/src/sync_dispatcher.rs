//! Blockierender Dispatcher
//!
//! Verbindungsaufbau, Begruessung, Senden und Empfangen laufen komplett im
//! aufrufenden Thread. Es gibt keine Hintergrund-Threads.
//!
//! Ein Mutex um die Verbindung dient als Sende-Sperre: immer nur ein
//! Sende/Empfangs-Zyklus, und nie parallel zur Begruessung. Jeder Fehler
//! trennt die Verbindung; der Aufrufer muss selbst neu verbinden.

use std::io::{self, Read, Write};
use std::net::{Shutdown, TcpStream};
use std::sync::Arc;

use bytes::BytesMut;
use parking_lot::Mutex;
use tsquery_core::{
    ProtokollVariante, QueryError, Result, SchandlerId, VerbindungsZustand,
};
use tsquery_protocol::status::Status;
use tsquery_protocol::wire::{finde_statuszeile, BEFEHLS_ENDE, ZEILENENDE};
use tsquery_protocol::{Befehl, Begruessung};

use crate::antwort::QueryAntwort;
use crate::config::VerbindungsKonfig;
use crate::resolve;

struct SyncVerbindung {
    stream: TcpStream,
    puffer: BytesMut,
    lese_block: Vec<u8>,
}

#[derive(Debug, Default, Clone, Copy)]
struct SyncStatus {
    zustand: VerbindungsZustand,
    variante: Option<ProtokollVariante>,
    schandler_id: Option<SchandlerId>,
}

/// Schliesst den Socket eines [`SyncDispatcher`] aus einem anderen Thread
///
/// Ein blockierter `dispatch` kehrt daraufhin mit einem Fehler zurueck.
#[derive(Debug, Clone)]
pub struct AbbruchHandle {
    stream: Arc<Mutex<Option<TcpStream>>>,
}

impl AbbruchHandle {
    /// Gibt true zurueck wenn ein offener Socket geschlossen wurde
    pub fn abbrechen(&self) -> bool {
        match self.stream.lock().as_ref() {
            Some(stream) => {
                tracing::debug!("Socket wird von aussen geschlossen");
                stream.shutdown(Shutdown::Both).is_ok()
            }
            None => false,
        }
    }
}

/// Blockierender Query-Client
pub struct SyncDispatcher {
    konfig: VerbindungsKonfig,
    verbindung: Mutex<Option<SyncVerbindung>>,
    status: Mutex<SyncStatus>,
    abbruch: Arc<Mutex<Option<TcpStream>>>,
}

impl SyncDispatcher {
    pub fn neu(konfig: VerbindungsKonfig) -> Self {
        Self {
            konfig,
            verbindung: Mutex::new(None),
            status: Mutex::new(SyncStatus::default()),
            abbruch: Arc::new(Mutex::new(None)),
        }
    }

    pub fn konfig(&self) -> &VerbindungsKonfig {
        &self.konfig
    }

    pub fn zustand(&self) -> VerbindungsZustand {
        self.status.lock().zustand
    }

    pub fn variante(&self) -> Option<ProtokollVariante> {
        self.status.lock().variante
    }

    /// Zuletzt gemeldeter Server-Connection-Handler (nur ClientQuery)
    pub fn schandler_id(&self) -> Option<SchandlerId> {
        self.status.lock().schandler_id
    }

    pub fn ist_verbunden(&self) -> bool {
        self.zustand().ist_verbunden()
    }

    pub fn abbruch_handle(&self) -> AbbruchHandle {
        AbbruchHandle {
            stream: Arc::clone(&self.abbruch),
        }
    }

    /// Baut die Verbindung auf und fuehrt die Begruessung durch
    ///
    /// Ohne Wirkung wenn bereits verbunden.
    pub fn connect(&self) -> Result<()> {
        let mut verbindung = self.verbindung.lock();
        if verbindung.is_some() {
            return Ok(());
        }

        match self.aufbauen() {
            Ok(neu) => {
                *verbindung = Some(neu);
                Ok(())
            }
            Err(e) => {
                tracing::warn!(
                    host = %self.konfig.host,
                    port = self.konfig.port,
                    fehler = %e,
                    "Verbindungsaufbau fehlgeschlagen"
                );
                self.zuruecksetzen();
                Err(e)
            }
        }
    }

    /// Sendet einen Befehl und liefert den Antworttext unveraendert
    ///
    /// Der Text enthaelt alle bis zur Statuszeile empfangenen Zeilen.
    pub fn dispatch(&self, befehl: &str) -> Result<String> {
        let mut guard = self.verbindung.lock();
        let Some(verbindung) = guard.as_mut() else {
            return Err(QueryError::NichtVerbunden);
        };

        match self.senden_empfangen(verbindung, befehl) {
            Ok(antwort) => Ok(antwort),
            Err(e) => {
                tracing::warn!(fehler = %e, "Dispatch fehlgeschlagen, Verbindung wird getrennt");
                if let Some(alt) = guard.take() {
                    let _ = alt.stream.shutdown(Shutdown::Both);
                }
                self.zuruecksetzen();
                Err(e)
            }
        }
    }

    /// Sendet einen typisierten Befehl und dekodiert die Antwort
    pub fn ausfuehren(&self, befehl: &Befehl) -> Result<QueryAntwort> {
        self.dispatch(&befehl.kodieren())
            .map(|text| QueryAntwort::aus_text(&text))
    }

    /// Trennt die Verbindung; ein laufender Dispatch wird abgebrochen
    pub fn disconnect(&self) {
        self.abbruch_handle().abbrechen();

        let mut guard = self.verbindung.lock();
        if let Some(alt) = guard.take() {
            let _ = alt.stream.shutdown(Shutdown::Both);
            tracing::info!(host = %self.konfig.host, port = self.konfig.port, "Verbindung getrennt");
        }
        self.zuruecksetzen();
    }

    // -----------------------------------------------------------------------
    // Interne Schritte
    // -----------------------------------------------------------------------

    fn aufbauen(&self) -> Result<SyncVerbindung> {
        self.zustand_setzen(VerbindungsZustand::Aufloesen);
        let adresse = resolve::aufloesen(&self.konfig.host, self.konfig.port, self.konfig.dns_aufloesen)?;

        self.zustand_setzen(VerbindungsZustand::Verbinden);
        tracing::info!(host = %self.konfig.host, adresse = %adresse, "Verbinde (synchron)");
        let stream = match self.konfig.verbindungs_timeout() {
            Some(frist) => TcpStream::connect_timeout(&adresse, frist),
            None => TcpStream::connect(adresse),
        }
        .map_err(io_fehler)?;
        stream.set_nodelay(true)?;
        stream.set_read_timeout(self.konfig.verbindungs_timeout())?;
        *self.abbruch.lock() = Some(stream.try_clone()?);

        let mut verbindung = SyncVerbindung {
            stream,
            puffer: BytesMut::with_capacity(self.konfig.lese_groesse()),
            lese_block: vec![0; self.konfig.lese_groesse()],
        };

        self.zustand_setzen(VerbindungsZustand::WarteAufBanner);
        let mut begruessung = Begruessung::neu(self.konfig.ban_codes.clone());
        let ergebnis = loop {
            if let Some(ergebnis) = begruessung.verarbeiten(&mut verbindung.puffer)? {
                break ergebnis;
            }
            self.zustand_setzen(begruessung.zustand());
            lesen(&mut verbindung)?;
        };

        verbindung.stream.set_read_timeout(self.konfig.dispatch_timeout())?;
        verbindung.stream.set_write_timeout(self.konfig.dispatch_timeout())?;

        *self.status.lock() = SyncStatus {
            zustand: VerbindungsZustand::Bereit,
            variante: Some(ergebnis.variante),
            schandler_id: ergebnis.schandler_id,
        };
        tracing::info!(
            variante = %ergebnis.variante,
            schandler_id = ?ergebnis.schandler_id,
            "Begruessung abgeschlossen, bereit fuer Befehle"
        );
        Ok(verbindung)
    }

    fn senden_empfangen(&self, verbindung: &mut SyncVerbindung, befehl: &str) -> Result<String> {
        let befehl = befehl.trim_end_matches(|c: char| c == '\n' || c == '\r');
        let zeile = format!("{befehl}{BEFEHLS_ENDE}");
        verbindung.stream.write_all(zeile.as_bytes()).map_err(io_fehler)?;
        verbindung.stream.flush().map_err(io_fehler)?;
        tracing::debug!(befehl = %befehl, "Befehl gesendet");

        let (anfang, ende) = loop {
            if let Some(position) = finde_statuszeile(&verbindung.puffer) {
                break position;
            }
            lesen(verbindung)?;
        };

        let status = Status::parsen(&String::from_utf8_lossy(&verbindung.puffer[anfang..ende]));
        let frame = verbindung.puffer.split_to(ende + ZEILENENDE.len());

        if let Some(ban) = status.ban_info(&self.konfig.ban_codes) {
            tracing::warn!(ban = %ban, "Ban erkannt");
            return Err(QueryError::Gebannt(ban));
        }
        tracing::debug!(status = %status, laenge = frame.len(), "Antwort empfangen");
        Ok(String::from_utf8_lossy(&frame).into_owned())
    }

    fn zustand_setzen(&self, zustand: VerbindungsZustand) {
        self.status.lock().zustand = zustand;
    }

    fn zuruecksetzen(&self) {
        *self.abbruch.lock() = None;
        *self.status.lock() = SyncStatus::default();
    }
}

impl Drop for SyncDispatcher {
    fn drop(&mut self) {
        if let Some(alt) = self.verbindung.get_mut().take() {
            let _ = alt.stream.shutdown(Shutdown::Both);
        }
    }
}

impl std::fmt::Debug for SyncDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncDispatcher")
            .field("host", &self.konfig.host)
            .field("port", &self.konfig.port)
            .field("status", &*self.status.lock())
            .finish()
    }
}

/// Ein blockierender Lesevorgang, haengt die Daten an den Puffer an
fn lesen(verbindung: &mut SyncVerbindung) -> Result<()> {
    let n = verbindung
        .stream
        .read(&mut verbindung.lese_block)
        .map_err(io_fehler)?;
    if n == 0 {
        return Err(QueryError::Getrennt);
    }
    tracing::trace!(bytes = n, "Daten empfangen");
    verbindung.puffer.extend_from_slice(&verbindung.lese_block[..n]);
    Ok(())
}

/// Abgelaufene Socket-Timeouts werden zu [`QueryError::Zeitlimit`]
fn io_fehler(e: io::Error) -> QueryError {
    match e.kind() {
        io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut => {
            QueryError::Zeitlimit(format!("Socket-Operation: {e}"))
        }
        _ => QueryError::socket(e),
    }
}
