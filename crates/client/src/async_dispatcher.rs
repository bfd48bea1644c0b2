//! Ereignisgesteuerter Dispatcher
//!
//! Pro Verbindung laeuft genau ein Lese-Task. Er fuehrt die Begruessung
//! durch und zerlegt danach den Strom mit dem [`QueryCodec`] in Frames:
//!
//! - Benachrichtigungen gehen an alle registrierten Senken und als
//!   [`VerbindungsEreignis::Benachrichtigung`] an die Abonnenten
//! - Antworten werden auf Ban geprueft und in den Antwort-Slot gelegt
//!
//! ## Sperren
//!
//! - Dispatch-Sperre: Mutex um den Empfaenger des Antwort-Slots
//!   (Kapazitaet 1). Immer nur ein Befehl wartet auf eine Antwort, denn das
//!   Protokoll kennt keine Anfrage-IDs.
//! - Sende-Sperre: Mutex um den Schreiber, nur fuer das Senden selbst.
//! - Der Lese-Task legt Antworten ohne eine dieser Sperren ab.
//!
//! Laeuft ein Dispatch in sein Zeitlimit, schuldet der Server noch eine
//! Antwort. Der Zaehler `verwaist` haelt fest, wie viele Antworten der
//! Lese-Task noch verwerfen muss, bevor er wieder in den Slot legt.
//!
//! Endet der Lese-Task, wird der Sender des Slots fallengelassen. Ein
//! wartender `dispatch` bekommt dann `Ok(None)` statt zu haengen.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use parking_lot::{Mutex, RwLock};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio_util::codec::{FramedRead, FramedWrite};
use tokio_util::sync::{CancellationToken, DropGuard};
use tsquery_core::{
    BanInfo, ProtokollVariante, QueryError, Result, SchandlerId, SocketFehlerArt,
    VerbindungsEreignis, VerbindungsZustand,
};
use tsquery_protocol::status::Status;
use tsquery_protocol::{Befehl, BegruessungsErgebnis, QueryCodec, QueryFrame};

use crate::antwort::QueryAntwort;
use crate::config::VerbindungsKonfig;
use crate::resolve;
use crate::router::{BenachrichtigungsRouter, BenachrichtigungsSenke};

type Leser = FramedRead<OwnedReadHalf, QueryCodec>;
type Schreiber = FramedWrite<OwnedWriteHalf, QueryCodec>;

/// Asynchroner Query-Client
///
/// Klone teilen sich dieselbe Verbindung. Wird der letzte Klon
/// fallengelassen, beendet sich auch der Lese-Task.
#[derive(Clone)]
pub struct AsyncDispatcher {
    inner: Arc<Inner>,
    _wache: Arc<DropGuard>,
}

struct Inner {
    konfig: VerbindungsKonfig,
    status: Mutex<AsyncStatus>,
    sitzung: Mutex<Option<Arc<Sitzung>>>,
    /// Serialisiert Verbindungsaufbau und Trennen
    verbinden: tokio::sync::Mutex<()>,
    ereignisse: broadcast::Sender<VerbindungsEreignis>,
    senken: RwLock<Vec<Arc<dyn BenachrichtigungsSenke>>>,
    wurzel: CancellationToken,
    naechste_sitzung: AtomicU64,
}

#[derive(Debug, Default, Clone, Copy)]
struct AsyncStatus {
    zustand: VerbindungsZustand,
    variante: Option<ProtokollVariante>,
    schandler_id: Option<SchandlerId>,
}

/// Eine lebende TCP-Verbindung
struct Sitzung {
    id: u64,
    schreiber: tokio::sync::Mutex<Schreiber>,
    antworten: tokio::sync::Mutex<mpsc::Receiver<String>>,
    /// Antworten auf abgelaufene Dispatches, die noch ausstehen
    verwaist: Arc<Mutex<usize>>,
    abbruch: CancellationToken,
}

/// Grund fuer das Ende des Lese-Tasks
enum LeseEnde {
    /// Lokal getrennt oder Dispatcher fallengelassen
    Abgebrochen,
    Gebannt(BanInfo),
    Fehler(QueryError),
    GegenstelleGeschlossen,
}

impl AsyncDispatcher {
    pub fn neu(konfig: VerbindungsKonfig) -> Self {
        let (ereignisse, _) = broadcast::channel(konfig.ereignis_kapazitaet.max(1));
        let wurzel = CancellationToken::new();
        let wache = Arc::new(wurzel.clone().drop_guard());
        Self {
            inner: Arc::new(Inner {
                konfig,
                status: Mutex::new(AsyncStatus::default()),
                sitzung: Mutex::new(None),
                verbinden: tokio::sync::Mutex::new(()),
                ereignisse,
                senken: RwLock::new(Vec::new()),
                wurzel,
                naechste_sitzung: AtomicU64::new(1),
            }),
            _wache: wache,
        }
    }

    /// Registriert einen Router fuer alle folgenden Benachrichtigungen
    pub fn mit_router(self, router: BenachrichtigungsRouter) -> Self {
        self.senke_registrieren(Arc::new(router));
        self
    }

    /// Registriert eine beliebige Senke fuer rohe Benachrichtigungen
    pub fn senke_registrieren(&self, senke: Arc<dyn BenachrichtigungsSenke>) {
        self.inner.senken.write().push(senke);
    }

    /// Abonniert alle Verbindungs-Ereignisse ab jetzt
    pub fn abonnieren(&self) -> broadcast::Receiver<VerbindungsEreignis> {
        self.inner.ereignisse.subscribe()
    }

    pub fn konfig(&self) -> &VerbindungsKonfig {
        &self.inner.konfig
    }

    pub fn zustand(&self) -> VerbindungsZustand {
        self.inner.status.lock().zustand
    }

    pub fn variante(&self) -> Option<ProtokollVariante> {
        self.inner.status.lock().variante
    }

    /// Zuletzt gemeldeter Server-Connection-Handler (nur ClientQuery)
    pub fn schandler_id(&self) -> Option<SchandlerId> {
        self.inner.status.lock().schandler_id
    }

    pub fn ist_verbunden(&self) -> bool {
        self.inner.sitzung.lock().is_some()
    }

    /// Baut die Verbindung auf und wartet bis die Begruessung durch ist
    ///
    /// Ohne Wirkung wenn bereits verbunden.
    pub async fn connect(&self) -> Result<()> {
        let _verbinden = self.inner.verbinden.lock().await;
        if self.ist_verbunden() {
            return Ok(());
        }

        let ergebnis = self.aufbauen().await;
        if let Err(e) = &ergebnis {
            tracing::warn!(
                host = %self.inner.konfig.host,
                port = self.inner.konfig.port,
                fehler = %e,
                "Verbindungsaufbau fehlgeschlagen"
            );
            self.inner.status_zuruecksetzen();
        }
        ergebnis
    }

    /// Sendet einen Befehl und wartet auf genau die naechste Antwort
    ///
    /// `Ok(None)` wenn die Verbindung vor der Antwort abbricht.
    pub async fn dispatch(&self, befehl: &str) -> Result<Option<String>> {
        let sitzung = self.inner.aktive_sitzung()?;

        let mut antworten = sitzung.antworten.lock().await;
        if sitzung.abbruch.is_cancelled() {
            return Ok(None);
        }
        while let Ok(alt) = antworten.try_recv() {
            tracing::warn!(laenge = alt.len(), "Verwaiste Antwort verworfen");
        }

        let gesendet = sitzung.schreiber.lock().await.send(befehl).await;
        if let Err(e) = gesendet {
            tracing::warn!(sitzung = sitzung.id, fehler = %e, "Senden fehlgeschlagen");
            self.inner
                .fehler_trennen(sitzung.id, vec![fehler_ereignis(&e)]);
            return Err(e);
        }
        tracing::debug!(sitzung = sitzung.id, befehl = %befehl, "Befehl gesendet");

        let ergebnis = mit_frist(
            self.inner.konfig.dispatch_timeout(),
            "Dispatch",
            async { Ok(antworten.recv().await) },
        )
        .await;
        let antwort = match ergebnis {
            Ok(antwort) => antwort,
            Err(e) => {
                // Unter der Zaehler-Sperre: entweder liegt die Antwort schon
                // im Slot oder der Lese-Task verwirft sie beim Eintreffen
                let mut offen = sitzung.verwaist.lock();
                if antworten.try_recv().is_ok() {
                    tracing::debug!(sitzung = sitzung.id, "Antwort kurz nach dem Zeitlimit verworfen");
                } else {
                    *offen += 1;
                }
                tracing::warn!(sitzung = sitzung.id, befehl = %befehl, ausstehend = *offen, "Dispatch-Zeitlimit");
                return Err(e);
            }
        };
        if antwort.is_none() {
            tracing::debug!(sitzung = sitzung.id, "Verbindung vor der Antwort beendet");
        }
        Ok(antwort)
    }

    /// Sendet einen typisierten Befehl und dekodiert die Antwort
    pub async fn ausfuehren(&self, befehl: &Befehl) -> Result<QueryAntwort> {
        match self.dispatch(&befehl.kodieren()).await? {
            Some(text) => Ok(QueryAntwort::aus_text(&text)),
            None => Err(QueryError::Getrennt),
        }
    }

    /// Trennt die Verbindung lokal
    pub async fn disconnect(&self) {
        let _verbinden = self.inner.verbinden.lock().await;
        let Some(sitzung) = self.inner.sitzung.lock().take() else {
            return;
        };
        sitzung.abbruch.cancel();
        self.inner.status_zuruecksetzen();

        let mut schreiber = sitzung.schreiber.lock().await;
        if let Err(e) = SinkExt::<&str>::close(&mut *schreiber).await {
            tracing::debug!(fehler = %e, "Schliessen des Schreibers fehlgeschlagen");
        }
        tracing::info!(sitzung = sitzung.id, "Verbindung getrennt");
        self.inner.melden(VerbindungsEreignis::Geschlossen);
    }

    async fn aufbauen(&self) -> Result<()> {
        let inner = &self.inner;
        let konfig = &inner.konfig;
        let frist = konfig.verbindungs_timeout();

        inner.zustand_setzen(VerbindungsZustand::Aufloesen);
        let adresse = mit_frist(
            frist,
            "Aufloesung",
            resolve::aufloesen_async(&konfig.host, konfig.port, konfig.dns_aufloesen),
        )
        .await?;

        inner.zustand_setzen(VerbindungsZustand::Verbinden);
        tracing::info!(host = %konfig.host, adresse = %adresse, "Verbinde (asynchron)");
        let stream = mit_frist(frist, "Verbindungsaufbau", async {
            TcpStream::connect(adresse).await.map_err(QueryError::socket)
        })
        .await?;
        stream.set_nodelay(true)?;

        let (lese_haelfte, schreib_haelfte) = stream.into_split();
        let leser = FramedRead::with_capacity(
            lese_haelfte,
            QueryCodec::new(konfig.ban_codes.clone()),
            konfig.lese_groesse(),
        );
        let schreiber = FramedWrite::new(schreib_haelfte, QueryCodec::ohne_begruessung());

        let (antwort_tx, antwort_rx) = mpsc::channel(1);
        let (bereit_tx, bereit_rx) = oneshot::channel();
        let sitzung = Arc::new(Sitzung {
            id: inner.naechste_sitzung.fetch_add(1, Ordering::Relaxed),
            schreiber: tokio::sync::Mutex::new(schreiber),
            antworten: tokio::sync::Mutex::new(antwort_rx),
            verwaist: Arc::new(Mutex::new(0)),
            abbruch: inner.wurzel.child_token(),
        });
        *inner.sitzung.lock() = Some(Arc::clone(&sitzung));
        inner.zustand_setzen(VerbindungsZustand::WarteAufBanner);

        tokio::spawn(lese_loop(
            Arc::clone(inner),
            sitzung.id,
            sitzung.abbruch.clone(),
            Arc::clone(&sitzung.verwaist),
            leser,
            antwort_tx,
            bereit_tx,
        ));

        let begruessung = mit_frist(frist, "Begruessung", async {
            bereit_rx.await.unwrap_or(Err(QueryError::Getrennt))
        })
        .await;
        if begruessung.is_err() {
            inner.sitzung_entfernen(sitzung.id);
        }
        begruessung
    }
}

impl std::fmt::Debug for AsyncDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AsyncDispatcher")
            .field("host", &self.inner.konfig.host)
            .field("port", &self.inner.konfig.port)
            .field("status", &*self.inner.status.lock())
            .finish()
    }
}

impl Inner {
    fn aktive_sitzung(&self) -> Result<Arc<Sitzung>> {
        let sitzung = self
            .sitzung
            .lock()
            .clone()
            .ok_or(QueryError::NichtVerbunden)?;
        if !self.status.lock().zustand.ist_bereit() {
            return Err(QueryError::NichtBereit);
        }
        Ok(sitzung)
    }

    fn zustand_setzen(&self, zustand: VerbindungsZustand) {
        self.status.lock().zustand = zustand;
    }

    fn status_zuruecksetzen(&self) {
        *self.status.lock() = AsyncStatus::default();
    }

    fn bereit_setzen(&self, sitzung_id: u64, ergebnis: BegruessungsErgebnis) {
        *self.status.lock() = AsyncStatus {
            zustand: VerbindungsZustand::Bereit,
            variante: Some(ergebnis.variante),
            schandler_id: ergebnis.schandler_id,
        };
        tracing::info!(
            sitzung = sitzung_id,
            variante = %ergebnis.variante,
            schandler_id = ?ergebnis.schandler_id,
            "Begruessung abgeschlossen, bereit fuer Befehle"
        );
        self.melden(VerbindungsEreignis::Bereit {
            variante: ergebnis.variante,
            schandler_id: ergebnis.schandler_id,
        });
    }

    fn melden(&self, ereignis: VerbindungsEreignis) {
        let name = ereignis.name();
        if self.ereignisse.send(ereignis).is_err() {
            tracing::trace!(ereignis = name, "Keine Abonnenten fuer Ereignis");
        }
    }

    fn benachrichtigung_zustellen(&self, text: String) {
        for senke in self.senken.read().iter() {
            senke.zustellen(text.clone());
        }
        self.melden(VerbindungsEreignis::Benachrichtigung(text));
    }

    /// Entfernt die Sitzung falls sie noch die aktive ist
    fn sitzung_entfernen(&self, sitzung_id: u64) -> bool {
        let entfernt = {
            let mut aktiv = self.sitzung.lock();
            if aktiv.as_ref().is_some_and(|s| s.id == sitzung_id) {
                aktiv.take()
            } else {
                None
            }
        };
        match entfernt {
            Some(sitzung) => {
                sitzung.abbruch.cancel();
                self.status_zuruecksetzen();
                true
            }
            None => false,
        }
    }

    /// Trennt nach einem Fehler und meldet Fehler- und Schliess-Ereignis
    fn fehler_trennen(&self, sitzung_id: u64, ereignisse: Vec<VerbindungsEreignis>) {
        if !self.sitzung_entfernen(sitzung_id) {
            return;
        }
        for ereignis in ereignisse {
            self.melden(ereignis);
        }
        self.melden(VerbindungsEreignis::Geschlossen);
    }
}

/// Lese-Task einer Sitzung
async fn lese_loop(
    inner: Arc<Inner>,
    sitzung_id: u64,
    abbruch: CancellationToken,
    verwaist: Arc<Mutex<usize>>,
    mut leser: Leser,
    antwort_tx: mpsc::Sender<String>,
    bereit_tx: oneshot::Sender<Result<()>>,
) {
    let mut bereit_tx = Some(bereit_tx);

    let ende = loop {
        let frame = tokio::select! {
            _ = abbruch.cancelled() => break LeseEnde::Abgebrochen,
            frame = leser.next() => frame,
        };

        match frame {
            Some(Ok(QueryFrame::Begruessung(ergebnis))) => {
                inner.bereit_setzen(sitzung_id, ergebnis);
                if let Some(tx) = bereit_tx.take() {
                    let _ = tx.send(Ok(()));
                }
            }
            Some(Ok(QueryFrame::Benachrichtigung(text))) => {
                tracing::debug!(sitzung = sitzung_id, frame = %text, "Benachrichtigung empfangen");
                inner.benachrichtigung_zustellen(text);
            }
            Some(Ok(QueryFrame::Antwort(text))) => {
                let ban = Status::aus_antwort(&text)
                    .and_then(|status| status.ban_info(&inner.konfig.ban_codes));
                if let Some(ban) = ban {
                    break LeseEnde::Gebannt(ban);
                }
                let mut offen = verwaist.lock();
                if *offen > 0 {
                    *offen -= 1;
                    tracing::debug!(
                        sitzung = sitzung_id,
                        laenge = text.len(),
                        noch_ausstehend = *offen,
                        "Verspaetete Antwort verworfen"
                    );
                    continue;
                }
                match antwort_tx.try_send(text) {
                    Ok(()) => {}
                    Err(mpsc::error::TrySendError::Full(verworfen)) => {
                        tracing::warn!(
                            sitzung = sitzung_id,
                            laenge = verworfen.len(),
                            "Antwort-Slot belegt, Antwort verworfen"
                        );
                    }
                    Err(mpsc::error::TrySendError::Closed(_)) => break LeseEnde::Abgebrochen,
                }
            }
            Some(Err(QueryError::Gebannt(ban))) => break LeseEnde::Gebannt(ban),
            Some(Err(e)) => break LeseEnde::Fehler(e),
            None => break LeseEnde::GegenstelleGeschlossen,
        }
    };

    let fehler = match ende {
        LeseEnde::Abgebrochen => {
            tracing::debug!(sitzung = sitzung_id, "Lese-Task abgebrochen");
            QueryError::Getrennt
        }
        LeseEnde::Gebannt(ban) => {
            tracing::warn!(sitzung = sitzung_id, ban = %ban, "Ban erkannt, Verbindung wird getrennt");
            inner.fehler_trennen(
                sitzung_id,
                vec![
                    VerbindungsEreignis::Gebannt(ban.clone()),
                    VerbindungsEreignis::zurueckgesetzt(format!("Gebannt: {ban}")),
                ],
            );
            QueryError::Gebannt(ban)
        }
        LeseEnde::Fehler(e) => {
            tracing::warn!(sitzung = sitzung_id, fehler = %e, "Lesefehler, Verbindung wird getrennt");
            inner.fehler_trennen(sitzung_id, vec![fehler_ereignis(&e)]);
            e
        }
        LeseEnde::GegenstelleGeschlossen => {
            tracing::info!(sitzung = sitzung_id, "Verbindung von der Gegenstelle geschlossen");
            inner.fehler_trennen(
                sitzung_id,
                vec![VerbindungsEreignis::zurueckgesetzt(
                    "Verbindung von der Gegenstelle geschlossen",
                )],
            );
            QueryError::Getrennt
        }
    };

    if let Some(tx) = bereit_tx.take() {
        let _ = tx.send(Err(fehler));
    }
    // Wartende Dispatches erhalten jetzt `None`
    drop(antwort_tx);
}

fn fehler_ereignis(e: &QueryError) -> VerbindungsEreignis {
    match e {
        QueryError::Socket { code, quelle } => {
            let art = match quelle.kind() {
                std::io::ErrorKind::ConnectionReset
                | std::io::ErrorKind::ConnectionAborted
                | std::io::ErrorKind::BrokenPipe => SocketFehlerArt::Zurueckgesetzt,
                _ => SocketFehlerArt::Io,
            };
            VerbindungsEreignis::SocketFehler {
                art,
                code: *code,
                beschreibung: e.to_string(),
            }
        }
        andere => VerbindungsEreignis::SocketFehler {
            art: SocketFehlerArt::Io,
            code: None,
            beschreibung: andere.to_string(),
        },
    }
}

async fn mit_frist<T>(
    frist: Option<Duration>,
    schritt: &str,
    zukunft: impl Future<Output = Result<T>>,
) -> Result<T> {
    match frist {
        Some(frist) => tokio::time::timeout(frist, zukunft).await.map_err(|_| {
            QueryError::Zeitlimit(format!("{schritt} nach {} ms", frist.as_millis()))
        })?,
        None => zukunft.await,
    }
}
