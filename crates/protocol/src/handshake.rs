//! Banner-Handshake
//!
//! Reine Zustandsmaschine ueber einem wachsenden Empfangspuffer. Sie wird
//! vom blockierenden Dispatcher direkt und vom asynchronen Lese-Loop ueber
//! den [`crate::wire::QueryCodec`] gefuettert.
//!
//! ```text
//! WarteAufBanner -> VarianteErkennen -> WarteAufVariantenRumpf -> Bereit
//! ```
//!
//! - ServerQuery: `TS3\n\r` + Willkommenszeile, optional direkt gefolgt von
//!   einer Ban-Statuszeile
//! - ClientQuery: `TS3 Client\n\r` + Willkommenszeile +
//!   `selected schandlerid=<N>\n\r`

use bytes::{Buf, BytesMut};
use tsquery_core::{ProtokollVariante, QueryError, Result, SchandlerId, VerbindungsZustand};

use crate::status::{Status, STATUS_PREFIX};
use crate::wire::{finde_zeilenende, ZEILENENDE};

/// Banner der ServerQuery-Variante
pub const SERVER_QUERY_BANNER: &str = "TS3\n\r";

/// Banner der ClientQuery-Variante
pub const CLIENT_QUERY_BANNER: &str = "TS3 Client\n\r";

/// Statischer Prefix der Handler-Zeile (nur ClientQuery)
pub const SCHANDLER_PREFIX: &str = "selected schandlerid=";

const BANNER: [(&str, ProtokollVariante); 2] = [
    (SERVER_QUERY_BANNER, ProtokollVariante::ServerQuery),
    (CLIENT_QUERY_BANNER, ProtokollVariante::ClientQuery),
];

/// Maximale Laenge der Willkommenszeile bevor die Begruessung scheitert
const MAX_WILLKOMMEN_BYTES: usize = 1024;

/// Ergebnis einer erfolgreichen Begruessung
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BegruessungsErgebnis {
    pub variante: ProtokollVariante,
    /// Nur bei ClientQuery gesetzt
    pub schandler_id: Option<SchandlerId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    WarteAufBanner,
    VarianteErkennen(ProtokollVariante),
    Willkommen(ProtokollVariante),
    SchandlerZeile,
    Fertig,
}

/// Zustandsmaschine der Begruessung
#[derive(Debug, Clone)]
pub struct Begruessung {
    phase: Phase,
    ban_codes: Vec<u32>,
}

impl Begruessung {
    /// Erstellt eine neue Begruessung; `ban_codes` fuer die ServerQuery-Banpruefung
    pub fn neu(ban_codes: impl Into<Vec<u32>>) -> Self {
        Self {
            phase: Phase::WarteAufBanner,
            ban_codes: ban_codes.into(),
        }
    }

    /// Aktueller Verbindungszustand aus Sicht des Handshakes
    pub fn zustand(&self) -> VerbindungsZustand {
        match self.phase {
            Phase::WarteAufBanner => VerbindungsZustand::WarteAufBanner,
            Phase::VarianteErkennen(_) => VerbindungsZustand::VarianteErkennen,
            Phase::Willkommen(_) | Phase::SchandlerZeile => VerbindungsZustand::WarteAufVariantenRumpf,
            Phase::Fertig => VerbindungsZustand::Bereit,
        }
    }

    pub fn ist_fertig(&self) -> bool {
        self.phase == Phase::Fertig
    }

    /// Verarbeitet den Puffer so weit wie moeglich
    ///
    /// Verbrauchte Bytes werden aus `puffer` entfernt. `Ok(None)` heisst:
    /// mehr Bytes noetig. Fehler sind endgueltig.
    pub fn verarbeiten(&mut self, puffer: &mut BytesMut) -> Result<Option<BegruessungsErgebnis>> {
        loop {
            match self.phase {
                Phase::WarteAufBanner => match banner_erkennen(puffer)? {
                    Some(variante) => self.phase = Phase::VarianteErkennen(variante),
                    None => return Ok(None),
                },
                Phase::VarianteErkennen(variante) => {
                    let banner = banner_von(variante);
                    let n = puffer.len().min(banner.len());
                    if !puffer[..n].eq_ignore_ascii_case(&banner.as_bytes()[..n]) {
                        return Err(QueryError::BegruessungFehlgeschlagen(format!(
                            "Banner {:?} erwartet, erhalten: {:?}",
                            banner,
                            String::from_utf8_lossy(&puffer[..n])
                        )));
                    }
                    if n < banner.len() {
                        return Ok(None);
                    }
                    puffer.advance(banner.len());
                    tracing::debug!(variante = %variante, "Banner erkannt");
                    self.phase = Phase::Willkommen(variante);
                }
                Phase::Willkommen(variante) => {
                    let Some(ende) = finde_zeilenende(puffer) else {
                        if puffer.len() > MAX_WILLKOMMEN_BYTES {
                            return Err(QueryError::BegruessungFehlgeschlagen(
                                "Willkommenszeile zu lang".into(),
                            ));
                        }
                        return Ok(None);
                    };
                    puffer.advance(ende + ZEILENENDE.len());
                    match variante {
                        ProtokollVariante::ServerQuery => {
                            self.sofortigen_ban_pruefen(puffer)?;
                            self.phase = Phase::Fertig;
                            return Ok(Some(BegruessungsErgebnis {
                                variante,
                                schandler_id: None,
                            }));
                        }
                        ProtokollVariante::ClientQuery => self.phase = Phase::SchandlerZeile,
                    }
                }
                Phase::SchandlerZeile => {
                    let n = puffer.len().min(SCHANDLER_PREFIX.len());
                    if !puffer[..n].eq_ignore_ascii_case(&SCHANDLER_PREFIX.as_bytes()[..n]) {
                        return Err(QueryError::BegruessungFehlgeschlagen(format!(
                            "'{SCHANDLER_PREFIX}' erwartet"
                        )));
                    }
                    let Some(ende) = finde_zeilenende(puffer) else {
                        return Ok(None);
                    };
                    let zeile = String::from_utf8_lossy(&puffer[SCHANDLER_PREFIX.len()..ende]).into_owned();
                    let id: u64 = zeile.trim().parse().map_err(|_| {
                        QueryError::BegruessungFehlgeschlagen(format!(
                            "Ungueltige schandlerid: '{zeile}'"
                        ))
                    })?;
                    puffer.advance(ende + ZEILENENDE.len());
                    self.phase = Phase::Fertig;
                    return Ok(Some(BegruessungsErgebnis {
                        variante: ProtokollVariante::ClientQuery,
                        schandler_id: Some(SchandlerId(id)),
                    }));
                }
                Phase::Fertig => return Ok(None),
            }
        }
    }

    /// Eine direkt nach dem ServerQuery-Banner gepufferte Ban-Statuszeile
    /// bricht die Begruessung ab.
    fn sofortigen_ban_pruefen(&self, puffer: &BytesMut) -> Result<()> {
        if !puffer.starts_with(STATUS_PREFIX.as_bytes()) {
            return Ok(());
        }
        let Some(ende) = finde_zeilenende(puffer) else {
            return Ok(());
        };
        let status = Status::parsen(&String::from_utf8_lossy(&puffer[..ende]));
        match status.ban_info(&self.ban_codes) {
            Some(ban) => {
                tracing::warn!(ban = %ban, "Ban direkt nach dem Banner");
                Err(QueryError::Gebannt(ban))
            }
            None => Ok(()),
        }
    }
}

fn banner_von(variante: ProtokollVariante) -> &'static str {
    match variante {
        ProtokollVariante::ServerQuery => SERVER_QUERY_BANNER,
        ProtokollVariante::ClientQuery => CLIENT_QUERY_BANNER,
    }
}

/// Vergleicht den Pufferanfang (ohne Gross-/Kleinschreibung) mit beiden Bannern
///
/// `Ok(None)` solange der Puffer noch zu beiden passen kann.
fn banner_erkennen(puffer: &[u8]) -> Result<Option<ProtokollVariante>> {
    if puffer.is_empty() {
        return Ok(None);
    }
    let passend: Vec<ProtokollVariante> = BANNER
        .iter()
        .filter(|(banner, _)| {
            let n = puffer.len().min(banner.len());
            puffer[..n].eq_ignore_ascii_case(&banner.as_bytes()[..n])
        })
        .map(|(_, variante)| *variante)
        .collect();

    match passend.as_slice() {
        [] => Err(QueryError::BegruessungFehlgeschlagen(format!(
            "Unbekanntes Banner: {:?}",
            String::from_utf8_lossy(&puffer[..puffer.len().min(32)])
        ))),
        [variante] => Ok(Some(*variante)),
        _ => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::status::STANDARD_BAN_CODES;

    const WILLKOMMEN_SQ: &str = "Welcome to the TeamSpeak 3 ServerQuery interface, type \"help\" for a list of commands and \"help <command>\" for information on a specific command.\n\r";
    const WILLKOMMEN_CQ: &str = "Welcome to the TeamSpeak 3 ClientQuery interface, type \"help\" for a list of commands and \"help <command>\" for information on a specific command.\n\r";

    fn begruessung() -> Begruessung {
        Begruessung::neu(STANDARD_BAN_CODES)
    }

    #[test]
    fn server_query_am_stueck() {
        let mut b = begruessung();
        let mut puffer = BytesMut::from(format!("{SERVER_QUERY_BANNER}{WILLKOMMEN_SQ}").as_str());
        let ergebnis = b.verarbeiten(&mut puffer).unwrap().unwrap();
        assert_eq!(ergebnis.variante, ProtokollVariante::ServerQuery);
        assert_eq!(ergebnis.schandler_id, None);
        assert!(b.ist_fertig());
        assert!(puffer.is_empty());
    }

    #[test]
    fn client_query_byteweise() {
        let text = format!("{CLIENT_QUERY_BANNER}{WILLKOMMEN_CQ}selected schandlerid=42\n\r");
        let mut b = begruessung();
        let mut puffer = BytesMut::new();
        let mut ergebnis = None;
        for byte in text.as_bytes() {
            puffer.extend_from_slice(&[*byte]);
            if let Some(e) = b.verarbeiten(&mut puffer).unwrap() {
                ergebnis = Some(e);
            }
        }
        let ergebnis = ergebnis.unwrap();
        assert_eq!(ergebnis.variante, ProtokollVariante::ClientQuery);
        assert_eq!(ergebnis.schandler_id, Some(SchandlerId(42)));
    }

    #[test]
    fn gemeinsamer_prefix_ist_mehrdeutig() {
        let mut b = begruessung();
        let mut puffer = BytesMut::from("TS3");
        assert!(b.verarbeiten(&mut puffer).unwrap().is_none());
        assert_eq!(b.zustand(), VerbindungsZustand::WarteAufBanner);

        puffer.extend_from_slice(b" Cl");
        assert!(b.verarbeiten(&mut puffer).unwrap().is_none());
        assert_eq!(b.zustand(), VerbindungsZustand::VarianteErkennen);
    }

    #[test]
    fn banner_ohne_gross_kleinschreibung() {
        let mut b = begruessung();
        let mut puffer = BytesMut::from(format!("ts3\n\r{WILLKOMMEN_SQ}").as_str());
        assert!(b.verarbeiten(&mut puffer).unwrap().is_some());
    }

    #[test]
    fn unbekanntes_banner_scheitert() {
        let mut b = begruessung();
        let mut puffer = BytesMut::from("SSH-2.0-OpenSSH\r\n");
        let fehler = b.verarbeiten(&mut puffer).unwrap_err();
        assert!(matches!(fehler, QueryError::BegruessungFehlgeschlagen(_)));
        assert!(!b.ist_fertig());
    }

    #[test]
    fn falsches_banner_in_stuecken_scheitert() {
        let mut b = begruessung();
        let mut puffer = BytesMut::from("TS3 C");
        assert!(b.verarbeiten(&mut puffer).unwrap().is_none());
        assert_eq!(b.zustand(), VerbindungsZustand::VarianteErkennen);

        puffer.extend_from_slice(b"xxxxx\n\rirgendwas\n\rselected schandlerid=7\n\r");
        let fehler = b.verarbeiten(&mut puffer).unwrap_err();
        assert!(matches!(fehler, QueryError::BegruessungFehlgeschlagen(_)));
        assert!(!b.ist_fertig());
    }

    #[test]
    fn abweichung_im_banner_scheitert_sofort() {
        let mut b = begruessung();
        let mut puffer = BytesMut::from("TS3 C");
        assert!(b.verarbeiten(&mut puffer).unwrap().is_none());

        // Noch kuerzer als das Banner, aber schon unpassend
        puffer.extend_from_slice(b"lX");
        let fehler = b.verarbeiten(&mut puffer).unwrap_err();
        assert!(matches!(fehler, QueryError::BegruessungFehlgeschlagen(_)));
    }

    #[test]
    fn client_query_ohne_schandler_zeile_scheitert() {
        let mut b = begruessung();
        let mut puffer =
            BytesMut::from(format!("{CLIENT_QUERY_BANNER}{WILLKOMMEN_CQ}error id=0 msg=ok\n\r").as_str());
        let fehler = b.verarbeiten(&mut puffer).unwrap_err();
        assert!(matches!(fehler, QueryError::BegruessungFehlgeschlagen(_)));
    }

    #[test]
    fn server_query_ban_direkt_nach_banner() {
        let mut b = begruessung();
        let text = format!(
            "{SERVER_QUERY_BANNER}{WILLKOMMEN_SQ}error id=3329 msg=connection\\sfailed,\\syou\\sare\\sbanned extra_msg=you\\smay\\sretry\\sin\\s60\\sseconds\n\r"
        );
        let mut puffer = BytesMut::from(text.as_str());
        match b.verarbeiten(&mut puffer) {
            Err(QueryError::Gebannt(ban)) => {
                assert_eq!(ban.id, 3329);
                assert_eq!(ban.dauer_sek, Some(60));
            }
            other => panic!("Erwartet Ban, erhalten: {other:?}"),
        }
    }

    #[test]
    fn rest_nach_begruessung_bleibt_im_puffer() {
        let mut b = begruessung();
        let text = format!("{SERVER_QUERY_BANNER}{WILLKOMMEN_SQ}notifytextmessage msg=hi\n\r");
        let mut puffer = BytesMut::from(text.as_str());
        assert!(b.verarbeiten(&mut puffer).unwrap().is_some());
        assert_eq!(&puffer[..], b"notifytextmessage msg=hi\n\r");
    }
}
