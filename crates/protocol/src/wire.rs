//! Wire-Format fuer Query-Verbindungen
//!
//! Zeilenbasiertes Textprotokoll. Der Server trennt Zeilen mit `\n\r`,
//! der Client schliesst jeden Befehl mit `\n` ab.
//!
//! ## Frames
//!
//! ```text
//! notify<name> k=v ...\n\r                      -> Benachrichtigung
//! [rumpf\n\r ...] error id=<n> msg=...\n\r      -> Antwort
//! ```
//!
//! Der Server schiebt Benachrichtigungen gelegentlich mitten in eine
//! Antwort (zwischen Rumpf und Statuszeile). Solche Zeilen werden als
//! eigene Benachrichtigung ausgegeben und die Antwort ohne sie
//! zusammengesetzt.

use std::collections::VecDeque;
use std::io;

use bytes::{Buf, BufMut, BytesMut};
use tokio_util::codec::{Decoder, Encoder};
use tsquery_core::QueryError;

use crate::handshake::{Begruessung, BegruessungsErgebnis};
use crate::notify::BENACHRICHTIGUNGS_PREFIX;
use crate::status::STATUS_PREFIX;

// ---------------------------------------------------------------------------
// Konstanten
// ---------------------------------------------------------------------------

/// Zeilenende in Server-Nachrichten
pub const ZEILENENDE: &str = "\n\r";

/// Abschluss jedes gesendeten Befehls
pub const BEFEHLS_ENDE: &str = "\n";

/// Standard-Obergrenze fuer unvollstaendige Daten im Puffer (1 MB)
pub const DEFAULT_MAX_PUFFER: usize = 1024 * 1024;

// ---------------------------------------------------------------------------
// Zeilen-Hilfsfunktionen
// ---------------------------------------------------------------------------

/// Position des ersten Zeilenendes
pub fn finde_zeilenende(puffer: &[u8]) -> Option<usize> {
    puffer
        .windows(ZEILENENDE.len())
        .position(|w| w == ZEILENENDE.as_bytes())
}

/// Sucht die erste vollstaendige Statuszeile
///
/// Gibt `(anfang, ende)` zurueck, wobei `ende` auf das abschliessende
/// Zeilenende zeigt. Eine Statuszeile zaehlt nur am Zeilenanfang.
pub fn finde_statuszeile(puffer: &[u8]) -> Option<(usize, usize)> {
    let mut pos = 0;
    while pos < puffer.len() {
        let rest = &puffer[pos..];
        let zeilenende = finde_zeilenende(rest).map(|e| pos + e);
        if rest.starts_with(STATUS_PREFIX.as_bytes()) {
            return zeilenende.map(|ende| (pos, ende));
        }
        pos = zeilenende? + ZEILENENDE.len();
    }
    None
}

// ---------------------------------------------------------------------------
// QueryCodec
// ---------------------------------------------------------------------------

/// Ein vollstaendiger Frame aus dem Empfangsstrom
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryFrame {
    /// Handshake abgeschlossen
    Begruessung(BegruessungsErgebnis),
    /// `notify...`-Zeile ohne Zeilenende
    Benachrichtigung(String),
    /// Rumpf + Statuszeile, jeweils mit `\n\r` abgeschlossen
    Antwort(String),
}

/// tokio-util Codec fuer den Lese-Loop einer Query-Verbindung
///
/// Fuehrt zuerst die [`Begruessung`] durch und zerlegt danach den
/// Empfangspuffer in Benachrichtigungen und Antworten.
#[derive(Debug)]
pub struct QueryCodec {
    begruessung: Option<Begruessung>,
    ausstehend: VecDeque<QueryFrame>,
    max_puffer: usize,
}

impl QueryCodec {
    /// Codec mit vorgeschaltetem Handshake
    pub fn new(ban_codes: impl Into<Vec<u32>>) -> Self {
        Self {
            begruessung: Some(Begruessung::neu(ban_codes)),
            ausstehend: VecDeque::new(),
            max_puffer: DEFAULT_MAX_PUFFER,
        }
    }

    /// Codec fuer eine bereits begruesste Verbindung
    pub fn ohne_begruessung() -> Self {
        Self {
            begruessung: None,
            ausstehend: VecDeque::new(),
            max_puffer: DEFAULT_MAX_PUFFER,
        }
    }

    /// Setzt die Obergrenze fuer unvollstaendige Daten
    pub fn with_max_puffer(mut self, max_puffer: usize) -> Self {
        self.max_puffer = max_puffer;
        self
    }

    /// Gibt true zurueck solange der Handshake laeuft
    pub fn begruessung_laeuft(&self) -> bool {
        self.begruessung.is_some()
    }

    /// Zerlegt hoechstens einen Frame vom Pufferanfang in `ausstehend`
    fn frame_abtrennen(&mut self, src: &mut BytesMut) -> Result<(), QueryError> {
        // Verirrte Zeilenenden zwischen Frames ignorieren
        let fuehrend = src
            .iter()
            .take_while(|b| matches!(b, b'\n' | b'\r'))
            .count();
        src.advance(fuehrend);

        if src.starts_with(BENACHRICHTIGUNGS_PREFIX.as_bytes()) {
            if let Some(ende) = finde_zeilenende(src) {
                let zeile = src.split_to(ende + ZEILENENDE.len());
                let text = String::from_utf8_lossy(&zeile[..ende]).into_owned();
                tracing::trace!(frame = %text, "Benachrichtigung getrennt");
                self.ausstehend.push_back(QueryFrame::Benachrichtigung(text));
                return Ok(());
            }
        } else if let Some((_, ende)) = finde_statuszeile(src) {
            let frame = src.split_to(ende + ZEILENENDE.len());
            self.antwort_zerlegen(&String::from_utf8_lossy(&frame));
            return Ok(());
        }

        if src.len() > self.max_puffer {
            return Err(QueryError::socket(io::Error::new(
                io::ErrorKind::InvalidData,
                format!(
                    "Unvollstaendiger Frame zu gross: {} Bytes (Maximum: {} Bytes)",
                    src.len(),
                    self.max_puffer
                ),
            )));
        }
        Ok(())
    }

    /// Trennt eingebettete Benachrichtigungen aus einem Antwort-Frame
    fn antwort_zerlegen(&mut self, frame: &str) {
        let mut antwort = String::with_capacity(frame.len());
        for zeile in frame.split(ZEILENENDE).filter(|z| !z.is_empty()) {
            if zeile.starts_with(BENACHRICHTIGUNGS_PREFIX) {
                tracing::debug!(frame = %zeile, "Eingebettete Benachrichtigung in Antwort");
                self.ausstehend
                    .push_back(QueryFrame::Benachrichtigung(zeile.to_string()));
            } else {
                antwort.push_str(zeile);
                antwort.push_str(ZEILENENDE);
            }
        }
        tracing::trace!(laenge = antwort.len(), "Antwort getrennt");
        self.ausstehend.push_back(QueryFrame::Antwort(antwort));
    }
}

impl Decoder for QueryCodec {
    type Item = QueryFrame;
    type Error = QueryError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if let Some(frame) = self.ausstehend.pop_front() {
            return Ok(Some(frame));
        }

        if let Some(begruessung) = self.begruessung.as_mut() {
            return match begruessung.verarbeiten(src)? {
                Some(ergebnis) => {
                    self.begruessung = None;
                    Ok(Some(QueryFrame::Begruessung(ergebnis)))
                }
                None => Ok(None),
            };
        }

        self.frame_abtrennen(src)?;
        Ok(self.ausstehend.pop_front())
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        match self.decode(src)? {
            Some(frame) => Ok(Some(frame)),
            None => {
                if !src.is_empty() {
                    tracing::debug!(rest = src.len(), "Unvollstaendige Daten bei Verbindungsende verworfen");
                    src.clear();
                }
                Ok(None)
            }
        }
    }
}

impl Encoder<&str> for QueryCodec {
    type Error = QueryError;

    fn encode(&mut self, befehl: &str, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let befehl = befehl.trim_end_matches(|c: char| c == '\n' || c == '\r');
        dst.reserve(befehl.len() + BEFEHLS_ENDE.len());
        dst.put_slice(befehl.as_bytes());
        dst.put_slice(BEFEHLS_ENDE.as_bytes());
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handshake::SERVER_QUERY_BANNER;
    use crate::status::STANDARD_BAN_CODES;
    use proptest::prelude::*;
    use tsquery_core::ProtokollVariante;

    const STROM: &str = concat!(
        "notifycliententerview clid=1 client_nickname=a\n\r",
        "notifyclientleftview clid=2\n\r",
        "clid=1 client_nickname=a\n\r",
        "notifytextmessage targetmode=3 msg=hi\n\r",
        "error id=0 msg=ok\n\r",
        "virtualserver_name=Test\n\r",
        "error id=0 msg=ok\n\r",
    );

    fn alle_frames(codec: &mut QueryCodec, puffer: &mut BytesMut) -> Vec<QueryFrame> {
        let mut frames = Vec::new();
        while let Some(frame) = codec.decode(puffer).unwrap() {
            frames.push(frame);
        }
        frames
    }

    fn erwartete_frames() -> Vec<QueryFrame> {
        vec![
            QueryFrame::Benachrichtigung("notifycliententerview clid=1 client_nickname=a".into()),
            QueryFrame::Benachrichtigung("notifyclientleftview clid=2".into()),
            QueryFrame::Benachrichtigung("notifytextmessage targetmode=3 msg=hi".into()),
            QueryFrame::Antwort("clid=1 client_nickname=a\n\rerror id=0 msg=ok\n\r".into()),
            QueryFrame::Antwort("virtualserver_name=Test\n\rerror id=0 msg=ok\n\r".into()),
        ]
    }

    #[test]
    fn statuszeile_nur_am_zeilenanfang() {
        assert!(finde_statuszeile(b"msg=xerror id=0\n\r").is_none());
        assert_eq!(finde_statuszeile(b"a=1\n\rerror id=0\n\r"), Some((5, 15)));
        assert!(finde_statuszeile(b"a=1\n\rerror id=0 msg=o").is_none());
    }

    #[test]
    fn strom_am_stueck() {
        let mut codec = QueryCodec::ohne_begruessung();
        let mut puffer = BytesMut::from(STROM);
        assert_eq!(alle_frames(&mut codec, &mut puffer), erwartete_frames());
        assert!(puffer.is_empty());
    }

    #[test]
    fn unvollstaendige_antwort_wartet() {
        let mut codec = QueryCodec::ohne_begruessung();
        let mut puffer = BytesMut::from("virtualserver_name=Test\n\rerror id=0 msg=o");
        assert!(codec.decode(&mut puffer).unwrap().is_none());
        puffer.extend_from_slice(b"k\n\r");
        assert_eq!(
            codec.decode(&mut puffer).unwrap(),
            Some(QueryFrame::Antwort(
                "virtualserver_name=Test\n\rerror id=0 msg=ok\n\r".into()
            ))
        );
    }

    #[test]
    fn begruessung_vor_frames() {
        let mut codec = QueryCodec::new(STANDARD_BAN_CODES);
        let text = format!(
            "{SERVER_QUERY_BANNER}Welcome to the TeamSpeak 3 ServerQuery interface.\n\rnotifyserveredited reasonid=10\n\r"
        );
        let mut puffer = BytesMut::from(text.as_str());
        let frames = alle_frames(&mut codec, &mut puffer);
        assert_eq!(frames.len(), 2);
        assert!(matches!(
            frames[0],
            QueryFrame::Begruessung(BegruessungsErgebnis {
                variante: ProtokollVariante::ServerQuery,
                schandler_id: None
            })
        ));
        assert_eq!(
            frames[1],
            QueryFrame::Benachrichtigung("notifyserveredited reasonid=10".into())
        );
    }

    #[test]
    fn zu_grosser_unvollstaendiger_frame() {
        let mut codec = QueryCodec::ohne_begruessung().with_max_puffer(16);
        let mut puffer = BytesMut::from("a=1234567890123456789012345");
        assert!(codec.decode(&mut puffer).is_err());
    }

    #[test]
    fn eof_verwirft_rest() {
        let mut codec = QueryCodec::ohne_begruessung();
        let mut puffer = BytesMut::from("a=1");
        assert!(codec.decode_eof(&mut puffer).unwrap().is_none());
        assert!(puffer.is_empty());
    }

    #[test]
    fn befehl_mit_zeilenende_kodieren() {
        let mut codec = QueryCodec::ohne_begruessung();
        let mut puffer = BytesMut::new();
        codec.encode("serverinfo", &mut puffer).unwrap();
        assert_eq!(&puffer[..], b"serverinfo\n");
    }

    proptest! {
        #[test]
        fn beliebige_zerstueckelung_ergibt_gleiche_frames(
            schnitte in prop::collection::vec(1usize..40, 0..30)
        ) {
            let bytes = STROM.as_bytes();
            let mut codec = QueryCodec::ohne_begruessung();
            let mut puffer = BytesMut::new();
            let mut frames = Vec::new();
            let mut pos = 0;
            for schnitt in schnitte.into_iter().chain(std::iter::once(bytes.len())) {
                let ende = (pos + schnitt).min(bytes.len());
                puffer.extend_from_slice(&bytes[pos..ende]);
                pos = ende;
                frames.extend(alle_frames(&mut codec, &mut puffer));
            }
            prop_assert_eq!(frames, erwartete_frames());
        }
    }
}
