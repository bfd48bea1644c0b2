//! Typisierte Sicht auf einen Antworttext
//!
//! Der Dispatcher liefert Rumpf und Statuszeile unveraendert. Erst hier
//! wird beides getrennt dekodiert.

use tsquery_core::{QueryError, Result};
use tsquery_protocol::params::{ParameterListe, QueryWert};
use tsquery_protocol::status::{Status, STATUS_PREFIX};
use tsquery_protocol::wire::ZEILENENDE;

/// Dekodierte Antwort: Rumpf-Gruppen und Statuszeile
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryAntwort {
    pub rumpf: ParameterListe,
    pub status: Status,
}

impl QueryAntwort {
    /// Zerlegt den Antworttext
    ///
    /// Fehlt die Statuszeile, bleibt der Status auf Standardwerten.
    pub fn aus_text(text: &str) -> Self {
        let mut rumpf = Vec::new();
        let mut status = None;

        for zeile in text
            .split(ZEILENENDE)
            .map(|z| z.trim_matches(|c: char| c == '\n' || c == '\r'))
            .filter(|z| !z.is_empty())
        {
            if zeile.starts_with(STATUS_PREFIX) {
                status = Some(Status::parsen(zeile));
            } else {
                rumpf.push(zeile);
            }
        }

        if status.is_none() {
            tracing::debug!("Antwort ohne Statuszeile");
        }

        Self {
            rumpf: ParameterListe::dekodieren(&rumpf.join("")),
            status: status.unwrap_or_default(),
        }
    }

    /// Wandelt einen Fehlerstatus in [`QueryError::Befehlsfehler`]
    pub fn pruefen(self) -> Result<Self> {
        if self.status.ist_erfolg() {
            Ok(self)
        } else {
            Err(QueryError::Befehlsfehler {
                id: self.status.id,
                msg: self.status.msg.clone(),
            })
        }
    }

    /// Typisierter Wert aus der ersten Rumpf-Gruppe
    pub fn wert<T: QueryWert>(&self, name: &str) -> Option<T> {
        self.rumpf.wert(name)
    }
}
