//! Statuszeilen
//!
//! Jede Antwort endet mit genau einer Zeile `error id=<n> msg=<text> ...`.
//! `id=0` bedeutet Erfolg. Einige Codes signalisieren einen Ban und tragen
//! zusaetzlich `extra_msg` (und je nach Server eine Ban-Dauer).
//!
//! Das Parsen ist bewusst tolerant: fehlende oder kaputte Felder ergeben
//! Standardwerte statt eines Fehlers.

use tsquery_core::BanInfo;

use crate::params::ParameterGruppe;

/// Prefix einer Statuszeile
pub const STATUS_PREFIX: &str = "error id=";

/// "connection failed, you are banned"
pub const BAN_CODE: u32 = 3329;

/// "flood ban"
pub const FLOOD_BAN_CODE: u32 = 3331;

/// Standardmenge der Ban-Codes (konfigurierbar im Client)
pub const STANDARD_BAN_CODES: [u32; 2] = [BAN_CODE, FLOOD_BAN_CODE];

/// Geparste Statuszeile
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Status {
    pub id: u32,
    pub msg: String,
    pub extra_msg: Option<String>,
    pub failed_permid: Option<u32>,
    /// Alle Felder der Zeile (inkl. der oben gezogenen)
    pub felder: ParameterGruppe,
}

impl Status {
    /// Parst eine Statuszeile; fehlende Felder werden zu Standardwerten
    pub fn parsen(zeile: &str) -> Self {
        let zeile = zeile.trim();
        let rumpf = zeile.strip_prefix("error").unwrap_or(zeile);
        let felder = ParameterGruppe::parsen(rumpf);

        Self {
            id: felder.wert("id").unwrap_or_default(),
            msg: felder.wert("msg").unwrap_or_default(),
            extra_msg: felder.wert("extra_msg"),
            failed_permid: felder.wert("failed_permid"),
            felder,
        }
    }

    /// Sucht die Statuszeile in einem Antworttext und parst sie
    pub fn aus_antwort(text: &str) -> Option<Self> {
        text.split(|c: char| c == '\n' || c == '\r')
            .map(str::trim)
            .find(|zeile| zeile.starts_with(STATUS_PREFIX))
            .map(Self::parsen)
    }

    pub fn ist_erfolg(&self) -> bool {
        self.id == 0
    }

    /// Prueft gegen eine Menge von Ban-Codes und liefert die Ban-Details
    pub fn ban_info(&self, ban_codes: &[u32]) -> Option<BanInfo> {
        if !ban_codes.contains(&self.id) {
            return None;
        }
        Some(BanInfo {
            id: self.id,
            nachricht: self.msg.clone(),
            extra_nachricht: self.extra_msg.clone(),
            dauer_sek: self.ban_dauer(),
        })
    }

    /// Ban-Dauer aus einem expliziten Feld oder aus `extra_msg`
    /// ("you may retry in 600 seconds")
    fn ban_dauer(&self) -> Option<u64> {
        self.felder
            .wert::<u64>("ban_duration")
            .or_else(|| self.felder.wert::<u64>("bantime"))
            .or_else(|| self.extra_msg.as_deref().and_then(dauer_aus_text))
    }
}

fn dauer_aus_text(text: &str) -> Option<u64> {
    let rest = &text[text.find("retry in")? + "retry in".len()..];
    let ziffern: String = rest
        .trim_start()
        .chars()
        .take_while(char::is_ascii_digit)
        .collect();
    ziffern.parse().ok()
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "id={} msg={}", self.id, self.msg)
    }
}
