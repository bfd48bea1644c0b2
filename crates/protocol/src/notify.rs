//! Benachrichtigungs-Frames
//!
//! Format: `notify<ereignis> key=value ...` – der Rest nach dem Namen wird
//! mit der normalen Gruppen-Grammatik dekodiert.

use crate::params::ParameterListe;

/// Prefix jeder Benachrichtigung
pub const BENACHRICHTIGUNGS_PREFIX: &str = "notify";

/// Eine dekodierte Benachrichtigung
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Benachrichtigung {
    /// Vollstaendiger Name, z.B. `notifycliententerview`
    pub name: String,
    pub parameter: ParameterListe,
}

impl Benachrichtigung {
    /// Parst einen rohen Frame; `None` wenn er nicht mit `notify` beginnt
    pub fn parsen(roh: &str) -> Option<Self> {
        let roh = roh.trim();
        if !ist_benachrichtigung(roh) {
            return None;
        }
        let (name, rest) = match roh.split_once(char::is_whitespace) {
            Some((name, rest)) => (name, rest),
            None => (roh, ""),
        };
        Some(Self {
            name: name.to_string(),
            parameter: ParameterListe::dekodieren(rest),
        })
    }

    /// Name ohne `notify`-Prefix, z.B. `cliententerview`
    pub fn ereignis(&self) -> &str {
        self.name
            .strip_prefix(BENACHRICHTIGUNGS_PREFIX)
            .unwrap_or(&self.name)
    }
}

/// Prueft ob eine Zeile eine Benachrichtigung ist
pub fn ist_benachrichtigung(zeile: &str) -> bool {
    zeile.starts_with(BENACHRICHTIGUNGS_PREFIX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_betritt_sicht() {
        let roh = "notifycliententerview cfid=0 ctid=1 reasonid=0 clid=5 client_nickname=Gast\\s1\n\r";
        let b = Benachrichtigung::parsen(roh).unwrap();
        assert_eq!(b.name, "notifycliententerview");
        assert_eq!(b.ereignis(), "cliententerview");
        assert_eq!(b.parameter.wert::<u32>("clid"), Some(5));
        assert_eq!(
            b.parameter.wert::<String>("client_nickname").as_deref(),
            Some("Gast 1")
        );
    }

    #[test]
    fn benachrichtigung_ohne_parameter() {
        let b = Benachrichtigung::parsen("notifyserverstopped").unwrap();
        assert_eq!(b.name, "notifyserverstopped");
        assert!(b.parameter.is_empty());
    }

    #[test]
    fn kein_notify_prefix() {
        assert!(Benachrichtigung::parsen("error id=0 msg=ok").is_none());
    }
}
