//! Parametergruppen
//!
//! Eine Antwort besteht aus geordneten Gruppen (`|`-getrennt), jede Gruppe
//! aus Parametern (whitespace-getrennt) der Form `name=wert` oder nur `name`.
//!
//! Typisierter Zugriff laeuft ueber [`QueryWert`]. Flags werden als `1`/`0`
//! uebertragen und muessen genau so als `bool` gelesen werden.

use tsquery_core::{QueryError, Result};

use crate::escape::{escape, unescape};

/// Trennzeichen zwischen Gruppen
pub const GRUPPEN_TRENNER: char = '|';

/// Ein einzelner Parameter
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Parameter {
    pub name: String,
    /// `None` = Parameter ohne Wert (roher Parameter)
    pub wert: Option<String>,
}

impl Parameter {
    /// Parameter mit Wert
    pub fn neu(name: impl Into<String>, wert: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            wert: Some(wert.into()),
        }
    }

    /// Parameter ohne Wert, z.B. rohe Snapshot-Daten
    pub fn roh(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            wert: None,
        }
    }

    /// Kodiert den Parameter fuer die Uebertragung
    pub fn kodieren(&self) -> String {
        match &self.wert {
            Some(wert) => format!("{}={}", self.name, escape(wert)),
            None => escape(&self.name),
        }
    }

    /// Parst ein einzelnes Token (`name=wert` oder `name`)
    pub fn parsen(token: &str) -> Self {
        match token.split_once('=') {
            Some((name, wert)) => Self::neu(name, unescape(wert)),
            None => Self::roh(unescape(token)),
        }
    }
}

/// Geordnete Menge von Parametern (ein Datensatz)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParameterGruppe {
    parameter: Vec<Parameter>,
}

impl ParameterGruppe {
    pub fn neu() -> Self {
        Self::default()
    }

    /// Haengt einen Parameter an (Einfuegereihenfolge bleibt erhalten)
    pub fn hinzufuegen(&mut self, parameter: Parameter) {
        self.parameter.push(parameter);
    }

    /// Setzt einen Wert: ersetzt den ersten gleichnamigen Parameter oder haengt an
    pub fn setzen(&mut self, name: &str, wert: impl Into<String>) {
        let wert = wert.into();
        match self.parameter.iter_mut().find(|p| p.name == name) {
            Some(p) => p.wert = Some(wert),
            None => self.parameter.push(Parameter::neu(name, wert)),
        }
    }

    /// Erster Parameter mit diesem Namen
    pub fn parameter(&self, name: &str) -> Option<&Parameter> {
        self.parameter.iter().find(|p| p.name == name)
    }

    /// Roher Wert (unescaped) des ersten Parameters mit diesem Namen
    pub fn roh_wert(&self, name: &str) -> Option<&str> {
        self.parameter(name).and_then(|p| p.wert.as_deref())
    }

    /// Typisierter Wert; `None` wenn nicht vorhanden oder nicht konvertierbar
    pub fn wert<T: QueryWert>(&self, name: &str) -> Option<T> {
        self.roh_wert(name).and_then(T::aus_query)
    }

    pub fn enthaelt(&self, name: &str) -> bool {
        self.parameter(name).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Parameter> {
        self.parameter.iter()
    }

    pub fn len(&self) -> usize {
        self.parameter.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parameter.is_empty()
    }

    /// Kodiert die Gruppe (Parameter durch Leerzeichen getrennt)
    pub fn kodieren(&self) -> String {
        self.parameter
            .iter()
            .map(Parameter::kodieren)
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Parst eine Gruppe; Whitespace-Folgen trennen Parameter
    pub fn parsen(text: &str) -> Self {
        Self {
            parameter: text.split_whitespace().map(Parameter::parsen).collect(),
        }
    }
}

impl FromIterator<Parameter> for ParameterGruppe {
    fn from_iter<I: IntoIterator<Item = Parameter>>(iter: I) -> Self {
        Self {
            parameter: iter.into_iter().collect(),
        }
    }
}

/// Geordnete Liste von Parametergruppen (dekodierter Antwort-Rumpf)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParameterListe {
    gruppen: Vec<ParameterGruppe>,
}

impl ParameterListe {
    pub fn neu() -> Self {
        Self::default()
    }

    /// Dekodiert einen Antwort-Rumpf
    ///
    /// Leere Eingabe ergibt eine leere Liste, keinen Fehler.
    pub fn dekodieren(text: &str) -> Self {
        let text = text.trim_matches(|c: char| c == '\n' || c == '\r');
        if text.trim().is_empty() {
            return Self::default();
        }
        Self {
            gruppen: text.split(GRUPPEN_TRENNER).map(ParameterGruppe::parsen).collect(),
        }
    }

    /// Kodiert alle Gruppen (`|`-getrennt)
    pub fn kodieren(&self) -> String {
        self.gruppen
            .iter()
            .map(ParameterGruppe::kodieren)
            .collect::<Vec<_>>()
            .join("|")
    }

    pub fn gruppen(&self) -> &[ParameterGruppe] {
        &self.gruppen
    }

    pub fn gruppe(&self, index: usize) -> Option<&ParameterGruppe> {
        self.gruppen.get(index)
    }

    pub fn len(&self) -> usize {
        self.gruppen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.gruppen.is_empty()
    }

    /// Typisierter Wert aus der ersten Gruppe
    pub fn wert<T: QueryWert>(&self, name: &str) -> Option<T> {
        self.wert_in(0, name)
    }

    /// Typisierter Wert aus einer bestimmten Gruppe
    ///
    /// Ein Index jenseits der Liste gilt als "nicht gefunden".
    pub fn wert_in<T: QueryWert>(&self, gruppe: usize, name: &str) -> Option<T> {
        self.gruppen.get(gruppe).and_then(|g| g.wert(name))
    }

    /// Typisierter Wert mit Standardwert des Aufrufers
    pub fn wert_oder<T: QueryWert>(&self, name: &str, standard: T) -> T {
        self.wert(name).unwrap_or(standard)
    }

    /// Wie [`Self::wert`], aber ein vorhandener, nicht konvertierbarer Wert ist ein Fehler
    pub fn wert_pflicht<T: QueryWert>(&self, gruppe: usize, name: &str) -> Result<Option<T>> {
        match self.gruppen.get(gruppe).and_then(|g| g.roh_wert(name)) {
            None => Ok(None),
            Some(roh) => T::aus_query(roh)
                .map(Some)
                .ok_or_else(|| QueryError::Konvertierung {
                    name: name.to_string(),
                    wert: roh.to_string(),
                }),
        }
    }

    /// Setzt einen Wert in einer Gruppe
    ///
    /// Ein Index gleich der aktuellen Anzahl legt genau eine neue Gruppe an,
    /// alles darueber ist ein Fehler.
    pub fn setzen(&mut self, gruppe: usize, name: &str, wert: impl Into<String>) -> Result<()> {
        self.gruppe_zum_schreiben(gruppe)?.setzen(name, wert);
        Ok(())
    }

    /// Haengt einen Parameter an eine Gruppe an (gleiche Index-Regel wie [`Self::setzen`])
    pub fn anhaengen(&mut self, gruppe: usize, parameter: Parameter) -> Result<()> {
        self.gruppe_zum_schreiben(gruppe)?.hinzufuegen(parameter);
        Ok(())
    }

    fn gruppe_zum_schreiben(&mut self, gruppe: usize) -> Result<&mut ParameterGruppe> {
        let anzahl = self.gruppen.len();
        if gruppe > anzahl {
            return Err(QueryError::UngueltigerIndex {
                index: gruppe,
                anzahl,
            });
        }
        if gruppe == anzahl {
            self.gruppen.push(ParameterGruppe::neu());
        }
        Ok(&mut self.gruppen[gruppe])
    }
}

impl From<Vec<ParameterGruppe>> for ParameterListe {
    fn from(gruppen: Vec<ParameterGruppe>) -> Self {
        Self { gruppen }
    }
}

impl IntoIterator for ParameterListe {
    type Item = ParameterGruppe;
    type IntoIter = std::vec::IntoIter<ParameterGruppe>;

    fn into_iter(self) -> Self::IntoIter {
        self.gruppen.into_iter()
    }
}

// ---------------------------------------------------------------------------
// Typkonvertierung
// ---------------------------------------------------------------------------

/// Konvertierung eines unescapten Protokollwerts in einen primitiven Typ
pub trait QueryWert: Sized {
    fn aus_query(roh: &str) -> Option<Self>;
}

impl QueryWert for String {
    fn aus_query(roh: &str) -> Option<Self> {
        Some(roh.to_string())
    }
}

impl QueryWert for bool {
    fn aus_query(roh: &str) -> Option<Self> {
        match roh {
            "1" => Some(true),
            "0" => Some(false),
            _ => None,
        }
    }
}

macro_rules! query_wert_zahl {
    ($($t:ty),*) => {
        $(
            impl QueryWert for $t {
                fn aus_query(roh: &str) -> Option<Self> {
                    roh.trim().parse().ok()
                }
            }
        )*
    };
}

query_wert_zahl!(u8, u16, u32, u64, usize, i8, i16, i32, i64, f32, f64);
