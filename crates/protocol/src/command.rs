//! Ausgehende Befehle
//!
//! Format: `name gruppe1|gruppe2|... -option1 -option2`
//!
//! Der Name wird kleingeschrieben, Parameter einer Gruppe durch Leerzeichen,
//! Gruppen durch `|` getrennt. Optionen werden mit `-` angehaengt.

use crate::params::{Parameter, ParameterGruppe, ParameterListe};

/// Ein ausgehender Befehl
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Befehl {
    name: String,
    gruppen: Vec<ParameterGruppe>,
    optionen: Vec<String>,
}

impl Befehl {
    /// Erstellt einen Befehl ohne Parameter
    pub fn neu(name: impl Into<String>) -> Self {
        Self {
            name: name.into().to_lowercase(),
            gruppen: Vec::new(),
            optionen: Vec::new(),
        }
    }

    /// Fuegt einen Parameter zur letzten Gruppe hinzu (legt bei Bedarf die erste an)
    pub fn mit(mut self, name: &str, wert: impl ToString) -> Self {
        self.letzte_gruppe().hinzufuegen(Parameter::neu(name, wert.to_string()));
        self
    }

    /// Fuegt einen Parameter nur hinzu wenn ein Wert vorhanden ist
    pub fn mit_optional<T: ToString>(self, name: &str, wert: Option<T>) -> Self {
        match wert {
            Some(w) => self.mit(name, w),
            None => self,
        }
    }

    /// Fuegt einen rohen Parameter ohne Wert hinzu
    pub fn mit_roh(mut self, roh: impl Into<String>) -> Self {
        self.letzte_gruppe().hinzufuegen(Parameter::roh(roh));
        self
    }

    /// Beginnt eine neue Parametergruppe (Batch-Befehle)
    pub fn neue_gruppe(mut self) -> Self {
        self.gruppen.push(ParameterGruppe::neu());
        self
    }

    /// Haengt eine fertige Gruppe an
    pub fn mit_gruppe(mut self, gruppe: ParameterGruppe) -> Self {
        self.gruppen.push(gruppe);
        self
    }

    /// Fuegt eine Option hinzu (`-name`)
    pub fn mit_option(mut self, option: impl Into<String>) -> Self {
        self.optionen.push(option.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn gruppen(&self) -> &[ParameterGruppe] {
        &self.gruppen
    }

    pub fn optionen(&self) -> &[String] {
        &self.optionen
    }

    fn letzte_gruppe(&mut self) -> &mut ParameterGruppe {
        if self.gruppen.is_empty() {
            self.gruppen.push(ParameterGruppe::neu());
        }
        let letzte = self.gruppen.len() - 1;
        &mut self.gruppen[letzte]
    }

    /// Kodiert den Befehl ohne Zeilenende
    pub fn kodieren(&self) -> String {
        let mut text = self.name.clone();

        let gruppen = self
            .gruppen
            .iter()
            .map(ParameterGruppe::kodieren)
            .collect::<Vec<_>>()
            .join("|");
        if !gruppen.is_empty() {
            text.push(' ');
            text.push_str(&gruppen);
        }

        for option in &self.optionen {
            text.push_str(" -");
            text.push_str(option);
        }
        text
    }

    /// Parst einen kodierten Befehl zurueck
    ///
    /// Das erste Token ist der Name, wertlose Tokens mit `-` am Ende der
    /// letzten Gruppe sind Optionen.
    pub fn parsen(text: &str) -> Option<Self> {
        let text = text.trim();
        let (name, rest) = match text.split_once(char::is_whitespace) {
            Some((name, rest)) => (name, rest),
            None => (text, ""),
        };
        if name.is_empty() {
            return None;
        }

        let mut gruppen: Vec<ParameterGruppe> = ParameterListe::dekodieren(rest).into_iter().collect();
        let mut optionen = Vec::new();

        if let Some(letzte) = gruppen.last_mut() {
            let mut parameter: Vec<Parameter> = letzte.iter().cloned().collect();
            while let Some(option) = parameter
                .last()
                .filter(|p| p.wert.is_none())
                .and_then(|p| p.name.strip_prefix('-'))
                .filter(|o| !o.is_empty())
                .map(str::to_string)
            {
                optionen.insert(0, option);
                parameter.pop();
            }
            *letzte = parameter.into_iter().collect();
        }
        if gruppen.len() == 1 && gruppen[0].is_empty() {
            gruppen.clear();
        }

        Some(Self {
            name: name.to_lowercase(),
            gruppen,
            optionen,
        })
    }
}

impl std::fmt::Display for Befehl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.kodieren())
    }
}
