//! Escaping reservierter Zeichen
//!
//! Werte duerfen keine Trennzeichen des Protokolls enthalten. Ersetzt werden:
//!   `\\` -> `\\\\`, `/` -> `\/`, Leerzeichen -> `\s`, `|` -> `\p`,
//!   sowie die Steuerzeichen `\a \b \f \n \r \t \v`.

/// Kodiert einen Wert fuer die Uebertragung (Escape-Sequenzen einfuegen)
pub fn escape(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '\\' => result.push_str("\\\\"),
            '/' => result.push_str("\\/"),
            ' ' => result.push_str("\\s"),
            '|' => result.push_str("\\p"),
            '\u{07}' => result.push_str("\\a"),
            '\u{08}' => result.push_str("\\b"),
            '\u{0C}' => result.push_str("\\f"),
            '\n' => result.push_str("\\n"),
            '\r' => result.push_str("\\r"),
            '\t' => result.push_str("\\t"),
            '\u{0B}' => result.push_str("\\v"),
            other => result.push(other),
        }
    }
    result
}

/// Dekodiert Escape-Sequenzen in einem Wert-String
///
/// Unbekannte Sequenzen bleiben unveraendert erhalten.
pub fn unescape(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    let mut chars = s.chars();

    while let Some(c) = chars.next() {
        if c != '\\' {
            result.push(c);
            continue;
        }
        match chars.next() {
            Some('\\') => result.push('\\'),
            Some('/') => result.push('/'),
            Some('s') => result.push(' '),
            Some('p') => result.push('|'),
            Some('a') => result.push('\u{07}'),
            Some('b') => result.push('\u{08}'),
            Some('f') => result.push('\u{0C}'),
            Some('n') => result.push('\n'),
            Some('r') => result.push('\r'),
            Some('t') => result.push('\t'),
            Some('v') => result.push('\u{0B}'),
            Some(other) => {
                result.push('\\');
                result.push(other);
            }
            None => result.push('\\'),
        }
    }

    result
}
