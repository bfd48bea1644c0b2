//! tsquery-protocol – Wire-Grammatik des Query-Protokolls
//!
//! Reine Funktionen ohne IO:
//! - [`escape`]: Escaping reservierter Zeichen in Werten
//! - [`command`]: Kodierung ausgehender Befehle
//! - [`params`]: Dekodierung von Parametergruppen und typisierter Zugriff
//! - [`status`]: Statuszeilen und Ban-Erkennung
//! - [`notify`]: Benachrichtigungs-Frames
//! - [`handshake`]: Banner-Erkennung und Varianten-Rumpf
//! - [`wire`]: Zeilen-Konstanten und der Frame-Codec fuer den Lese-Loop

pub mod command;
pub mod escape;
pub mod handshake;
pub mod notify;
pub mod params;
pub mod status;
pub mod wire;

pub use command::Befehl;
pub use handshake::{Begruessung, BegruessungsErgebnis};
pub use notify::Benachrichtigung;
pub use params::{Parameter, ParameterGruppe, ParameterListe, QueryWert};
pub use status::Status;
pub use wire::{QueryCodec, QueryFrame};
