//! Typisierte Befehls-Bauer
//!
//! Duenne Schicht ueber [`Befehl`]: jeder Bauer liefert einen fertigen
//! Befehl, der ueber `dispatch` gesendet und mit
//! [`crate::QueryAntwort`] ausgewertet wird.

use serde::{Deserialize, Serialize};
use tsquery_core::SchandlerId;
use tsquery_protocol::Befehl;

use crate::antwort::QueryAntwort;

/// Ziel einer Textnachricht
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextZiel {
    /// Privatnachricht an einen Client
    Client(u32),
    /// Aktueller Kanal des Query-Clients
    Kanal,
    /// Virtueller Server
    Server,
}

impl TextZiel {
    fn modus(&self) -> u8 {
        match self {
            Self::Client(_) => 1,
            Self::Kanal => 2,
            Self::Server => 3,
        }
    }
}

/// Ereignisklassen fuer `servernotifyregister`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BenachrichtigungsKlasse {
    Server,
    /// Kanal-Ereignisse, `0` = alle Kanaele
    Channel(u32),
    TextServer,
    TextChannel,
    TextPrivate,
    TokenUsed,
}

impl BenachrichtigungsKlasse {
    pub fn als_str(&self) -> &'static str {
        match self {
            Self::Server => "server",
            Self::Channel(_) => "channel",
            Self::TextServer => "textserver",
            Self::TextChannel => "textchannel",
            Self::TextPrivate => "textprivate",
            Self::TokenUsed => "tokenused",
        }
    }

    /// Parst einen Klassennamen, `channel` meldet alle Kanaele an
    pub fn parsen(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "server" => Some(Self::Server),
            "channel" => Some(Self::Channel(0)),
            "textserver" => Some(Self::TextServer),
            "textchannel" => Some(Self::TextChannel),
            "textprivate" => Some(Self::TextPrivate),
            "tokenused" => Some(Self::TokenUsed),
            _ => None,
        }
    }
}

pub fn login(name: &str, passwort: &str) -> Befehl {
    Befehl::neu("login")
        .mit("client_login_name", name)
        .mit("client_login_password", passwort)
}

pub fn logout() -> Befehl {
    Befehl::neu("logout")
}

/// Waehlt einen virtuellen Server ueber seine ID
pub fn use_sid(sid: u32) -> Befehl {
    Befehl::neu("use").mit("sid", sid)
}

/// Waehlt einen virtuellen Server ueber seinen Voice-Port
pub fn use_port(port: u16) -> Befehl {
    Befehl::neu("use").mit("port", port)
}

/// Wechselt den Server-Connection-Handler (nur ClientQuery)
pub fn use_schandler(id: SchandlerId) -> Befehl {
    Befehl::neu("use").mit("schandlerid", id.0)
}

pub fn version() -> Befehl {
    Befehl::neu("version")
}

pub fn whoami() -> Befehl {
    Befehl::neu("whoami")
}

pub fn serverinfo() -> Befehl {
    Befehl::neu("serverinfo")
}

pub fn serverlist() -> Befehl {
    Befehl::neu("serverlist")
}

/// Clientliste, Optionen z.B. `uid`, `away`, `voice`
pub fn clientlist(optionen: &[&str]) -> Befehl {
    optionen
        .iter()
        .fold(Befehl::neu("clientlist"), |befehl, o| befehl.mit_option(*o))
}

pub fn channellist() -> Befehl {
    Befehl::neu("channellist")
}

pub fn sendtextmessage(ziel: TextZiel, nachricht: &str) -> Befehl {
    let befehl = Befehl::neu("sendtextmessage").mit("targetmode", ziel.modus());
    let befehl = match ziel {
        TextZiel::Client(clid) => befehl.mit("target", clid),
        TextZiel::Kanal | TextZiel::Server => befehl,
    };
    befehl.mit("msg", nachricht)
}

pub fn servernotifyregister(klasse: BenachrichtigungsKlasse) -> Befehl {
    let befehl = Befehl::neu("servernotifyregister").mit("event", klasse.als_str());
    match klasse {
        BenachrichtigungsKlasse::Channel(cid) => befehl.mit("id", cid),
        _ => befehl,
    }
}

pub fn servernotifyunregister() -> Befehl {
    Befehl::neu("servernotifyunregister")
}

pub fn quit() -> Befehl {
    Befehl::neu("quit")
}

// ---------------------------------------------------------------------------
// Typisierte Antworten
// ---------------------------------------------------------------------------

/// Antwort auf `version`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionInfo {
    pub version: String,
    pub build: u64,
    pub plattform: String,
}

impl VersionInfo {
    pub fn aus_antwort(antwort: &QueryAntwort) -> Self {
        Self {
            version: antwort.wert("version").unwrap_or_default(),
            build: antwort.wert("build").unwrap_or_default(),
            plattform: antwort.wert("platform").unwrap_or_default(),
        }
    }
}

/// Antwort auf `whoami`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WerBinIch {
    pub virtueller_server: Option<u32>,
    pub client_id: Option<u32>,
    pub kanal_id: Option<u32>,
    pub nickname: Option<String>,
    pub login_name: Option<String>,
    pub datenbank_id: Option<u64>,
}

impl WerBinIch {
    pub fn aus_antwort(antwort: &QueryAntwort) -> Self {
        Self {
            virtueller_server: antwort.wert("virtualserver_id"),
            client_id: antwort.wert("client_id"),
            kanal_id: antwort.wert("client_channel_id"),
            nickname: antwort.wert("client_nickname"),
            login_name: antwort.wert("client_login_name"),
            datenbank_id: antwort.wert("client_database_id"),
        }
    }
}
