//! Typisierte Benachrichtigungen
//!
//! Feste Tabelle von Benachrichtigungsnamen auf Ereignis-Typen. Ein Frame
//! kann mehrere Gruppen tragen (`|`), jede Gruppe wird ein eigenes
//! Ereignis. Unbekannte Namen landen vollstaendig in
//! [`QueryEreignis::Unbekannt`].
//!
//! Fehlende Felder werden mit Standardwerten belegt; die Server liefern
//! je nach Version nicht immer alle Felder mit.

use tsquery_protocol::params::{ParameterGruppe, ParameterListe};
use tsquery_protocol::Benachrichtigung;

/// Client betritt die Sichtbarkeit (`notifycliententerview`)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientBetritt {
    pub clid: u32,
    pub von_kanal: u32,
    pub ziel_kanal: u32,
    pub grund: u32,
    pub nickname: String,
    pub unique_id: Option<String>,
    pub datenbank_id: Option<u64>,
    /// 0 = Voice-Client, 1 = Query-Client
    pub client_typ: u8,
}

/// Client verlaesst die Sichtbarkeit (`notifyclientleftview`)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientVerlaesst {
    pub clid: u32,
    pub von_kanal: u32,
    pub ziel_kanal: u32,
    pub grund: u32,
    pub grund_text: Option<String>,
}

/// Client wechselt den Kanal (`notifyclientmoved`)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientBewegt {
    pub clid: u32,
    pub ziel_kanal: u32,
    pub grund: u32,
    pub aufrufer_id: Option<u32>,
}

/// Textnachricht (`notifytextmessage`)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Textnachricht {
    /// 1 = privat, 2 = Kanal, 3 = Server
    pub zielmodus: u8,
    pub nachricht: String,
    pub aufrufer_id: u32,
    pub aufrufer_name: String,
    pub aufrufer_uid: Option<String>,
    /// Nur bei privaten Nachrichten gesetzt
    pub ziel: Option<u32>,
}

/// Kanal bearbeitet (`notifychanneledited`)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KanalBearbeitet {
    pub cid: u32,
    pub grund: u32,
    pub aufrufer_id: Option<u32>,
    /// Alle uebermittelten Felder, inklusive der geaenderten Eigenschaften
    pub felder: ParameterGruppe,
}

/// Server bearbeitet (`notifyserveredited`)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerBearbeitet {
    pub grund: u32,
    pub aufrufer_id: Option<u32>,
    pub felder: ParameterGruppe,
}

/// Privilege-Key eingeloest (`notifytokenused`)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenBenutzt {
    pub clid: u32,
    pub cldbid: u64,
    pub token: String,
    pub token_custom_set: Option<String>,
}

/// Alle Ereignisse, die der Router verteilt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryEreignis {
    ClientBetritt(ClientBetritt),
    ClientVerlaesst(ClientVerlaesst),
    ClientBewegt(ClientBewegt),
    Textnachricht(Textnachricht),
    KanalBearbeitet(KanalBearbeitet),
    ServerBearbeitet(ServerBearbeitet),
    TokenBenutzt(TokenBenutzt),
    /// Name ohne Eintrag in der Tabelle, mit allen dekodierten Gruppen
    Unbekannt {
        name: String,
        gruppen: ParameterListe,
    },
}

impl QueryEreignis {
    /// Uebersetzt eine Benachrichtigung in ein Ereignis pro Gruppe
    pub fn aus_benachrichtigung(benachrichtigung: &Benachrichtigung) -> Vec<Self> {
        let bauer: fn(&ParameterGruppe) -> Self = match benachrichtigung.name.as_str() {
            "notifycliententerview" => |g| Self::ClientBetritt(ClientBetritt::aus_gruppe(g)),
            "notifyclientleftview" => |g| Self::ClientVerlaesst(ClientVerlaesst::aus_gruppe(g)),
            "notifyclientmoved" => |g| Self::ClientBewegt(ClientBewegt::aus_gruppe(g)),
            "notifytextmessage" => |g| Self::Textnachricht(Textnachricht::aus_gruppe(g)),
            "notifychanneledited" => |g| Self::KanalBearbeitet(KanalBearbeitet::aus_gruppe(g)),
            "notifyserveredited" => |g| Self::ServerBearbeitet(ServerBearbeitet::aus_gruppe(g)),
            "notifytokenused" => |g| Self::TokenBenutzt(TokenBenutzt::aus_gruppe(g)),
            _ => {
                return vec![Self::Unbekannt {
                    name: benachrichtigung.name.clone(),
                    gruppen: benachrichtigung.parameter.clone(),
                }]
            }
        };

        let gruppen = benachrichtigung.parameter.gruppen();
        if gruppen.is_empty() {
            return vec![bauer(&ParameterGruppe::neu())];
        }
        gruppen.iter().map(bauer).collect()
    }

    /// Name des Ereignisses (fuer Logs und Metriken)
    pub fn name(&self) -> &str {
        match self {
            Self::ClientBetritt(_) => "cliententerview",
            Self::ClientVerlaesst(_) => "clientleftview",
            Self::ClientBewegt(_) => "clientmoved",
            Self::Textnachricht(_) => "textmessage",
            Self::KanalBearbeitet(_) => "channeledited",
            Self::ServerBearbeitet(_) => "serveredited",
            Self::TokenBenutzt(_) => "tokenused",
            Self::Unbekannt { name, .. } => name,
        }
    }
}

impl ClientBetritt {
    fn aus_gruppe(g: &ParameterGruppe) -> Self {
        Self {
            clid: g.wert("clid").unwrap_or_default(),
            von_kanal: g.wert("cfid").unwrap_or_default(),
            ziel_kanal: g.wert("ctid").unwrap_or_default(),
            grund: g.wert("reasonid").unwrap_or_default(),
            nickname: g.wert("client_nickname").unwrap_or_default(),
            unique_id: g.wert("client_unique_identifier"),
            datenbank_id: g.wert("client_database_id"),
            client_typ: g.wert("client_type").unwrap_or_default(),
        }
    }
}

impl ClientVerlaesst {
    fn aus_gruppe(g: &ParameterGruppe) -> Self {
        Self {
            clid: g.wert("clid").unwrap_or_default(),
            von_kanal: g.wert("cfid").unwrap_or_default(),
            ziel_kanal: g.wert("ctid").unwrap_or_default(),
            grund: g.wert("reasonid").unwrap_or_default(),
            grund_text: g.wert("reasonmsg"),
        }
    }
}

impl ClientBewegt {
    fn aus_gruppe(g: &ParameterGruppe) -> Self {
        Self {
            clid: g.wert("clid").unwrap_or_default(),
            ziel_kanal: g.wert("ctid").unwrap_or_default(),
            grund: g.wert("reasonid").unwrap_or_default(),
            aufrufer_id: g.wert("invokerid"),
        }
    }
}

impl Textnachricht {
    fn aus_gruppe(g: &ParameterGruppe) -> Self {
        Self {
            zielmodus: g.wert("targetmode").unwrap_or_default(),
            nachricht: g.wert("msg").unwrap_or_default(),
            aufrufer_id: g.wert("invokerid").unwrap_or_default(),
            aufrufer_name: g.wert("invokername").unwrap_or_default(),
            aufrufer_uid: g.wert("invokeruid"),
            ziel: g.wert("target"),
        }
    }
}

impl KanalBearbeitet {
    fn aus_gruppe(g: &ParameterGruppe) -> Self {
        Self {
            cid: g.wert("cid").unwrap_or_default(),
            grund: g.wert("reasonid").unwrap_or_default(),
            aufrufer_id: g.wert("invokerid"),
            felder: g.clone(),
        }
    }
}

impl ServerBearbeitet {
    fn aus_gruppe(g: &ParameterGruppe) -> Self {
        Self {
            grund: g.wert("reasonid").unwrap_or_default(),
            aufrufer_id: g.wert("invokerid"),
            felder: g.clone(),
        }
    }
}

impl TokenBenutzt {
    fn aus_gruppe(g: &ParameterGruppe) -> Self {
        Self {
            clid: g.wert("clid").unwrap_or_default(),
            cldbid: g.wert("cldbid").unwrap_or_default(),
            token: g.wert("token").unwrap_or_default(),
            token_custom_set: g.wert("tokencustomset"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ereignisse(roh: &str) -> Vec<QueryEreignis> {
        QueryEreignis::aus_benachrichtigung(&Benachrichtigung::parsen(roh).unwrap())
    }

    #[test]
    fn client_betritt() {
        let e = ereignisse(
            "notifycliententerview cfid=0 ctid=5 reasonid=0 clid=7 client_unique_identifier=abc= client_nickname=Gast\\s1 client_database_id=12 client_type=0",
        );
        assert_eq!(
            e,
            vec![QueryEreignis::ClientBetritt(ClientBetritt {
                clid: 7,
                von_kanal: 0,
                ziel_kanal: 5,
                grund: 0,
                nickname: "Gast 1".into(),
                unique_id: Some("abc=".into()),
                datenbank_id: Some(12),
                client_typ: 0,
            })]
        );
    }

    #[test]
    fn textnachricht() {
        let e = ereignisse("notifytextmessage targetmode=3 msg=hallo\\swelt invokerid=1 invokername=admin");
        match &e[0] {
            QueryEreignis::Textnachricht(t) => {
                assert_eq!(t.zielmodus, 3);
                assert_eq!(t.nachricht, "hallo welt");
                assert_eq!(t.aufrufer_name, "admin");
                assert_eq!(t.ziel, None);
            }
            andere => panic!("Textnachricht erwartet: {andere:?}"),
        }
    }

    #[test]
    fn batch_ergibt_mehrere_ereignisse() {
        let e = ereignisse("notifyclientleftview cfid=1 ctid=0 reasonid=8 clid=3|clid=4");
        assert_eq!(e.len(), 2);
        assert!(matches!(&e[1], QueryEreignis::ClientVerlaesst(v) if v.clid == 4));
    }

    #[test]
    fn unbekannter_name() {
        let e = ereignisse("notifyserverstopped reasonmsg=bye|x=1");
        assert_eq!(e.len(), 1);
        match &e[0] {
            QueryEreignis::Unbekannt { name, gruppen } => {
                assert_eq!(name, "notifyserverstopped");
                assert_eq!(gruppen.len(), 2);
            }
            andere => panic!("Unbekannt erwartet: {andere:?}"),
        }
        assert_eq!(e[0].name(), "notifyserverstopped");
    }

    #[test]
    fn fehlende_felder_ergeben_standardwerte() {
        let e = ereignisse("notifyclientmoved");
        assert_eq!(
            e,
            vec![QueryEreignis::ClientBewegt(ClientBewegt {
                clid: 0,
                ziel_kanal: 0,
                grund: 0,
                aufrufer_id: None,
            })]
        );
    }
}
