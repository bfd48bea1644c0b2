//! Benachrichtigungs-Router
//!
//! Nimmt rohe `notify...`-Frames entgegen, dekodiert sie und ruft den
//! passenden Handler auf. Die Verteilung laeuft in eigenen Tasks, damit ein
//! langsamer Handler den Lese-Loop nicht aufhaelt. Mehrere Frames koennen
//! deshalb parallel und ausser Reihenfolge verarbeitet werden.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tsquery_protocol::params::ParameterListe;
use tsquery_protocol::Benachrichtigung;

use crate::events::{
    ClientBetritt, ClientBewegt, ClientVerlaesst, KanalBearbeitet, QueryEreignis,
    ServerBearbeitet, Textnachricht, TokenBenutzt,
};

/// Empfaenger roher Benachrichtigungen
///
/// Der Lese-Loop ruft `zustellen` direkt auf und darf dabei nicht
/// blockieren.
pub trait BenachrichtigungsSenke: Send + Sync {
    fn zustellen(&self, roh: String);
}

/// Kanal als Senke: jeder Frame wird unveraendert weitergereicht
impl BenachrichtigungsSenke for mpsc::UnboundedSender<String> {
    fn zustellen(&self, roh: String) {
        if self.send(roh).is_err() {
            tracing::debug!("Benachrichtigungs-Kanal geschlossen, Frame verworfen");
        }
    }
}

/// Typisierte Handler, ein Methodenpaar pro Eintrag der Tabelle
///
/// Alle Methoden haben leere Standard-Implementierungen.
#[async_trait]
pub trait BenachrichtigungsHandler: Send + Sync + 'static {
    async fn client_betritt(&self, _ereignis: ClientBetritt) {}

    async fn client_verlaesst(&self, _ereignis: ClientVerlaesst) {}

    async fn client_bewegt(&self, _ereignis: ClientBewegt) {}

    async fn textnachricht(&self, _ereignis: Textnachricht) {}

    async fn kanal_bearbeitet(&self, _ereignis: KanalBearbeitet) {}

    async fn server_bearbeitet(&self, _ereignis: ServerBearbeitet) {}

    async fn token_benutzt(&self, _ereignis: TokenBenutzt) {}

    /// Auffang-Handler fuer Namen ohne Tabelleneintrag
    async fn unbekannt(&self, _name: String, _gruppen: ParameterListe) {}
}

/// Verteilt Benachrichtigungen an einen [`BenachrichtigungsHandler`]
#[derive(Clone)]
pub struct BenachrichtigungsRouter {
    handler: Arc<dyn BenachrichtigungsHandler>,
}

impl BenachrichtigungsRouter {
    pub fn neu(handler: impl BenachrichtigungsHandler) -> Self {
        Self {
            handler: Arc::new(handler),
        }
    }

    pub fn aus_arc(handler: Arc<dyn BenachrichtigungsHandler>) -> Self {
        Self { handler }
    }

    /// Dekodiert einen Frame und ruft die Handler der Reihe nach auf
    ///
    /// Gibt die Anzahl der verteilten Ereignisse zurueck.
    pub async fn verteilen(&self, roh: &str) -> usize {
        let Some(benachrichtigung) = Benachrichtigung::parsen(roh) else {
            tracing::warn!(frame = %roh, "Kein Benachrichtigungs-Frame, ignoriert");
            return 0;
        };

        let ereignisse = QueryEreignis::aus_benachrichtigung(&benachrichtigung);
        let anzahl = ereignisse.len();
        for ereignis in ereignisse {
            tracing::debug!(ereignis = ereignis.name(), "Benachrichtigung verteilt");
            self.aufrufen(ereignis).await;
        }
        anzahl
    }

    async fn aufrufen(&self, ereignis: QueryEreignis) {
        let h = &self.handler;
        match ereignis {
            QueryEreignis::ClientBetritt(e) => h.client_betritt(e).await,
            QueryEreignis::ClientVerlaesst(e) => h.client_verlaesst(e).await,
            QueryEreignis::ClientBewegt(e) => h.client_bewegt(e).await,
            QueryEreignis::Textnachricht(e) => h.textnachricht(e).await,
            QueryEreignis::KanalBearbeitet(e) => h.kanal_bearbeitet(e).await,
            QueryEreignis::ServerBearbeitet(e) => h.server_bearbeitet(e).await,
            QueryEreignis::TokenBenutzt(e) => h.token_benutzt(e).await,
            QueryEreignis::Unbekannt { name, gruppen } => h.unbekannt(name, gruppen).await,
        }
    }
}

impl std::fmt::Debug for BenachrichtigungsRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BenachrichtigungsRouter").finish_non_exhaustive()
    }
}

impl BenachrichtigungsSenke for BenachrichtigungsRouter {
    /// Startet die Verteilung in einem eigenen Task
    fn zustellen(&self, roh: String) {
        match tokio::runtime::Handle::try_current() {
            Ok(laufzeit) => {
                let router = self.clone();
                laufzeit.spawn(async move {
                    router.verteilen(&roh).await;
                });
            }
            Err(_) => {
                tracing::warn!(frame = %roh, "Keine tokio-Laufzeit, Benachrichtigung verworfen");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct Protokoll {
        eintraege: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl BenachrichtigungsHandler for Arc<Protokoll> {
        async fn client_betritt(&self, e: ClientBetritt) {
            self.eintraege.lock().push(format!("betritt:{}", e.clid));
        }

        async fn textnachricht(&self, e: Textnachricht) {
            self.eintraege.lock().push(format!("text:{}", e.nachricht));
        }

        async fn unbekannt(&self, name: String, _gruppen: ParameterListe) {
            self.eintraege.lock().push(format!("unbekannt:{name}"));
        }
    }

    #[tokio::test]
    async fn verteilt_nach_name() {
        let protokoll = Arc::new(Protokoll::default());
        let router = BenachrichtigungsRouter::neu(protokoll.clone());

        assert_eq!(router.verteilen("notifycliententerview clid=9 ctid=1").await, 1);
        assert_eq!(router.verteilen("notifytextmessage targetmode=3 msg=hi").await, 1);
        assert_eq!(router.verteilen("notifyneuesding a=1").await, 1);

        assert_eq!(
            *protokoll.eintraege.lock(),
            vec!["betritt:9", "text:hi", "unbekannt:notifyneuesding"]
        );
    }

    #[tokio::test]
    async fn standard_handler_ignorieren_ereignis() {
        let protokoll = Arc::new(Protokoll::default());
        let router = BenachrichtigungsRouter::neu(protokoll.clone());

        assert_eq!(router.verteilen("notifyclientmoved clid=1 ctid=2").await, 1);
        assert!(protokoll.eintraege.lock().is_empty());
    }

    #[tokio::test]
    async fn kein_notify_frame() {
        let router = BenachrichtigungsRouter::neu(Arc::new(Protokoll::default()));
        assert_eq!(router.verteilen("error id=0 msg=ok").await, 0);
    }

    #[tokio::test]
    async fn zustellen_laeuft_in_eigenem_task() {
        let protokoll = Arc::new(Protokoll::default());
        let router = BenachrichtigungsRouter::neu(protokoll.clone());

        router.zustellen("notifycliententerview clid=4".into());
        for _ in 0..100 {
            if !protokoll.eintraege.lock().is_empty() {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        }
        assert_eq!(*protokoll.eintraege.lock(), vec!["betritt:4"]);
    }

    #[tokio::test]
    async fn kanal_als_senke() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        tx.zustellen("notifyserveredited reasonid=10".into());
        assert_eq!(rx.recv().await.as_deref(), Some("notifyserveredited reasonid=10"));
    }
}
