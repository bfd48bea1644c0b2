//! Health-Check-Endpunkt fuer tsquery
//!
//! Endpoint: `GET /health`
//! Response: JSON mit Status, Version, Uptime und Zustand der Query-Verbindung

use std::sync::Arc;
use std::time::Instant;

use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::get, Json, Router};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tsquery_core::{VerbindungsEreignis, VerbindungsZustand};

/// Status des Health-Checks
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

/// Antwort des Health-Check-Endpunkts
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: HealthStatus,
    pub version: String,
    pub uptime_seconds: u64,
    pub zustand: VerbindungsZustand,
}

/// Geteilter Verbindungszustand fuer den Health-Check-Handler
#[derive(Clone)]
pub struct VerbindungsGesundheit {
    start_time: Arc<Instant>,
    zustand: Arc<Mutex<VerbindungsZustand>>,
}

impl VerbindungsGesundheit {
    pub fn neu() -> Self {
        Self {
            start_time: Arc::new(Instant::now()),
            zustand: Arc::new(Mutex::new(VerbindungsZustand::Getrennt)),
        }
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    pub fn zustand(&self) -> VerbindungsZustand {
        *self.zustand.lock()
    }

    pub fn zustand_setzen(&self, zustand: VerbindungsZustand) {
        *self.zustand.lock() = zustand;
    }

    /// Uebernimmt den Zustandswechsel aus einem Verbindungs-Ereignis
    pub fn ereignis_anwenden(&self, ereignis: &VerbindungsEreignis) {
        match ereignis {
            VerbindungsEreignis::Bereit { .. } => self.zustand_setzen(VerbindungsZustand::Bereit),
            VerbindungsEreignis::Geschlossen
            | VerbindungsEreignis::SocketFehler { .. }
            | VerbindungsEreignis::Gebannt(_) => self.zustand_setzen(VerbindungsZustand::Getrennt),
            VerbindungsEreignis::Benachrichtigung(_) => {}
        }
    }

    pub fn status(&self) -> HealthStatus {
        let zustand = self.zustand();
        if zustand.ist_bereit() {
            HealthStatus::Healthy
        } else if zustand.ist_verbunden() {
            HealthStatus::Degraded
        } else {
            HealthStatus::Unhealthy
        }
    }
}

impl Default for VerbindungsGesundheit {
    fn default() -> Self {
        Self::neu()
    }
}

/// Axum-Router fuer den `/health`-Endpunkt
pub fn health_router(gesundheit: VerbindungsGesundheit) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .with_state(gesundheit)
}

/// `GET /health` – gibt den Verbindungsstatus zurueck
async fn health_handler(State(gesundheit): State<VerbindungsGesundheit>) -> impl IntoResponse {
    let status = gesundheit.status();
    let http_status = match status {
        HealthStatus::Healthy | HealthStatus::Degraded => StatusCode::OK,
        HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };

    let response = HealthResponse {
        status,
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: gesundheit.uptime_seconds(),
        zustand: gesundheit.zustand(),
    };

    (http_status, Json(response))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;
    use tsquery_core::{BanInfo, ProtokollVariante};

    #[test]
    fn uptime_frisch_erstellt() {
        let gesundheit = VerbindungsGesundheit::neu();
        assert!(gesundheit.uptime_seconds() < 5);
    }

    #[test]
    fn status_folgt_ereignissen() {
        let gesundheit = VerbindungsGesundheit::neu();
        assert_eq!(gesundheit.status(), HealthStatus::Unhealthy);

        gesundheit.zustand_setzen(VerbindungsZustand::WarteAufBanner);
        assert_eq!(gesundheit.status(), HealthStatus::Degraded);

        gesundheit.ereignis_anwenden(&VerbindungsEreignis::Bereit {
            variante: ProtokollVariante::ServerQuery,
            schandler_id: None,
        });
        assert_eq!(gesundheit.status(), HealthStatus::Healthy);

        gesundheit.ereignis_anwenden(&VerbindungsEreignis::Benachrichtigung("notifyx".into()));
        assert_eq!(gesundheit.status(), HealthStatus::Healthy);

        gesundheit.ereignis_anwenden(&VerbindungsEreignis::Gebannt(BanInfo::default()));
        assert_eq!(gesundheit.zustand(), VerbindungsZustand::Getrennt);
    }

    #[test]
    fn health_response_serialisierung() {
        let response = HealthResponse {
            status: HealthStatus::Healthy,
            version: "0.1.0".to_string(),
            uptime_seconds: 3600,
            zustand: VerbindungsZustand::Bereit,
        };

        let json = serde_json::to_string(&response).unwrap();
        assert!(json.contains("\"status\":\"healthy\""));
        assert!(json.contains("\"uptime_seconds\":3600"));
        assert!(json.contains("\"zustand\":\"bereit\""));
    }

    #[tokio::test]
    async fn getrennt_ergibt_503() {
        let antwort = health_router(VerbindungsGesundheit::neu())
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(antwort.status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
