//! Prometheus-kompatible Metriken fuer tsquery
//!
//! Registrierte Metriken:
//! - `tsquery_dispatches_total` – Counter: Gesendete Befehle
//! - `tsquery_dispatch_errors_total` – Counter: Fehlgeschlagene Dispatches
//! - `tsquery_dispatch_duration_seconds` – Histogram: Round-Trip eines Befehls
//! - `tsquery_notifications_total` – Counter: Benachrichtigungen (name)
//! - `tsquery_disconnects_total` – Counter: Verbindungsabbrueche
//! - `tsquery_bans_total` – Counter: Erkannte Bans

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use axum::{extract::State, response::IntoResponse, routing::get, Router};
use prometheus::{
    Encoder, Histogram, HistogramOpts, IntCounter, IntCounterVec, Opts, Registry, TextEncoder,
};
use tsquery_core::VerbindungsEreignis;

/// Alle Dispatcher-Metriken
#[derive(Clone)]
pub struct QueryMetrics {
    pub registry: Arc<Registry>,

    pub dispatches_total: IntCounter,
    pub dispatch_errors_total: IntCounter,
    pub dispatch_duration_seconds: Histogram,
    pub notifications_total: IntCounterVec,
    pub disconnects_total: IntCounter,
    pub bans_total: IntCounter,
}

impl QueryMetrics {
    /// Erstellt und registriert alle Metriken in einer neuen Registry
    pub fn neu() -> Result<Self> {
        let registry = Registry::new();

        let dispatches_total = IntCounter::with_opts(Opts::new(
            "tsquery_dispatches_total",
            "Gesamtanzahl gesendeter Befehle",
        ))?;
        registry.register(Box::new(dispatches_total.clone()))?;

        let dispatch_errors_total = IntCounter::with_opts(Opts::new(
            "tsquery_dispatch_errors_total",
            "Dispatches ohne Antwort (Fehler oder Verbindungsabbruch)",
        ))?;
        registry.register(Box::new(dispatch_errors_total.clone()))?;

        let dispatch_duration_seconds = Histogram::with_opts(
            HistogramOpts::new(
                "tsquery_dispatch_duration_seconds",
                "Zeit vom Senden bis zur Statuszeile in Sekunden",
            )
            .buckets(vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0]),
        )?;
        registry.register(Box::new(dispatch_duration_seconds.clone()))?;

        let notifications_total = IntCounterVec::new(
            Opts::new(
                "tsquery_notifications_total",
                "Empfangene Benachrichtigungen nach Name",
            ),
            &["name"],
        )?;
        registry.register(Box::new(notifications_total.clone()))?;

        let disconnects_total = IntCounter::with_opts(Opts::new(
            "tsquery_disconnects_total",
            "Geschlossene Verbindungen",
        ))?;
        registry.register(Box::new(disconnects_total.clone()))?;

        let bans_total = IntCounter::with_opts(Opts::new(
            "tsquery_bans_total",
            "Erkannte Ban-Statuszeilen",
        ))?;
        registry.register(Box::new(bans_total.clone()))?;

        Ok(Self {
            registry: Arc::new(registry),
            dispatches_total,
            dispatch_errors_total,
            dispatch_duration_seconds,
            notifications_total,
            disconnects_total,
            bans_total,
        })
    }

    /// Erfasst einen abgeschlossenen Dispatch
    pub fn dispatch_erfassen(&self, dauer: Duration, erfolgreich: bool) {
        self.dispatches_total.inc();
        self.dispatch_duration_seconds.observe(dauer.as_secs_f64());
        if !erfolgreich {
            self.dispatch_errors_total.inc();
        }
    }

    /// Zaehlt ein Verbindungs-Ereignis
    pub fn ereignis_erfassen(&self, ereignis: &VerbindungsEreignis) {
        match ereignis {
            VerbindungsEreignis::Benachrichtigung(roh) => {
                let name = roh.split_whitespace().next().unwrap_or("notify");
                self.notifications_total.with_label_values(&[name]).inc();
            }
            VerbindungsEreignis::Geschlossen => self.disconnects_total.inc(),
            VerbindungsEreignis::Gebannt(_) => self.bans_total.inc(),
            VerbindungsEreignis::Bereit { .. } | VerbindungsEreignis::SocketFehler { .. } => {}
        }
    }

    /// Exportiert alle Metriken im Prometheus-Textformat
    pub fn als_text(&self) -> Result<String> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }
}

/// Axum-Router fuer den `/metrics`-Endpunkt
pub fn metrics_router(metriken: QueryMetrics) -> Router {
    Router::new()
        .route("/metrics", get(metrics_handler))
        .with_state(metriken)
}

async fn metrics_handler(State(metriken): State<QueryMetrics>) -> impl IntoResponse {
    match metriken.als_text() {
        Ok(text) => (
            axum::http::StatusCode::OK,
            [(axum::http::header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            text,
        )
            .into_response(),
        Err(err) => {
            tracing::error!("Metriken-Export fehlgeschlagen: {err}");
            axum::http::StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;
    use tsquery_core::BanInfo;

    #[test]
    fn metriken_erstellen_erfolgreich() {
        let metriken = QueryMetrics::neu().unwrap();
        assert!(!metriken.registry.gather().is_empty());
    }

    #[test]
    fn dispatch_erfassen_zaehlt_fehler_getrennt() {
        let metriken = QueryMetrics::neu().unwrap();
        metriken.dispatch_erfassen(Duration::from_millis(3), true);
        metriken.dispatch_erfassen(Duration::from_millis(7), false);
        assert_eq!(metriken.dispatches_total.get(), 2);
        assert_eq!(metriken.dispatch_errors_total.get(), 1);
        assert_eq!(metriken.dispatch_duration_seconds.get_sample_count(), 2);
    }

    #[test]
    fn ereignisse_erfassen() {
        let metriken = QueryMetrics::neu().unwrap();
        metriken.ereignis_erfassen(&VerbindungsEreignis::Benachrichtigung(
            "notifytextmessage targetmode=3 msg=hi".into(),
        ));
        metriken.ereignis_erfassen(&VerbindungsEreignis::Benachrichtigung(
            "notifytextmessage targetmode=1 msg=du".into(),
        ));
        metriken.ereignis_erfassen(&VerbindungsEreignis::Gebannt(BanInfo::default()));
        metriken.ereignis_erfassen(&VerbindungsEreignis::Geschlossen);

        assert_eq!(
            metriken
                .notifications_total
                .with_label_values(&["notifytextmessage"])
                .get(),
            2
        );
        assert_eq!(metriken.bans_total.get(), 1);
        assert_eq!(metriken.disconnects_total.get(), 1);
    }

    #[test]
    fn export_prometheus_format() {
        let metriken = QueryMetrics::neu().unwrap();
        metriken.dispatches_total.inc();

        let output = metriken.als_text().unwrap();
        assert!(output.contains("tsquery_dispatches_total 1"));
        assert!(output.contains("tsquery_bans_total"));
        assert!(output.contains("# HELP"));
        assert!(output.contains("# TYPE"));
    }

    #[tokio::test]
    async fn metrics_endpunkt() {
        let metriken = QueryMetrics::neu().unwrap();
        metriken.bans_total.inc();

        let antwort = metrics_router(metriken)
            .oneshot(Request::get("/metrics").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(antwort.status(), StatusCode::OK);

        let body = axum::body::to_bytes(antwort.into_body(), usize::MAX)
            .await
            .unwrap();
        let text = String::from_utf8(body.to_vec()).unwrap();
        assert!(text.contains("tsquery_bans_total 1"));
    }
}
