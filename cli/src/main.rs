//! tsquery – Einstiegspunkt
//!
//! Laedt die Konfiguration, initialisiert das Logging und startet die
//! interaktive Query-Sitzung.

use anyhow::Result;
use tsquery_cli::{config::CliConfig, Cli};
use tsquery_observability::logging_initialisieren;

#[tokio::main]
async fn main() -> Result<()> {
    // Konfigurationsdatei-Pfad aus Umgebungsvariable oder Standard
    let config_pfad = std::env::var("TSQ_CONFIG").unwrap_or_else(|_| "tsquery.toml".into());

    let config = CliConfig::laden(&config_pfad)?;

    logging_initialisieren(&config.logging.level, &config.logging.format);

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        config = %config_pfad,
        "tsquery wird initialisiert"
    );

    Cli::neu(config)?.starten().await
}
