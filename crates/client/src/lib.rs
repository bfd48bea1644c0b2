//! tsquery-client – Verbindungs- und Dispatch-Engine
//!
//! Zwei Auspraegungen derselben Engine:
//! - [`SyncDispatcher`]: blockierend, ein Thread macht Verbindungsaufbau,
//!   Begruessung, Senden und Lesen bis zur Statuszeile
//! - [`AsyncDispatcher`]: ein Lese-Task pro Verbindung zerlegt den Strom
//!   fortlaufend in Benachrichtigungen und Antworten; `dispatch` wartet
//!   nur auf die eigene Antwort
//!
//! Benachrichtigungen laufen ueber den [`BenachrichtigungsRouter`] an
//! typisierte Handler.

pub mod antwort;
pub mod async_dispatcher;
pub mod befehle;
pub mod config;
pub mod events;
pub mod resolve;
pub mod router;
pub mod sync_dispatcher;

pub use antwort::QueryAntwort;
pub use async_dispatcher::AsyncDispatcher;
pub use config::VerbindungsKonfig;
pub use events::QueryEreignis;
pub use router::{BenachrichtigungsHandler, BenachrichtigungsRouter, BenachrichtigungsSenke};
pub use sync_dispatcher::{AbbruchHandle, SyncDispatcher};
