//! Gemeinsame Hilfen fuer die Integration-Tests: ein minimaler
//! Query-Server auf einem lokalen Port

#![allow(dead_code)]

use std::io::Read;

use tokio::io::AsyncReadExt;
use tsquery_client::VerbindungsKonfig;

pub const SERVER_QUERY_BEGRUESSUNG: &str = "TS3\n\rWelcome to the TeamSpeak 3 ServerQuery interface, type \"help\" for a list of commands and \"help <command>\" for information on a specific command.\n\r";

pub const CLIENT_QUERY_BEGRUESSUNG: &str = "TS3 Client\n\rWelcome to the TeamSpeak 3 ClientQuery interface, type \"help\" for a list of commands and \"help <command>\" for information on a specific command.\n\rselected schandlerid=42\n\r";

pub const BAN_ANTWORT: &str = "error id=3329 msg=connection\\sfailed,\\syou\\sare\\sbanned extra_msg=you\\smay\\sretry\\sin\\s600\\sseconds\n\r";

pub fn konfig(port: u16) -> VerbindungsKonfig {
    VerbindungsKonfig {
        verbindungs_timeout_ms: 2_000,
        ..VerbindungsKonfig::neu("127.0.0.1", port)
    }
}

/// Liest einen Befehl bis `\n` (blockierend)
pub fn befehl_lesen(stream: &mut std::net::TcpStream) -> String {
    let mut zeile = Vec::new();
    let mut byte = [0u8; 1];
    loop {
        stream.read_exact(&mut byte).unwrap();
        if byte[0] == b'\n' {
            break;
        }
        zeile.push(byte[0]);
    }
    String::from_utf8(zeile).unwrap()
}

/// Liest einen Befehl bis `\n` (async)
pub async fn befehl_lesen_async(stream: &mut tokio::net::TcpStream) -> String {
    let mut zeile = Vec::new();
    loop {
        let byte = stream.read_u8().await.unwrap();
        if byte == b'\n' {
            break;
        }
        zeile.push(byte);
    }
    String::from_utf8(zeile).unwrap()
}
