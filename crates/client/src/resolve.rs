//! Host-Aufloesung
//!
//! Ein IP-Literal wird direkt verwendet. Sonst wird per DNS aufgeloest und
//! die erste IPv4-Adresse genommen. Ohne DNS-Faehigkeit
//! (`dns_aufloesen = false`) sind nur Literale erlaubt.

use std::net::{IpAddr, SocketAddr, ToSocketAddrs};

use tsquery_core::{QueryError, Result};

/// Blockierende Aufloesung (fuer den synchronen Dispatcher)
pub fn aufloesen(host: &str, port: u16, dns_aufloesen: bool) -> Result<SocketAddr> {
    if let Some(adresse) = literal(host, port) {
        return Ok(adresse);
    }
    dns_erlaubt(host, dns_aufloesen)?;

    let adressen = (host, port)
        .to_socket_addrs()
        .map_err(|e| QueryError::Aufloesung {
            host: host.to_string(),
            grund: e.to_string(),
        })?;
    erste_ipv4(host, adressen)
}

/// Asynchrone Aufloesung ueber tokio
pub async fn aufloesen_async(host: &str, port: u16, dns_aufloesen: bool) -> Result<SocketAddr> {
    if let Some(adresse) = literal(host, port) {
        return Ok(adresse);
    }
    dns_erlaubt(host, dns_aufloesen)?;

    let adressen = tokio::net::lookup_host((host, port))
        .await
        .map_err(|e| QueryError::Aufloesung {
            host: host.to_string(),
            grund: e.to_string(),
        })?;
    erste_ipv4(host, adressen)
}

fn literal(host: &str, port: u16) -> Option<SocketAddr> {
    host.parse::<IpAddr>()
        .ok()
        .map(|ip| SocketAddr::new(ip, port))
}

fn dns_erlaubt(host: &str, dns_aufloesen: bool) -> Result<()> {
    if dns_aufloesen {
        Ok(())
    } else {
        Err(QueryError::Aufloesung {
            host: host.to_string(),
            grund: "DNS-Aufloesung deaktiviert, nur IP-Adressen erlaubt".to_string(),
        })
    }
}

fn erste_ipv4(host: &str, adressen: impl Iterator<Item = SocketAddr>) -> Result<SocketAddr> {
    let adresse = adressen
        .into_iter()
        .find(SocketAddr::is_ipv4)
        .ok_or_else(|| QueryError::KeineIpv4Adresse(host.to_string()))?;
    tracing::debug!(host, adresse = %adresse, "Host aufgeloest");
    Ok(adresse)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ip_literal_ohne_dns() {
        let adresse = aufloesen("192.0.2.7", 10011, false).unwrap();
        assert_eq!(adresse, "192.0.2.7:10011".parse().unwrap());
    }

    #[test]
    fn ipv6_literal_wird_uebernommen() {
        let adresse = aufloesen("::1", 25639, false).unwrap();
        assert!(adresse.is_ipv6());
    }

    #[test]
    fn hostname_ohne_dns_faehigkeit() {
        let e = aufloesen("localhost", 10011, false).unwrap_err();
        assert!(matches!(e, QueryError::Aufloesung { .. }));
    }

    #[test]
    fn nur_ipv6_ergibt_fehler() {
        let adressen = vec!["[::1]:10011".parse::<SocketAddr>().unwrap()];
        let e = erste_ipv4("nur-v6", adressen.into_iter()).unwrap_err();
        assert!(matches!(e, QueryError::KeineIpv4Adresse(host) if host == "nur-v6"));
    }

    #[test]
    fn erste_ipv4_bevorzugt() {
        let adressen: Vec<SocketAddr> = vec![
            "[::1]:1".parse().unwrap(),
            "10.0.0.1:1".parse().unwrap(),
            "10.0.0.2:1".parse().unwrap(),
        ];
        assert_eq!(
            erste_ipv4("x", adressen.into_iter()).unwrap(),
            "10.0.0.1:1".parse().unwrap()
        );
    }

    #[tokio::test]
    async fn async_literal() {
        let adresse = aufloesen_async("127.0.0.1", 10011, true).await.unwrap();
        assert_eq!(adresse.port(), 10011);
    }
}
