//! Hostname resolution with IPv6-first/IPv4-fallback policy.

use std::net::{IpAddr, SocketAddr};

use tokio::net::lookup_host;

use crate::error::{Result, TftpClientError};
use crate::AddressFamily;

/// True when `host` already parses as a numeric IPv4 or IPv6 literal.
///
/// Gates IPv6→IPv4 failover: a literal address has no alternate family to
/// retry, so the caller should surface the original error instead of looping.
pub fn is_numeric_literal(host: &str) -> bool {
    host.parse::<IpAddr>().is_ok()
}

/// Resolves `hostname:port` to a socket address restricted to `family`.
///
/// `AddressFamily::Unspecified` accepts the first address `lookup_host`
/// returns, in whatever order the system resolver prefers; family pinning
/// and IPv6-first fallback ordering is the caller's (the Facade's)
/// responsibility per the connection-attempt loop.
pub async fn resolve(hostname: &str, port: u16, family: AddressFamily) -> Result<SocketAddr> {
    if let Ok(ip) = hostname.parse::<IpAddr>() {
        return match (family, ip) {
            (AddressFamily::V4, IpAddr::V6(_)) | (AddressFamily::V6, IpAddr::V4(_)) => {
                Err(TftpClientError::InvalidProtoFamily)
            }
            _ => Ok(SocketAddr::new(ip, port)),
        };
    }

    let candidates = lookup_host((hostname, port))
        .await
        .map_err(|e| TftpClientError::NoSock(format!("resolving {hostname}: {e}")))?;

    let mut fallback = None;
    for addr in candidates {
        match (family, addr) {
            (AddressFamily::V4, SocketAddr::V4(_)) | (AddressFamily::V6, SocketAddr::V6(_)) => {
                return Ok(addr);
            }
            (AddressFamily::Unspecified, _) => return Ok(addr),
            _ => fallback.get_or_insert(addr),
        };
    }

    let _ = fallback;
    Err(TftpClientError::InvalidProtoFamily)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_numeric_literals() {
        assert!(is_numeric_literal("127.0.0.1"));
        assert!(is_numeric_literal("::1"));
        assert!(!is_numeric_literal("tftp.example.test"));
    }

    #[tokio::test]
    async fn resolves_ipv4_literal() {
        let addr = resolve("127.0.0.1", 69, AddressFamily::Unspecified)
            .await
            .unwrap();
        assert_eq!(addr, "127.0.0.1:69".parse().unwrap());
    }

    #[tokio::test]
    async fn resolves_ipv6_literal() {
        let addr = resolve("::1", 69, AddressFamily::V6).await.unwrap();
        assert_eq!(addr, "[::1]:69".parse().unwrap());
    }

    #[tokio::test]
    async fn rejects_literal_of_wrong_family() {
        let err = resolve("127.0.0.1", 69, AddressFamily::V6)
            .await
            .unwrap_err();
        assert!(matches!(err, TftpClientError::InvalidProtoFamily));
    }
}
