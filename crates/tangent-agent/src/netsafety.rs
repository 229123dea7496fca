//! Destination validation for network tools.
//!
//! Network tools resolve their target host before connecting and refuse
//! loopback, private, link-local, multicast, reserved, and unspecified
//! addresses. The `ALLOW_PRIVATE_TOOL_NETWORK=true` override (or the
//! equivalent config knob) lifts the restriction for lab setups.

use std::net::IpAddr;

use url::Url;

/// Environment override that permits private destinations.
pub const ALLOW_PRIVATE_ENV: &str = "ALLOW_PRIVATE_TOOL_NETWORK";

/// Read the private-network override from the environment.
pub fn allow_private_from_env() -> bool {
    std::env::var(ALLOW_PRIVATE_ENV)
        .map(|v| v.eq_ignore_ascii_case("true") || v == "1")
        .unwrap_or(false)
}

/// Why an address is not a permitted destination, or `None` if it is.
pub fn disallowed_reason(ip: IpAddr) -> Option<&'static str> {
    match ip {
        IpAddr::V4(v4) => {
            if v4.is_loopback() {
                Some("loopback")
            } else if v4.is_private() {
                Some("private")
            } else if v4.is_link_local() {
                Some("link-local")
            } else if v4.is_multicast() {
                Some("multicast")
            } else if v4.is_broadcast() || v4.is_documentation() {
                Some("reserved")
            } else if v4.is_unspecified() {
                Some("unspecified")
            } else {
                None
            }
        }
        IpAddr::V6(v6) => {
            if v6.is_loopback() {
                Some("loopback")
            } else if v6.is_unique_local() {
                Some("private")
            } else if v6.is_unicast_link_local() {
                Some("link-local")
            } else if v6.is_multicast() {
                Some("multicast")
            } else if v6.is_unspecified() {
                Some("unspecified")
            } else {
                None
            }
        }
    }
}

/// Validate that a URL points at a permitted public destination.
///
/// Parses the URL, requires http/https, resolves the host, and checks every
/// resolved address. Errors are returned as strings suitable for a
/// tool-result error.
pub async fn ensure_public_destination(
    raw_url: &str,
    allow_private: bool,
) -> std::result::Result<Url, String> {
    let url = Url::parse(raw_url).map_err(|e| format!("Invalid URL: {}", e))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err("Only HTTP and HTTPS URLs are supported".to_string());
    }

    let host = url
        .host_str()
        .ok_or_else(|| "URL has no host".to_string())?
        .to_string();

    if allow_private {
        return Ok(url);
    }

    let port = url.port_or_known_default().unwrap_or(443);
    let addrs: Vec<IpAddr> = tokio::net::lookup_host((host.as_str(), port))
        .await
        .map_err(|e| format!("Failed to resolve host '{}': {}", host, e))?
        .map(|sa| sa.ip())
        .collect();

    if addrs.is_empty() {
        return Err(format!("Host '{}' resolved to no addresses", host));
    }

    for addr in &addrs {
        if let Some(reason) = disallowed_reason(*addr) {
            tracing::warn!(host = %host, addr = %addr, reason, "Blocked private destination");
            return Err(format!(
                "Destination '{}' resolves to a {} address ({}); set {}=true to permit it",
                host, reason, addr, ALLOW_PRIVATE_ENV
            ));
        }
    }

    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{Ipv4Addr, Ipv6Addr};

    #[test]
    fn test_v4_ranges() {
        assert_eq!(
            disallowed_reason(IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1))),
            Some("loopback")
        );
        assert_eq!(
            disallowed_reason(IpAddr::V4(Ipv4Addr::new(10, 0, 0, 5))),
            Some("private")
        );
        assert_eq!(
            disallowed_reason(IpAddr::V4(Ipv4Addr::new(192, 168, 1, 1))),
            Some("private")
        );
        assert_eq!(
            disallowed_reason(IpAddr::V4(Ipv4Addr::new(169, 254, 0, 1))),
            Some("link-local")
        );
        assert_eq!(
            disallowed_reason(IpAddr::V4(Ipv4Addr::new(224, 0, 0, 1))),
            Some("multicast")
        );
        assert_eq!(
            disallowed_reason(IpAddr::V4(Ipv4Addr::UNSPECIFIED)),
            Some("unspecified")
        );
        assert_eq!(disallowed_reason(IpAddr::V4(Ipv4Addr::new(1, 1, 1, 1))), None);
    }

    #[test]
    fn test_v6_ranges() {
        assert_eq!(
            disallowed_reason(IpAddr::V6(Ipv6Addr::LOCALHOST)),
            Some("loopback")
        );
        assert_eq!(
            disallowed_reason(IpAddr::V6("fc00::1".parse().unwrap())),
            Some("private")
        );
        assert_eq!(
            disallowed_reason(IpAddr::V6("fe80::1".parse().unwrap())),
            Some("link-local")
        );
        assert_eq!(
            disallowed_reason(IpAddr::V6("2606:4700::1111".parse().unwrap())),
            None
        );
    }

    #[tokio::test]
    async fn test_rejects_non_http_scheme() {
        let err = ensure_public_destination("ftp://example.com/file", false)
            .await
            .unwrap_err();
        assert!(err.contains("HTTP"));
    }

    #[tokio::test]
    async fn test_rejects_loopback_literal() {
        let err = ensure_public_destination("http://127.0.0.1:8080/", false)
            .await
            .unwrap_err();
        assert!(err.contains("loopback"));
    }

    #[tokio::test]
    async fn test_override_skips_resolution() {
        let url = ensure_public_destination("http://127.0.0.1:8080/", true)
            .await
            .unwrap();
        assert_eq!(url.host_str(), Some("127.0.0.1"));
    }

    #[tokio::test]
    async fn test_invalid_url() {
        let err = ensure_public_destination("not a url", false).await.unwrap_err();
        assert!(err.contains("Invalid URL"));
    }
}
