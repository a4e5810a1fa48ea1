//! Client identity for rate limiting
//!
//! Behind a load balancer the socket peer is the balancer, so the client is
//! read from `X-Forwarded-For`. Only the last `trusted_proxy_count` hops of
//! that chain were appended by infrastructure we control; anything before
//! them is client-supplied and may be forged.

use axum::http::HeaderMap;
use std::net::{IpAddr, SocketAddr};

const FORWARDED_FOR: &str = "x-forwarded-for";
const REAL_IP: &str = "x-real-ip";

/// Identity used when no address can be determined. All such requests share
/// one rate-limit bucket.
pub const UNKNOWN_CLIENT: &str = "unknown";

/// Resolve the client address from proxy headers, falling back to the peer.
pub fn client_ip(
    headers: &HeaderMap,
    peer: Option<&SocketAddr>,
    trusted_proxy_count: usize,
) -> Option<IpAddr> {
    header_str(headers, FORWARDED_FOR)
        .and_then(|chain| from_forwarded_chain(chain, trusted_proxy_count))
        .or_else(|| header_str(headers, REAL_IP).and_then(parse_ip))
        .or_else(|| peer.map(SocketAddr::ip))
}

/// `ip:{addr}` for the rate-limit key, or `ip:unknown`.
pub fn client_identity(
    headers: &HeaderMap,
    peer: Option<&SocketAddr>,
    trusted_proxy_count: usize,
) -> String {
    match client_ip(headers, peer, trusted_proxy_count) {
        Some(ip) => format!("ip:{}", ip),
        None => format!("ip:{}", UNKNOWN_CLIENT),
    }
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

fn parse_ip(raw: &str) -> Option<IpAddr> {
    raw.trim().parse().ok()
}

/// Pick the hop just before the trusted suffix of `client, proxy1, proxy2`.
/// With no trusted proxies, or a chain no longer than the trusted suffix,
/// the nearest hop is used.
fn from_forwarded_chain(chain: &str, trusted_proxy_count: usize) -> Option<IpAddr> {
    let hops: Vec<&str> = chain
        .split(',')
        .map(str::trim)
        .filter(|hop| !hop.is_empty())
        .collect();

    let index = if trusted_proxy_count == 0 || hops.len() <= trusted_proxy_count {
        hops.len().checked_sub(1)?
    } else {
        hops.len() - trusted_proxy_count - 1
    };
    hops.get(index).copied().and_then(parse_ip)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(pairs: &[(&'static str, &str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.insert(*name, HeaderValue::from_str(value).unwrap());
        }
        map
    }

    fn ip(s: &str) -> Option<IpAddr> {
        Some(s.parse().unwrap())
    }

    #[test]
    fn test_single_hop() {
        assert_eq!(from_forwarded_chain("198.51.100.7", 0), ip("198.51.100.7"));
        assert_eq!(from_forwarded_chain("198.51.100.7", 1), ip("198.51.100.7"));
    }

    #[test]
    fn test_trusted_suffix_is_skipped() {
        assert_eq!(
            from_forwarded_chain("198.51.100.7, 10.0.0.1", 1),
            ip("198.51.100.7")
        );
        assert_eq!(
            from_forwarded_chain("198.51.100.7, 10.0.0.1, 10.0.0.2", 2),
            ip("198.51.100.7")
        );
    }

    #[test]
    fn test_forged_prefix_is_ignored() {
        // The client prepended a fake hop; only the entry before our proxy counts.
        assert_eq!(
            from_forwarded_chain("1.2.3.4, 198.51.100.7, 10.0.0.1", 1),
            ip("198.51.100.7")
        );
    }

    #[test]
    fn test_untrusted_chain_uses_nearest_hop() {
        assert_eq!(
            from_forwarded_chain("1.2.3.4, 198.51.100.7", 0),
            ip("198.51.100.7")
        );
    }

    #[test]
    fn test_garbage_and_ipv6() {
        assert_eq!(from_forwarded_chain("not-an-ip", 0), None);
        assert_eq!(from_forwarded_chain(" , ", 1), None);
        assert_eq!(from_forwarded_chain("2001:db8::1, 10.0.0.1", 1), ip("2001:db8::1"));
    }

    #[test]
    fn test_fallback_order() {
        let peer: SocketAddr = "192.0.2.10:55000".parse().unwrap();

        let h = headers(&[("x-forwarded-for", "garbage"), ("x-real-ip", "203.0.113.5")]);
        assert_eq!(client_ip(&h, Some(&peer), 1), ip("203.0.113.5"));

        let h = headers(&[("x-real-ip", "also garbage")]);
        assert_eq!(client_ip(&h, Some(&peer), 1), ip("192.0.2.10"));

        assert_eq!(client_ip(&HeaderMap::new(), None, 1), None);
    }

    #[test]
    fn test_client_identity() {
        let h = headers(&[("x-forwarded-for", "203.0.113.9")]);
        assert_eq!(client_identity(&h, None, 1), "ip:203.0.113.9");
        assert_eq!(client_identity(&HeaderMap::new(), None, 1), "ip:unknown");
    }
}
