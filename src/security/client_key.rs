//! Rate-limit key derivation.
//!
//! # Responsibilities
//! - Derive a stable per-client key from the socket peer address
//! - Optionally honour `X-Forwarded-For` when deployed behind a trusted proxy
//! - Normalize addresses so `::ffff:1.2.3.4` and `1.2.3.4` share a bucket
//!
//! # Design Decisions
//! - Never trust `X-Forwarded-*` unless explicitly configured
//! - Only the rightmost forwarded entry is used; the client controls the rest
//! - Missing address maps to the `"unknown"` sentinel (all such clients share one bucket)

use std::fmt;
use std::net::{IpAddr, SocketAddr};

use axum::{extract::ConnectInfo, http::Request};

pub const UNKNOWN_CLIENT: &str = "unknown";
const X_FORWARDED_FOR: &str = "x-forwarded-for";

/// Normalized client identity used as the counter key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RateLimitKey(String);

impl RateLimitKey {
    pub fn from_ip(ip: IpAddr) -> Self {
        Self(normalize_ip(ip).to_string())
    }

    pub fn unknown() -> Self {
        Self(UNKNOWN_CLIENT.to_string())
    }

    /// Parse a textual address (with or without port). Unparseable input is
    /// kept verbatim after trimming so operators can still whitelist it.
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        if let Ok(ip) = raw.parse::<IpAddr>() {
            return Self::from_ip(ip);
        }
        if let Ok(sock) = raw.parse::<SocketAddr>() {
            return Self::from_ip(sock.ip());
        }
        if raw.is_empty() {
            return Self::unknown();
        }
        Self(raw.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_unknown(&self) -> bool {
        self.0 == UNKNOWN_CLIENT
    }
}

impl fmt::Display for RateLimitKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn normalize_ip(ip: IpAddr) -> IpAddr {
    match ip {
        IpAddr::V6(v6) => match v6.to_ipv4_mapped() {
            Some(v4) => IpAddr::V4(v4),
            None => IpAddr::V6(v6),
        },
        v4 => v4,
    }
}

/// Derives a [`RateLimitKey`] from an incoming request.
#[derive(Debug, Clone, Copy, Default)]
pub struct KeyExtractor {
    trust_proxy_headers: bool,
}

impl KeyExtractor {
    pub fn new(trust_proxy_headers: bool) -> Self {
        Self {
            trust_proxy_headers,
        }
    }

    pub fn extract<B>(&self, request: &Request<B>) -> RateLimitKey {
        if self.trust_proxy_headers {
            if let Some(ip) = forwarded_client(request) {
                return RateLimitKey::from_ip(ip);
            }
        }

        request
            .extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| RateLimitKey::from_ip(addr.ip()))
            .unwrap_or_else(RateLimitKey::unknown)
    }
}

/// The address the trusted proxy appended, i.e. the rightmost entry of the
/// last `X-Forwarded-For` header. Entries to its left are client-supplied.
fn forwarded_client<B>(request: &Request<B>) -> Option<IpAddr> {
    request
        .headers()
        .get_all(X_FORWARDED_FOR)
        .iter()
        .last()?
        .to_str()
        .ok()?
        .rsplit(',')
        .next()?
        .trim()
        .parse()
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;

    fn request_from(addr: Option<&str>, forwarded: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder().uri("/public/ping");
        if let Some(xff) = forwarded {
            builder = builder.header(X_FORWARDED_FOR, xff);
        }
        let mut req = builder.body(Body::empty()).unwrap();
        if let Some(addr) = addr {
            let sock: SocketAddr = addr.parse().unwrap();
            req.extensions_mut().insert(ConnectInfo(sock));
        }
        req
    }

    #[test]
    fn test_key_from_peer_drops_port() {
        let req = request_from(Some("1.2.3.4:5555"), None);
        assert_eq!(KeyExtractor::default().extract(&req).as_str(), "1.2.3.4");
    }

    #[test]
    fn test_ipv4_mapped_address_is_normalized() {
        let req = request_from(Some("[::ffff:10.0.0.7]:443"), None);
        assert_eq!(KeyExtractor::default().extract(&req).as_str(), "10.0.0.7");
    }

    #[test]
    fn test_missing_peer_is_unknown() {
        let req = request_from(None, None);
        let key = KeyExtractor::default().extract(&req);
        assert!(key.is_unknown());
        assert_eq!(key.as_str(), UNKNOWN_CLIENT);
    }

    #[test]
    fn test_forwarded_for_ignored_unless_trusted() {
        let req = request_from(Some("127.0.0.1:9000"), Some("203.0.113.9"));
        assert_eq!(KeyExtractor::new(false).extract(&req).as_str(), "127.0.0.1");
        assert_eq!(KeyExtractor::new(true).extract(&req).as_str(), "203.0.113.9");
    }

    #[test]
    fn test_forwarded_for_uses_proxy_appended_entry() {
        let extractor = KeyExtractor::new(true);
        for spoofed in ["10.0.0.1", "10.0.0.2", "127.0.0.1"] {
            let xff = format!("{}, 198.51.100.2", spoofed);
            let req = request_from(Some("127.0.0.1:9000"), Some(&xff));
            assert_eq!(extractor.extract(&req).as_str(), "198.51.100.2");
        }
    }

    #[test]
    fn test_malformed_proxy_entry_falls_back_to_peer() {
        let req = request_from(Some("127.0.0.1:9000"), Some("198.51.100.2, garbage"));
        assert_eq!(KeyExtractor::new(true).extract(&req).as_str(), "127.0.0.1");
    }

    #[test]
    fn test_parse_textual_keys() {
        assert_eq!(RateLimitKey::parse(" 1.2.3.4 ").as_str(), "1.2.3.4");
        assert_eq!(RateLimitKey::parse("1.2.3.4:80").as_str(), "1.2.3.4");
        assert_eq!(RateLimitKey::parse("::ffff:1.2.3.4").as_str(), "1.2.3.4");
        assert_eq!(RateLimitKey::parse("2001:DB8::1").as_str(), "2001:db8::1");
        assert!(RateLimitKey::parse("").is_unknown());
    }
}
