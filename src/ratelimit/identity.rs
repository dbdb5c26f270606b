//! Client identity resolution.

use axum::http::HeaderMap;
use std::net::SocketAddr;

/// Header set by proxies with the chain of client addresses.
pub const FORWARDED_FOR_HEADER: &str = "x-forwarded-for";
/// Header set by some proxies with the original client address.
pub const REAL_IP_HEADER: &str = "x-real-ip";
/// Identity used when nothing else can be resolved.
pub const UNKNOWN_IDENTITY: &str = "unknown";

/// The request metadata identity resolution looks at.
///
/// Header values are taken as-is from the client. `X-Forwarded-For` is only
/// trustworthy when a proxy in front of this service overwrites it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestMeta {
    /// Raw `X-Forwarded-For` value
    pub forwarded_for: Option<String>,
    /// Raw `X-Real-IP` value
    pub real_ip: Option<String>,
    /// Transport-layer peer address
    pub peer: Option<SocketAddr>,
}

impl RequestMeta {
    /// Collect metadata from request headers and the connection's peer address.
    ///
    /// Header values that are not visible ASCII are treated as absent.
    pub fn from_headers(headers: &HeaderMap, peer: Option<SocketAddr>) -> Self {
        let header = |name: &str| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
        };

        Self {
            forwarded_for: header(FORWARDED_FOR_HEADER),
            real_ip: header(REAL_IP_HEADER),
            peer,
        }
    }

    /// Resolve the identity key for this request.
    ///
    /// Precedence: the first `X-Forwarded-For` entry, then `X-Real-IP`, then
    /// the peer IP, then [`UNKNOWN_IDENTITY`]. Never fails.
    pub fn identity(&self) -> String {
        if let Some(first) = self
            .forwarded_for
            .as_deref()
            .and_then(|xff| xff.split(',').next())
            .map(str::trim)
            .filter(|s| !s.is_empty())
        {
            return first.to_string();
        }

        if let Some(real_ip) = self
            .real_ip
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
        {
            return real_ip.to_string();
        }

        match self.peer {
            Some(addr) => addr.ip().to_string(),
            None => UNKNOWN_IDENTITY.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn peer() -> Option<SocketAddr> {
        Some("10.0.0.9:51234".parse().unwrap())
    }

    #[test]
    fn test_forwarded_for_wins() {
        let meta = RequestMeta {
            forwarded_for: Some(" 203.0.113.7 , 10.0.0.1, 10.0.0.2".to_string()),
            real_ip: Some("198.51.100.3".to_string()),
            peer: peer(),
        };
        assert_eq!(meta.identity(), "203.0.113.7");
    }

    #[test]
    fn test_real_ip_used_without_forwarded_for() {
        let meta = RequestMeta {
            forwarded_for: None,
            real_ip: Some("198.51.100.3".to_string()),
            peer: peer(),
        };
        assert_eq!(meta.identity(), "198.51.100.3");
    }

    #[test]
    fn test_blank_headers_fall_through_to_peer() {
        let meta = RequestMeta {
            forwarded_for: Some("   ".to_string()),
            real_ip: Some(String::new()),
            peer: peer(),
        };
        assert_eq!(meta.identity(), "10.0.0.9");
    }

    #[test]
    fn test_empty_first_forwarded_entry_falls_through() {
        let meta = RequestMeta {
            forwarded_for: Some(", 10.0.0.1".to_string()),
            real_ip: Some("198.51.100.3".to_string()),
            peer: None,
        };
        assert_eq!(meta.identity(), "198.51.100.3");
    }

    #[test]
    fn test_unknown_fallback() {
        assert_eq!(RequestMeta::default().identity(), UNKNOWN_IDENTITY);
    }

    #[test]
    fn test_from_headers() {
        let mut headers = HeaderMap::new();
        headers.insert("X-Forwarded-For", HeaderValue::from_static("1.2.3.4, 5.6.7.8"));
        headers.insert("X-Real-IP", HeaderValue::from_static("9.9.9.9"));

        let meta = RequestMeta::from_headers(&headers, peer());
        assert_eq!(meta.forwarded_for.as_deref(), Some("1.2.3.4, 5.6.7.8"));
        assert_eq!(meta.real_ip.as_deref(), Some("9.9.9.9"));
        assert_eq!(meta.identity(), "1.2.3.4");
    }

    #[test]
    fn test_non_ascii_header_ignored() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "X-Forwarded-For",
            HeaderValue::from_bytes(b"\xfe\xff").unwrap(),
        );

        let meta = RequestMeta::from_headers(&headers, peer());
        assert!(meta.forwarded_for.is_none());
        assert_eq!(meta.identity(), "10.0.0.9");
    }
}
