//! Trusted-proxy source IP derivation.
//!
//! When `trust_proxy_headers` is off (the default), the connection's own
//! socket address is authoritative. When on, `X-Forwarded-For` (left-most
//! entry, the original client) is preferred, falling back to `X-Real-IP`.

use std::net::IpAddr;

use axum::http::HeaderMap;

/// Resolve the request's source IP, honouring proxy headers only when
/// `trust_proxy_headers` is enabled.
#[must_use]
pub fn source_ip(headers: &HeaderMap, socket_ip: IpAddr, trust_proxy_headers: bool) -> IpAddr {
    if !trust_proxy_headers {
        return socket_ip;
    }

    if let Some(forwarded) = headers.get("x-forwarded-for").and_then(|v| v.to_str().ok()) {
        if let Some(first) = forwarded.split(',').next() {
            if let Ok(ip) = first.trim().parse::<IpAddr>() {
                return ip;
            }
        }
    }

    if let Some(real_ip) = headers
        .get("x-real-ip")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<IpAddr>().ok())
    {
        return real_ip;
    }

    socket_ip
}

#[cfg(test)]
mod tests {
    use super::*;

    fn socket_ip() -> IpAddr {
        "10.0.0.1".parse().unwrap()
    }

    #[test]
    fn untrusted_ignores_headers() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", "1.2.3.4".parse().unwrap());
        assert_eq!(source_ip(&headers, socket_ip(), false), socket_ip());
    }

    #[test]
    fn trusted_prefers_forwarded_for_left_most_entry() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", "1.2.3.4, 10.0.0.1".parse().unwrap());
        assert_eq!(
            source_ip(&headers, socket_ip(), true),
            "1.2.3.4".parse::<IpAddr>().unwrap()
        );
    }

    #[test]
    fn trusted_falls_back_to_real_ip() {
        let mut headers = HeaderMap::new();
        headers.insert("x-real-ip", "5.6.7.8".parse().unwrap());
        assert_eq!(
            source_ip(&headers, socket_ip(), true),
            "5.6.7.8".parse::<IpAddr>().unwrap()
        );
    }

    #[test]
    fn trusted_with_malformed_header_falls_back_to_socket() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", "not-an-ip".parse().unwrap());
        assert_eq!(source_ip(&headers, socket_ip(), true), socket_ip());
    }
}
