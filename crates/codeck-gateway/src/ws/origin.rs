//! WebSocket `Origin` header validation.
//!
//! Accepted origins: the request's own host, `localhost`/`127.0.0.1` at
//! any port, and `*.<mdns-domain>` when one is configured.

use axum::http::{HeaderMap, Uri};

fn host_matches(origin_host: &str, allowed_host: &str) -> bool {
    origin_host.eq_ignore_ascii_case(allowed_host)
}

fn is_localhost(origin_host: &str) -> bool {
    origin_host.eq_ignore_ascii_case("localhost") || origin_host == "127.0.0.1" || origin_host == "::1"
}

fn is_mdns_subdomain(origin_host: &str, mdns_domain: &str) -> bool {
    origin_host.eq_ignore_ascii_case(mdns_domain)
        || origin_host
            .to_ascii_lowercase()
            .ends_with(&format!(".{}", mdns_domain.to_ascii_lowercase()))
}

/// Parse the `Origin` header's host (without scheme/port) if present.
fn origin_host(headers: &HeaderMap) -> Option<String> {
    let raw = headers.get("origin")?.to_str().ok()?;
    let uri: Uri = raw.parse().ok()?;
    uri.host().map(str::to_string)
}

/// Validate a WS upgrade's `Origin` header against the request's own
/// `Host` header and, when configured, `*.<mdns_domain>`. Requests with
/// no `Origin` header (non-browser clients) are allowed through; browsers
/// always send one on cross-origin and same-origin WS upgrades alike.
#[must_use]
pub fn is_allowed(headers: &HeaderMap, request_host: &str, mdns_domain: Option<&str>) -> bool {
    let Some(origin_host) = origin_host(headers) else {
        return true;
    };

    let request_host_only = request_host.split(':').next().unwrap_or(request_host);

    if is_localhost(&origin_host) || host_matches(&origin_host, request_host_only) {
        return true;
    }

    if let Some(domain) = mdns_domain {
        if is_mdns_subdomain(&origin_host, domain) {
            return true;
        }
    }

    false
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers_with_origin(origin: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert("origin", origin.parse().unwrap());
        headers
    }

    #[test]
    fn no_origin_header_is_allowed() {
        assert!(is_allowed(&HeaderMap::new(), "box.local", None));
    }

    #[test]
    fn matching_host_is_allowed() {
        let headers = headers_with_origin("http://box.local:8080");
        assert!(is_allowed(&headers, "box.local", None));
    }

    #[test]
    fn localhost_is_always_allowed() {
        let headers = headers_with_origin("http://localhost:3000");
        assert!(is_allowed(&headers, "box.local", None));
    }

    #[test]
    fn mdns_subdomain_is_allowed_when_configured() {
        let headers = headers_with_origin("https://laptop.mybox.local");
        assert!(is_allowed(&headers, "box.local", Some("mybox.local")));
    }

    #[test]
    fn unrelated_origin_is_rejected() {
        let headers = headers_with_origin("https://evil.example.com");
        assert!(!is_allowed(&headers, "box.local", Some("mybox.local")));
    }

    #[test]
    fn unrelated_origin_with_no_mdns_configured_is_rejected() {
        let headers = headers_with_origin("https://evil.example.com");
        assert!(!is_allowed(&headers, "box.local", None));
    }
}
