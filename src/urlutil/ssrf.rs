//! Server-side request forgery guard
//!
//! Before any fetch, the target host is resolved and every address is
//! checked against loopback, private, link-local, multicast, and
//! unspecified ranges. Hostnames with internal-looking suffixes are denied
//! without resolving. A config flag can disable the guard for test fixtures
//! served from localhost.

use std::net::IpAddr;
use url::Url;

/// Outcome of the pre-fetch address check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SsrfVerdict {
    /// Every resolved address is publicly routable.
    Public,
    /// The host resolves to (or names) a non-public target.
    Denied(String),
    /// DNS resolution failed; a transport problem, not a policy one.
    Unresolvable(String),
}

/// Hostname suffixes that never leave the local environment.
const INTERNAL_SUFFIXES: [&str; 3] = [".localhost", ".local", ".internal"];

/// Classify a URL's host before fetching it.
pub async fn check_url(url: &Url, allow_private: bool) -> SsrfVerdict {
    if allow_private {
        return SsrfVerdict::Public;
    }

    let Some(host) = url.host_str() else {
        return SsrfVerdict::Denied("URL has no host".to_string());
    };
    let host = host.trim_matches(|c| c == '[' || c == ']');

    if let Ok(ip) = host.parse::<IpAddr>() {
        return verdict_for_ips(host, &[ip]);
    }

    let lowered = host.to_ascii_lowercase();
    if lowered == "localhost" || INTERNAL_SUFFIXES.iter().any(|s| lowered.ends_with(s)) {
        return SsrfVerdict::Denied(format!("host '{host}' matches an internal name pattern"));
    }

    let port = url.port_or_known_default().unwrap_or(80);
    match tokio::net::lookup_host((host, port)).await {
        Ok(addrs) => {
            let ips: Vec<IpAddr> = addrs.map(|a| a.ip()).collect();
            if ips.is_empty() {
                return SsrfVerdict::Unresolvable(format!("host '{host}' resolved to no addresses"));
            }
            verdict_for_ips(host, &ips)
        }
        Err(e) => SsrfVerdict::Unresolvable(format!("DNS resolution failed for '{host}': {e}")),
    }
}

fn verdict_for_ips(host: &str, ips: &[IpAddr]) -> SsrfVerdict {
    for ip in ips {
        if let Some(kind) = non_public_kind(*ip) {
            return SsrfVerdict::Denied(format!("host '{host}' resolves to {kind} address {ip}"));
        }
    }
    SsrfVerdict::Public
}

fn non_public_kind(ip: IpAddr) -> Option<&'static str> {
    match ip {
        IpAddr::V4(v4) => {
            if v4.is_loopback() {
                Some("a loopback")
            } else if v4.is_private() {
                Some("a private")
            } else if v4.is_link_local() {
                Some("a link-local")
            } else if v4.is_multicast() {
                Some("a multicast")
            } else if v4.is_unspecified() {
                Some("an unspecified")
            } else {
                None
            }
        }
        IpAddr::V6(v6) => {
            let seg = v6.segments();
            if v6.is_loopback() {
                Some("a loopback")
            } else if (seg[0] & 0xfe00) == 0xfc00 {
                // fc00::/7 unique local
                Some("a private")
            } else if (seg[0] & 0xffc0) == 0xfe80 {
                // fe80::/10 link local
                Some("a link-local")
            } else if v6.is_multicast() {
                Some("a multicast")
            } else if v6.is_unspecified() {
                Some("an unspecified")
            } else {
                None
            }
        }
    }
}
