//! SSRF (Server-Side Request Forgery) protection for source fetches.
//!
//! A forged request could point the source URL at an internal service and
//! have the pipeline cache whatever it answers. Literal IP hosts are
//! validated against private/reserved ranges before any connection is made.

use std::net::IpAddr;

use url::{Host, Url};

/// Error type for SSRF validation failures.
#[derive(Debug, Clone, thiserror::Error)]
pub enum SsrfError {
    #[error("blocked IP: {0} (private/reserved)")]
    BlockedIp(IpAddr),
}

/// Check if an IP address is private, reserved, or otherwise blocked.
///
/// This covers:
/// - Loopback addresses (127.0.0.0/8, ::1)
/// - RFC 1918 private ranges (10/8, 172.16/12, 192.168/16)
/// - Link-local addresses (169.254/16, fe80::/10)
/// - Multicast addresses (224/4, ff00::/8)
/// - Unspecified addresses (0.0.0.0/8, ::)
/// - IPv6 unique local (fc00::/7)
pub fn is_private_or_reserved(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => {
            v4.is_loopback()
                || v4.is_private()
                || v4.is_link_local()
                || v4.is_multicast()
                || v4.is_broadcast()
                || v4.is_unspecified()
                || v4.octets()[0] == 0
        }
        IpAddr::V6(v6) => {
            v6.is_loopback()
                || v6.is_multicast()
                || v6.is_unspecified()
                || (v6.segments()[0] & 0xfe00) == 0xfc00
                || (v6.segments()[0] & 0xffc0) == 0xfe80
        }
    }
}

/// Validate that an IP address is not private or reserved.
pub fn validate_ip(ip: IpAddr) -> Result<(), SsrfError> {
    if is_private_or_reserved(ip) { Err(SsrfError::BlockedIp(ip)) } else { Ok(()) }
}

/// Validate a canonicalized URL whose host is an IP literal.
///
/// Hostname-based targets resolve at connect time and are accepted here.
pub fn validate_url(url: &Url) -> Result<(), SsrfError> {
    match url.host() {
        Some(Host::Ipv4(ip)) => validate_ip(IpAddr::V4(ip)),
        Some(Host::Ipv6(ip)) => validate_ip(IpAddr::V6(ip)),
        _ => Ok(()),
    }
}
