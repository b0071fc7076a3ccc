//! IP anonymization and request identity helpers for the gateway.
//!
//! Raw addresses never reach the store: only a salted, truncated SHA-256
//! digest is kept, and the user id derives from that digest.

use axum::http::HeaderMap;
use sha2::{Digest, Sha256};

/// Salted SHA-256 of an IP address, truncated to 16 hex chars.
pub fn hash_ip(ip_address: &str, salt: &str) -> String {
    if ip_address.is_empty() {
        return "unknown".to_string();
    }

    let mut hasher = Sha256::new();
    hasher.update(ip_address.as_bytes());
    hasher.update(salt.as_bytes());
    let digest = hasher.finalize();
    hex::encode(digest)[..16].to_string()
}

/// Stable per-visitor identifier derived from the IP hash.
pub fn user_id_from_hash(ip_hash: &str) -> String {
    format!("user_{ip_hash}")
}

/// Normalized question digest for dedup, truncated to 16 hex chars.
pub fn hash_question(question: &str) -> String {
    let normalized = question.trim().to_lowercase();
    let mut hasher = Sha256::new();
    hasher.update(normalized.as_bytes());
    hex::encode(hasher.finalize())[..16].to_string()
}

/// Resolve the client IP, preferring proxy headers over the socket address.
///
/// Header precedence matches common reverse-proxy setups: X-Forwarded-For
/// (first hop), X-Real-IP, CF-Connecting-IP, X-Client-IP, then the direct
/// connection.
pub fn client_ip(headers: &HeaderMap, socket_addr: Option<&str>) -> String {
    if let Some(forwarded) = header_str(headers, "x-forwarded-for") {
        if let Some(first) = forwarded.split(',').next() {
            let first = first.trim();
            if !first.is_empty() {
                return first.to_string();
            }
        }
    }

    for name in ["x-real-ip", "cf-connecting-ip", "x-client-ip"] {
        if let Some(value) = header_str(headers, name) {
            let value = value.trim();
            if !value.is_empty() {
                return value.to_string();
            }
        }
    }

    socket_addr
        .map(str::to_string)
        .unwrap_or_else(|| "unknown".to_string())
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn ip_hash_is_stable_and_salted() {
        let a = hash_ip("203.0.113.7", "salt-a");
        assert_eq!(a, hash_ip("203.0.113.7", "salt-a"));
        assert_eq!(a.len(), 16);
        assert_ne!(a, hash_ip("203.0.113.7", "salt-b"));
        assert_ne!(a, hash_ip("203.0.113.8", "salt-a"));
    }

    #[test]
    fn empty_ip_hashes_to_unknown() {
        assert_eq!(hash_ip("", "salt"), "unknown");
    }

    #[test]
    fn question_hash_normalizes_case_and_whitespace() {
        assert_eq!(hash_question("  Should I GO?  "), hash_question("should i go?"));
    }

    #[test]
    fn forwarded_for_takes_first_hop() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-forwarded-for",
            HeaderValue::from_static("198.51.100.1, 10.0.0.2"),
        );
        headers.insert("x-real-ip", HeaderValue::from_static("10.0.0.9"));
        assert_eq!(client_ip(&headers, Some("127.0.0.1")), "198.51.100.1");
    }

    #[test]
    fn falls_back_to_socket_addr() {
        let headers = HeaderMap::new();
        assert_eq!(client_ip(&headers, Some("192.0.2.4")), "192.0.2.4");
        assert_eq!(client_ip(&headers, None), "unknown");
    }
}
