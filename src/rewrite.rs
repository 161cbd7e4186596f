//! Response header rewriting — pure string transformations
//!
//! The rewrite rules are plain functions so they can be tested without any
//! proxy machinery. The server applies [`rewrite_location`] to the user
//! service's redirect responses and [`rewrite_cookie_domain`] to every
//! forwarded `Set-Cookie` header.

/// Rewrite a `Location` header from the user service.
///
/// Two rules, checked in order:
/// 1. A location starting with `/auth` is prefixed with `/api/users` so the
///    browser's next request flows back through the gateway mount.
/// 2. An absolute `http(s)` location containing `/auth/success` has its
///    scheme and host replaced by the frontend origin, completing the OAuth
///    handoff to the SPA. Path and query are preserved.
///
/// An input matching both (e.g. `/auth/success?token=x`) takes rule 1.
/// Returns `None` when the location passes through unchanged.
pub fn rewrite_location(location: &str, frontend_origin: &str) -> Option<String> {
    if location.starts_with("/auth") {
        return Some(format!("/api/users{}", location));
    }
    if location.contains("/auth/success") {
        let rest = location
            .strip_prefix("https://")
            .or_else(|| location.strip_prefix("http://"))?;
        let path = rest.find('/').map(|i| &rest[i..]).unwrap_or("");
        return Some(format!("{}{}", frontend_origin, path));
    }
    None
}

/// Rewrite the `Domain` attribute of a forwarded `Set-Cookie` header.
///
/// Cookies issued by a downstream service carry the downstream's own domain;
/// substituting the gateway's public domain keeps them valid for the host the
/// browser is actually talking to. A cookie without a `Domain` attribute is
/// already host-scoped and passes through untouched.
pub fn rewrite_cookie_domain(set_cookie: &str, domain: &str) -> String {
    if !has_domain_attribute(set_cookie) {
        return set_cookie.to_string();
    }
    set_cookie
        .split(';')
        .map(|part| {
            let trimmed = part.trim();
            if trimmed.len() >= 7 && trimmed[..7].eq_ignore_ascii_case("domain=") {
                format!("Domain={}", domain)
            } else {
                trimmed.to_string()
            }
        })
        .collect::<Vec<_>>()
        .join("; ")
}

fn has_domain_attribute(set_cookie: &str) -> bool {
    set_cookie.split(';').any(|part| {
        let trimmed = part.trim();
        trimmed.len() >= 7 && trimmed[..7].eq_ignore_ascii_case("domain=")
    })
}
