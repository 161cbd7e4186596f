//! Session cookies — signed, opaque, infrastructure-only
//!
//! The gateway issues an opaque session cookie for downstream auth plumbing;
//! no business data is stored behind it. The cookie value is
//! `<uuid>.<signature>` where the signature is an HMAC-SHA256 of the id
//! keyed by the configured secret, base64url-encoded. A request presenting a
//! correctly signed cookie keeps it; anything else gets a fresh one.

use crate::config::Environment;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;

/// Session cookie name
pub const SESSION_COOKIE: &str = "tymout.sid";

/// Session lifetime: 24 hours
const SESSION_MAX_AGE_SECS: u64 = 24 * 60 * 60;

/// Validates and issues session cookies
pub struct SessionLayer {
    key: ring::hmac::Key,
    environment: Environment,
}

impl SessionLayer {
    /// Create a session layer from the signing secret
    pub fn new(secret: &str, environment: Environment) -> Self {
        Self {
            key: ring::hmac::Key::new(ring::hmac::HMAC_SHA256, secret.as_bytes()),
            environment,
        }
    }

    /// Inspect the request's `Cookie` header.
    ///
    /// Returns a `Set-Cookie` value to attach to the response when the
    /// request carried no valid session, or `None` when the existing
    /// session is accepted.
    pub fn check(&self, cookie_header: Option<&str>) -> Option<String> {
        if let Some(value) = cookie_header.and_then(|h| extract_cookie(h, SESSION_COOKIE)) {
            if self.verify(value) {
                return None;
            }
        }
        Some(self.build_cookie(&self.issue()))
    }

    /// Mint a fresh signed session value
    fn issue(&self) -> String {
        let sid = uuid::Uuid::new_v4().to_string();
        let tag = ring::hmac::sign(&self.key, sid.as_bytes());
        format!("{}.{}", sid, URL_SAFE_NO_PAD.encode(tag.as_ref()))
    }

    /// Verify a presented `<sid>.<signature>` value
    fn verify(&self, value: &str) -> bool {
        let Some((sid, tag)) = value.split_once('.') else {
            return false;
        };
        let Ok(tag_bytes) = URL_SAFE_NO_PAD.decode(tag) else {
            return false;
        };
        ring::hmac::verify(&self.key, sid.as_bytes(), &tag_bytes).is_ok()
    }

    /// Build the `Set-Cookie` header for a session value.
    ///
    /// Production cookies must survive the cross-site OAuth redirect, so
    /// they are `Secure; SameSite=None`. Development runs over plain HTTP
    /// and uses `SameSite=Lax` instead.
    fn build_cookie(&self, value: &str) -> String {
        if self.environment.is_production() {
            format!(
                "{}={}; Path=/; Max-Age={}; HttpOnly; Secure; SameSite=None",
                SESSION_COOKIE, value, SESSION_MAX_AGE_SECS
            )
        } else {
            format!(
                "{}={}; Path=/; Max-Age={}; HttpOnly; SameSite=Lax",
                SESSION_COOKIE, value, SESSION_MAX_AGE_SECS
            )
        }
    }
}

/// Extract a named cookie's value from a `Cookie` header
pub fn extract_cookie<'a>(cookie_header: &'a str, name: &str) -> Option<&'a str> {
    for part in cookie_header.split(';') {
        let trimmed = part.trim();
        if let Some(value) = trimmed.strip_prefix(name) {
            if let Some(value) = value.strip_prefix('=') {
                if !value.is_empty() {
                    return Some(value);
                }
            }
        }
    }
    None
}
