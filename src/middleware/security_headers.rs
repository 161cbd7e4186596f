//! Security headers middleware — response-only
//!
//! The cross-origin policies are deliberately loosened: the SPA lives on a
//! different origin than the gateway, and the OAuth popup flow breaks under
//! a strict opener policy.

use super::{Middleware, RequestContext};
use crate::error::Result;
use async_trait::async_trait;
use http::Response;

const SECURITY_HEADERS: &[(&str, &str)] = &[
    ("Cross-Origin-Resource-Policy", "cross-origin"),
    ("Cross-Origin-Opener-Policy", "unsafe-none"),
    ("X-Content-Type-Options", "nosniff"),
    ("X-Frame-Options", "SAMEORIGIN"),
    ("X-DNS-Prefetch-Control", "off"),
    ("Referrer-Policy", "no-referrer"),
];

/// Security headers middleware
pub struct SecurityHeadersMiddleware;

impl SecurityHeadersMiddleware {
    /// Create the security headers middleware
    pub fn new() -> Self {
        Self
    }
}

impl Default for SecurityHeadersMiddleware {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Middleware for SecurityHeadersMiddleware {
    async fn handle_request(
        &self,
        _req: &mut http::request::Parts,
        _ctx: &RequestContext,
    ) -> Result<Option<Response<Vec<u8>>>> {
        Ok(None)
    }

    async fn handle_response(&self, resp: &mut http::response::Parts) -> Result<()> {
        for (name, value) in SECURITY_HEADERS {
            if let (Ok(name), Ok(val)) = (
                name.parse::<http::header::HeaderName>(),
                value.parse::<http::header::HeaderValue>(),
            ) {
                resp.headers.insert(name, val);
            }
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "security-headers"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::Request;

    fn make_ctx() -> RequestContext {
        RequestContext {
            client_ip: "127.0.0.1".to_string(),
        }
    }

    #[tokio::test]
    async fn test_request_passthrough() {
        let mw = SecurityHeadersMiddleware::new();
        let (mut parts, _) = Request::builder().body(()).unwrap().into_parts();
        let result = mw.handle_request(&mut parts, &make_ctx()).await.unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_response_headers_applied() {
        let mw = SecurityHeadersMiddleware::new();
        let (mut parts, _) = Response::builder().status(200).body(()).unwrap().into_parts();
        mw.handle_response(&mut parts).await.unwrap();

        assert_eq!(
            parts.headers.get("Cross-Origin-Resource-Policy").unwrap(),
            "cross-origin"
        );
        assert_eq!(
            parts.headers.get("Cross-Origin-Opener-Policy").unwrap(),
            "unsafe-none"
        );
        assert_eq!(parts.headers.get("X-Content-Type-Options").unwrap(), "nosniff");
    }

    #[tokio::test]
    async fn test_existing_header_overwritten() {
        let mw = SecurityHeadersMiddleware::new();
        let (mut parts, _) = Response::builder()
            .status(200)
            .header("X-Frame-Options", "DENY")
            .body(())
            .unwrap()
            .into_parts();
        mw.handle_response(&mut parts).await.unwrap();
        assert_eq!(parts.headers.get("X-Frame-Options").unwrap(), "SAMEORIGIN");
    }

    #[test]
    fn test_name() {
        assert_eq!(SecurityHeadersMiddleware::new().name(), "security-headers");
    }
}
