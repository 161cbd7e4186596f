//! CORS middleware — single-origin, credentialed
//!
//! The gateway serves exactly one browser origin: the configured frontend.
//! Credentials are always allowed, so the allowed origin is echoed verbatim
//! (a wildcard would be rejected by browsers alongside credentials).

use super::{Middleware, RequestContext};
use crate::config::GatewayConfig;
use crate::error::Result;
use async_trait::async_trait;
use http::Response;

const ALLOWED_METHODS: &str = "GET, POST, PUT, DELETE, OPTIONS";
const ALLOWED_HEADERS: &str = "Content-Type, Authorization";
const EXPOSED_HEADERS: &str = "set-cookie";
const MAX_AGE_SECS: u64 = 86400;

/// CORS middleware
pub struct CorsMiddleware {
    allowed_origin: String,
}

impl CorsMiddleware {
    /// Create the CORS middleware for the configured frontend origin
    pub fn new(config: &GatewayConfig) -> Self {
        Self {
            allowed_origin: config.frontend_url.clone(),
        }
    }
}

#[async_trait]
impl Middleware for CorsMiddleware {
    async fn handle_request(
        &self,
        req: &mut http::request::Parts,
        _ctx: &RequestContext,
    ) -> Result<Option<Response<Vec<u8>>>> {
        // Preflight requests are answered here; they never reach a mount.
        if req.method == http::Method::OPTIONS {
            let origin = req
                .headers
                .get("Origin")
                .and_then(|v| v.to_str().ok())
                .unwrap_or_default();

            if origin != self.allowed_origin {
                return Ok(Some(
                    Response::builder()
                        .status(403)
                        .header("Content-Type", "application/json")
                        .body(br#"{"error":"Origin not allowed"}"#.to_vec())
                        .unwrap(),
                ));
            }

            let response = Response::builder()
                .status(204)
                .header("Access-Control-Allow-Origin", origin)
                .header("Access-Control-Allow-Credentials", "true")
                .header("Access-Control-Allow-Methods", ALLOWED_METHODS)
                .header("Access-Control-Allow-Headers", ALLOWED_HEADERS)
                .header("Access-Control-Max-Age", MAX_AGE_SECS.to_string())
                .header("Vary", "Origin")
                .body(Vec::new())
                .unwrap();

            return Ok(Some(response));
        }

        Ok(None)
    }

    async fn handle_response(&self, resp: &mut http::response::Parts) -> Result<()> {
        let headers = [
            ("Access-Control-Allow-Origin", self.allowed_origin.as_str()),
            ("Access-Control-Allow-Credentials", "true"),
            ("Access-Control-Expose-Headers", EXPOSED_HEADERS),
            ("Vary", "Origin"),
        ];
        for (name, value) in headers {
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
        "cors"
    }
}
