//! HTTP reverse proxy — forwards requests to downstream services
//!
//! One pooled client serves every mount. Forwarding is a single upstream
//! call per request: no retries, no circuit breaking, and no gateway-level
//! timeout — a hung downstream hangs the in-flight request, bounded only by
//! socket defaults. Streaming-shaped responses (SSE, chunked) are relayed
//! as a byte stream; everything else is buffered and relayed whole.

use crate::error::{GatewayError, Result};
use bytes::Bytes;
use futures_util::Stream;

/// HTTP reverse proxy
pub struct HttpProxy {
    client: reqwest::Client,
}

impl HttpProxy {
    /// Create a new proxy with a pooled upstream client
    pub fn new() -> Self {
        let client = reqwest::Client::builder()
            .pool_max_idle_per_host(100)
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .unwrap_or_default();

        Self { client }
    }

    /// Forward a request to `target`, with the mount prefix already stripped
    /// from `path_and_query`.
    ///
    /// The `Host` header presented upstream is derived from the target URL,
    /// not copied from the client — downstream frameworks that validate or
    /// log `Host` see their own address.
    pub async fn forward(
        &self,
        target: &str,
        method: &http::Method,
        path_and_query: &str,
        headers: &http::HeaderMap,
        body: Bytes,
    ) -> Result<ProxyResponse> {
        let upstream_url = format!("{}{}", target.trim_end_matches('/'), path_and_query);

        let mut req_builder = self.client.request(method.clone(), &upstream_url);

        for (key, value) in headers.iter() {
            if !skip_request_header(key.as_str()) {
                req_builder = req_builder.header(key.clone(), value.clone());
            }
        }

        req_builder = req_builder.body(body);

        let response = req_builder.send().await.map_err(|e| {
            if e.is_connect() {
                GatewayError::ServiceUnavailable(format!(
                    "Cannot connect to {}: {}",
                    target, e
                ))
            } else {
                GatewayError::Http(e)
            }
        })?;

        let status = response.status();
        let resp_headers = response.headers().clone();

        let body = if is_streaming_response(&resp_headers) {
            ProxyBody::Streaming(Box::new(response.bytes_stream()))
        } else {
            ProxyBody::Buffered(response.bytes().await.map_err(GatewayError::Http)?)
        };

        Ok(ProxyResponse {
            status,
            headers: resp_headers,
            body,
        })
    }
}

impl Default for HttpProxy {
    fn default() -> Self {
        Self::new()
    }
}

/// Response from a downstream service
pub struct ProxyResponse {
    /// HTTP status code
    pub status: reqwest::StatusCode,
    /// Response headers as sent by the downstream
    pub headers: reqwest::header::HeaderMap,
    /// Response body, buffered or streamed
    pub body: ProxyBody,
}

/// Downstream response body
pub enum ProxyBody {
    /// Fully collected body
    Buffered(Bytes),
    /// Passthrough byte stream, relayed without buffering
    Streaming(Box<dyn Stream<Item = reqwest::Result<Bytes>> + Send + Unpin>),
}

impl std::fmt::Debug for ProxyBody {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProxyBody::Buffered(bytes) => f.debug_tuple("Buffered").field(bytes).finish(),
            ProxyBody::Streaming(_) => f.debug_tuple("Streaming").finish(),
        }
    }
}

impl std::fmt::Debug for ProxyResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProxyResponse")
            .field("status", &self.status)
            .field("headers", &self.headers)
            .field("body", &self.body)
            .finish()
    }
}

/// Headers never copied onto the upstream request: hop-by-hop headers plus
/// `Host` (regenerated from the target URL) and `Content-Length`
/// (recomputed from the forwarded body).
fn skip_request_header(name: &str) -> bool {
    name.eq_ignore_ascii_case("host")
        || name.eq_ignore_ascii_case("content-length")
        || is_hop_by_hop(name)
}

/// Check if a header is a hop-by-hop header that must not be forwarded
pub fn is_hop_by_hop(name: &str) -> bool {
    matches!(
        name.to_lowercase().as_str(),
        "connection"
            | "keep-alive"
            | "proxy-authenticate"
            | "proxy-authorization"
            | "te"
            | "trailers"
            | "transfer-encoding"
            | "upgrade"
    )
}

/// Check if a downstream response should be relayed as a stream
fn is_streaming_response(headers: &reqwest::header::HeaderMap) -> bool {
    if let Some(ct) = headers.get("content-type").and_then(|v| v.to_str().ok()) {
        if ct.contains("text/event-stream") || ct.contains("application/x-ndjson") {
            return true;
        }
    }
    if let Some(te) = headers
        .get("transfer-encoding")
        .and_then(|v| v.to_str().ok())
    {
        if te.contains("chunked") {
            return true;
        }
    }
    false
}
