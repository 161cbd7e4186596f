//! HTTP entrypoint — accepts connections and drives the request flow
//!
//! Per request: session check → cross-cutting middleware → `/health` →
//! route match (first prefix wins) → prefix strip → forward → response
//! header rewriting → response-phase middleware → access log.
//!
//! Each connection runs on its own task; the only state shared across
//! requests is the immutable [`ServerState`], so no locking is involved.

use crate::access_log::AccessLog;
use crate::config::{GatewayConfig, ServiceDomain};
use crate::error::{GatewayError, Result};
use crate::health;
use crate::middleware::{
    CorsMiddleware, Middleware, Pipeline, RequestContext, SecurityHeadersMiddleware,
};
use crate::proxy::{is_hop_by_hop, HttpProxy, ProxyBody};
use crate::rewrite::{rewrite_cookie_domain, rewrite_location};
use crate::router::{strip_route_prefix, RouteTable};
use crate::session::SessionLayer;
use bytes::Bytes;
use futures_util::{Stream, StreamExt};
use http_body_util::combinators::UnsyncBoxBody;
use http_body_util::{BodyExt, Full, StreamBody};
use hyper::body::{Frame, Incoming};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;

/// Response body relayed to the client — buffered or streamed passthrough
pub type GatewayBody = UnsyncBoxBody<Bytes, std::io::Error>;

/// Immutable per-process state shared by all requests
pub struct ServerState {
    pub config: GatewayConfig,
    pub routes: RouteTable,
    pub pipeline: Pipeline,
    pub proxy: HttpProxy,
    pub sessions: SessionLayer,
    pub access_log: AccessLog,
}

impl ServerState {
    /// Assemble the full request-handling state from resolved configuration
    pub fn new(config: GatewayConfig) -> Self {
        let routes = RouteTable::from_config(&config);
        let middlewares: Vec<Arc<dyn Middleware>> = vec![
            Arc::new(CorsMiddleware::new(&config)),
            Arc::new(SecurityHeadersMiddleware::new()),
        ];
        let sessions = SessionLayer::new(&config.cookie_secret, config.environment);

        Self {
            routes,
            pipeline: Pipeline::new(middlewares),
            proxy: HttpProxy::new(),
            sessions,
            access_log: AccessLog::new(),
            config,
        }
    }
}

/// Bind the listener and start accepting connections
pub async fn start(
    addr: SocketAddr,
    state: Arc<ServerState>,
) -> Result<tokio::task::JoinHandle<()>> {
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|e| GatewayError::Other(format!("Failed to bind {}: {}", addr, e)))?;

    tracing::info!(
        address = %addr,
        routes = state.routes.len(),
        environment = %state.config.environment,
        "API gateway listening"
    );

    let handle = tokio::spawn(async move {
        loop {
            let (stream, remote_addr) = match listener.accept().await {
                Ok(conn) => conn,
                Err(e) => {
                    tracing::error!(error = %e, "Failed to accept connection");
                    continue;
                }
            };

            let state = state.clone();
            tokio::spawn(async move {
                let io = TokioIo::new(stream);
                let _ = http1::Builder::new()
                    .serve_connection(
                        io,
                        service_fn(|req| handle_request(req, remote_addr, state.clone())),
                    )
                    .await;
            });
        }
    });

    Ok(handle)
}

/// Handle an individual HTTP request
async fn handle_request(
    req: hyper::Request<Incoming>,
    remote_addr: SocketAddr,
    state: Arc<ServerState>,
) -> std::result::Result<hyper::Response<GatewayBody>, hyper::Error> {
    let tracker = state.access_log.start_request();
    let (mut parts, body) = req.into_parts();

    let client_ip = remote_addr.ip().to_string();
    let method = parts.method.to_string();
    let path = parts.uri.path().to_string();
    let user_agent = parts
        .headers
        .get("user-agent")
        .and_then(|v| v.to_str().ok())
        .map(String::from);

    // Session check runs first; the issued cookie (if any) is attached to
    // whatever response this request ends up with.
    let session_cookie = state
        .sessions
        .check(parts.headers.get("cookie").and_then(|v| v.to_str().ok()));

    let ctx = RequestContext {
        client_ip: client_ip.clone(),
    };

    // Cross-cutting middleware; CORS preflights short-circuit here.
    match state.pipeline.process_request(&mut parts, &ctx).await {
        Ok(Some(response)) => {
            let (resp_parts, body) = response.into_parts();
            let size = body.len() as u64;
            let response = finish(&state, resp_parts, full_body(body), session_cookie).await;
            state.access_log.record(&tracker.build_entry(
                client_ip,
                method,
                path,
                response.status().as_u16(),
                size,
                None,
                user_agent,
            ));
            return Ok(response);
        }
        Ok(None) => {}
        Err(e) => {
            tracing::error!(error = %e, "Middleware error");
            let (response, size) = error_response(&state, &e, session_cookie).await;
            state.access_log.record(&tracker.build_entry(
                client_ip,
                method,
                path,
                500,
                size,
                None,
                user_agent,
            ));
            return Ok(response);
        }
    }

    // Health endpoint — reports configured targets, probes nothing.
    if path == "/health" && parts.method == http::Method::GET {
        let (status, body) = health::respond(&state.config);
        let (response, size) = json_response(&state, status, body, session_cookie).await;
        state.access_log.record(&tracker.build_entry(
            client_ip,
            method,
            path,
            status,
            size,
            None,
            user_agent,
        ));
        return Ok(response);
    }

    // Route match: ordered prefix table, first match wins.
    let Some(binding) = state.routes.match_path(&path) else {
        let (response, size) = json_response(
            &state,
            404,
            r#"{"error":"Not found"}"#.to_string(),
            session_cookie,
        )
        .await;
        state.access_log.record(&tracker.build_entry(
            client_ip,
            method,
            path,
            404,
            size,
            None,
            user_agent,
        ));
        return Ok(response);
    };

    let body_bytes = match body.collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(_) => Bytes::new(),
    };

    let forwarded_path = strip_route_prefix(&path, binding.prefix);
    let path_and_query = match parts.uri.query() {
        Some(query) => format!("{}?{}", forwarded_path, query),
        None => forwarded_path,
    };

    match state
        .proxy
        .forward(
            &binding.target,
            &parts.method,
            &path_and_query,
            &parts.headers,
            body_bytes,
        )
        .await
    {
        Ok(proxy_resp) => {
            let mut builder = hyper::Response::builder().status(proxy_resp.status.as_u16());
            for (key, value) in proxy_resp.headers.iter() {
                if !is_hop_by_hop(key.as_str()) {
                    builder = builder.header(key, value);
                }
            }
            let (mut resp_parts, _) = builder.body(()).unwrap().into_parts();

            // The user service emits OAuth redirects addressed to itself;
            // retarget them through the gateway or to the frontend.
            if binding.domain == ServiceDomain::User {
                if let Some(location) = resp_parts
                    .headers
                    .get(http::header::LOCATION)
                    .and_then(|v| v.to_str().ok())
                {
                    if let Some(rewritten) =
                        rewrite_location(location, &state.config.frontend_url)
                    {
                        if let Ok(value) = rewritten.parse() {
                            resp_parts.headers.insert(http::header::LOCATION, value);
                        }
                    }
                }
            }

            rewrite_set_cookies(&mut resp_parts.headers, state.config.cookie_rewrite_domain());

            let (relay_body, size) = match proxy_resp.body {
                ProxyBody::Buffered(bytes) => {
                    let size = bytes.len() as u64;
                    (full_body(bytes), size)
                }
                ProxyBody::Streaming(stream) => (stream_body(stream), 0),
            };

            let response = finish(&state, resp_parts, relay_body, session_cookie).await;
            state.access_log.record(&tracker.build_entry(
                client_ip,
                method,
                path,
                response.status().as_u16(),
                size,
                Some(binding.domain.name().to_string()),
                user_agent,
            ));
            Ok(response)
        }
        Err(e) => {
            tracing::error!(error = %e, target = binding.target, "Proxy error");
            let (response, size) = error_response(&state, &e, session_cookie).await;
            state.access_log.record(&tracker.build_entry(
                client_ip,
                method,
                path,
                500,
                size,
                Some(binding.domain.name().to_string()),
                user_agent,
            ));
            Ok(response)
        }
    }
}

/// Wrap a fully buffered body
fn full_body(bytes: impl Into<Bytes>) -> GatewayBody {
    Full::new(bytes.into())
        .map_err(std::io::Error::other)
        .boxed_unsync()
}

/// Relay a downstream byte stream without buffering
fn stream_body(
    stream: impl Stream<Item = reqwest::Result<Bytes>> + Send + Unpin + 'static,
) -> GatewayBody {
    let frames = stream.map(|chunk| chunk.map(Frame::data).map_err(std::io::Error::other));
    StreamBody::new(frames).boxed_unsync()
}

/// Rewrite the `Domain` attribute on every forwarded `Set-Cookie` header
fn rewrite_set_cookies(headers: &mut http::HeaderMap, domain: &str) {
    let rewritten: Vec<http::HeaderValue> = headers
        .get_all(http::header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .map(|v| rewrite_cookie_domain(v, domain))
        .filter_map(|v| v.parse().ok())
        .collect();

    if !rewritten.is_empty() {
        headers.remove(http::header::SET_COOKIE);
        for value in rewritten {
            headers.append(http::header::SET_COOKIE, value);
        }
    }
}

/// Run response-phase middleware and attach the session cookie
async fn finish(
    state: &ServerState,
    mut parts: http::response::Parts,
    body: GatewayBody,
    session_cookie: Option<String>,
) -> hyper::Response<GatewayBody> {
    if let Err(e) = state.pipeline.process_response(&mut parts).await {
        tracing::warn!(error = %e, "Response middleware error");
    }
    if let Some(cookie) = session_cookie {
        if let Ok(value) = cookie.parse() {
            parts.headers.append(http::header::SET_COOKIE, value);
        }
    }
    hyper::Response::from_parts(parts, body)
}

/// Build a gateway-authored JSON response
async fn json_response(
    state: &ServerState,
    status: u16,
    body: String,
    session_cookie: Option<String>,
) -> (hyper::Response<GatewayBody>, u64) {
    let size = body.len() as u64;
    let (parts, _) = hyper::Response::builder()
        .status(status)
        .header("Content-Type", "application/json")
        .body(())
        .unwrap()
        .into_parts();
    (
        finish(state, parts, full_body(body), session_cookie).await,
        size,
    )
}

/// Uniform 500 shape for proxy-level failures; the underlying error message
/// is exposed only outside production.
async fn error_response(
    state: &ServerState,
    err: &GatewayError,
    session_cookie: Option<String>,
) -> (hyper::Response<GatewayBody>, u64) {
    let mut payload = serde_json::json!({ "error": "Something went wrong!" });
    if !state.config.environment.is_production() {
        payload["message"] = serde_json::Value::String(err.to_string());
    }
    json_response(state, 500, payload.to_string(), session_cookie).await
}
