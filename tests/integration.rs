//! Integration tests for the Tymout API gateway
//!
//! These tests spin up real TCP listeners as stub downstream services and
//! verify end-to-end request flow through the gateway.

use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tymout_gateway::{Gateway, GatewayConfig};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Find a free port on localhost
async fn free_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap().port()
}

/// Spawn a stub backend that echoes the request line (method + target) back
/// as the response body — lets tests assert exactly what was forwarded.
async fn spawn_echo_backend() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        loop {
            let (mut stream, _) = match listener.accept().await {
                Ok(s) => s,
                Err(_) => break,
            };
            tokio::spawn(async move {
                let mut buf = vec![0u8; 4096];
                let n = stream.read(&mut buf).await.unwrap_or(0);
                let head = String::from_utf8_lossy(&buf[..n]).to_string();
                let request_line = head.lines().next().unwrap_or("").to_string();
                // Drop the trailing " HTTP/1.1"
                let body = request_line
                    .rsplitn(2, ' ')
                    .nth(1)
                    .unwrap_or("")
                    .to_string();
                let resp = format!(
                    "HTTP/1.1 200 OK\r\nContent-Length: {}\r\nContent-Type: text/plain\r\n\r\n{}",
                    body.len(),
                    body
                );
                let _ = stream.write_all(resp.as_bytes()).await;
                let _ = stream.shutdown().await;
            });
        }
    });

    addr
}

/// Spawn a stub backend that answers every request with a fixed status line
/// and extra headers.
async fn spawn_backend_with(
    status_line: &'static str,
    extra_headers: &'static [(&'static str, &'static str)],
    body: &'static str,
) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        loop {
            let (mut stream, _) = match listener.accept().await {
                Ok(s) => s,
                Err(_) => break,
            };
            tokio::spawn(async move {
                let mut buf = vec![0u8; 4096];
                let _ = stream.read(&mut buf).await;
                let headers: String = extra_headers
                    .iter()
                    .map(|(k, v)| format!("{}: {}\r\n", k, v))
                    .collect();
                let resp = format!(
                    "HTTP/1.1 {}\r\n{}Content-Length: {}\r\n\r\n{}",
                    status_line,
                    headers,
                    body.len(),
                    body
                );
                let _ = stream.write_all(resp.as_bytes()).await;
                let _ = stream.shutdown().await;
            });
        }
    });

    addr
}

/// Build a gateway config from explicit variables, without touching the
/// process environment.
fn test_config(port: u16, vars: Vec<(&'static str, String)>) -> GatewayConfig {
    let mut config =
        GatewayConfig::resolve(|key| vars.iter().find(|(k, _)| *k == key).map(|(_, v)| v.clone()));
    config.port = port;
    config
}

/// Start a gateway and wait for it to accept connections
async fn start_gateway(config: GatewayConfig) -> Arc<Gateway> {
    let port = config.port;
    let gateway = Arc::new(Gateway::new(config));
    gateway.start().await.unwrap();
    wait_ready(port).await;
    gateway
}

/// Wait briefly for the gateway to be ready to accept connections
async fn wait_ready(port: u16) {
    for _ in 0..50 {
        if tokio::net::TcpStream::connect(format!("127.0.0.1:{}", port))
            .await
            .is_ok()
        {
            return;
        }
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
    }
    panic!("Gateway did not become ready on port {}", port);
}

/// HTTP client that does not follow redirects — redirect responses must be
/// observed as the browser would receive them.
fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .unwrap()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_prefix_stripped_and_query_preserved() {
    let port = free_port().await;
    let backend = spawn_echo_backend().await;
    let config = test_config(
        port,
        vec![("EVENT_SERVICE_URL", format!("http://{}", backend))],
    );
    let gateway = start_gateway(config).await;

    let resp = client()
        .get(format!("http://127.0.0.1:{}/api/events/123?page=2", port))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    assert_eq!(resp.text().await.unwrap(), "GET /123?page=2");

    gateway.shutdown().await;
}

#[tokio::test]
async fn test_bare_prefix_forwards_root() {
    let port = free_port().await;
    let backend = spawn_echo_backend().await;
    let config = test_config(
        port,
        vec![("FEEDBACK_SERVICE_URL", format!("http://{}", backend))],
    );
    let gateway = start_gateway(config).await;

    let resp = client()
        .get(format!("http://127.0.0.1:{}/api/feedback", port))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.text().await.unwrap(), "GET /");

    gateway.shutdown().await;
}

#[tokio::test]
async fn test_mounts_route_independently() {
    let port = free_port().await;
    let users = spawn_backend_with("200 OK", &[], "users-service").await;
    let payments = spawn_backend_with("200 OK", &[], "payment-service").await;
    let config = test_config(
        port,
        vec![
            ("USER_SERVICE_URL", format!("http://{}", users)),
            ("PAYMENT_SERVICE_URL", format!("http://{}", payments)),
        ],
    );
    let gateway = start_gateway(config).await;

    let resp = client()
        .get(format!("http://127.0.0.1:{}/api/users/profile", port))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.text().await.unwrap(), "users-service");

    let resp = client()
        .get(format!("http://127.0.0.1:{}/api/payments/checkout", port))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.text().await.unwrap(), "payment-service");

    gateway.shutdown().await;
}

#[tokio::test]
async fn test_health_reports_configured_targets() {
    let port = free_port().await;
    // Nothing is listening on the configured targets; /health must not care.
    let config = test_config(
        port,
        vec![("EVENT_SERVICE_URL", "http://svc:9000".to_string())],
    );
    let gateway = start_gateway(config).await;

    let resp = client()
        .get(format!("http://127.0.0.1:{}/health", port))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["service"], "api-gateway");
    assert_eq!(body["environment"], "development");
    let services = body["services"].as_object().unwrap();
    assert_eq!(services.len(), 9);
    assert_eq!(services["event"], "http://svc:9000");
    assert_eq!(services["user"], "http://localhost:3001");
    assert!(body["timestamp"].as_str().is_some());

    gateway.shutdown().await;
}

#[tokio::test]
async fn test_users_redirect_rewritten_to_gateway_prefix() {
    let port = free_port().await;
    let backend =
        spawn_backend_with("302 Found", &[("Location", "/auth/callback")], "").await;
    let config = test_config(
        port,
        vec![("USER_SERVICE_URL", format!("http://{}", backend))],
    );
    let gateway = start_gateway(config).await;

    let resp = client()
        .get(format!("http://127.0.0.1:{}/api/users/auth/google", port))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 302);
    assert_eq!(
        resp.headers().get("location").unwrap(),
        "/api/users/auth/callback"
    );

    gateway.shutdown().await;
}

#[tokio::test]
async fn test_users_success_redirect_retargets_frontend() {
    let port = free_port().await;
    let backend = spawn_backend_with(
        "302 Found",
        &[("Location", "http://internal-host/auth/success?token=abc")],
        "",
    )
    .await;
    let config = test_config(
        port,
        vec![
            ("USER_SERVICE_URL", format!("http://{}", backend)),
            ("FRONTEND_URL", "https://tymout.app".to_string()),
        ],
    );
    let gateway = start_gateway(config).await;

    let resp = client()
        .get(format!("http://127.0.0.1:{}/api/users/auth/callback", port))
        .send()
        .await
        .unwrap();
    assert_eq!(
        resp.headers().get("location").unwrap(),
        "https://tymout.app/auth/success?token=abc"
    );

    gateway.shutdown().await;
}

#[tokio::test]
async fn test_users_unrelated_redirect_passes_through() {
    let port = free_port().await;
    let backend = spawn_backend_with("302 Found", &[("Location", "/other/path")], "").await;
    let config = test_config(
        port,
        vec![("USER_SERVICE_URL", format!("http://{}", backend))],
    );
    let gateway = start_gateway(config).await;

    let resp = client()
        .get(format!("http://127.0.0.1:{}/api/users/logout", port))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.headers().get("location").unwrap(), "/other/path");

    gateway.shutdown().await;
}

#[tokio::test]
async fn test_non_users_redirect_never_rewritten() {
    let port = free_port().await;
    let backend = spawn_backend_with("302 Found", &[("Location", "/auth/callback")], "").await;
    let config = test_config(
        port,
        vec![("EVENT_SERVICE_URL", format!("http://{}", backend))],
    );
    let gateway = start_gateway(config).await;

    // The rewrite rule is bound to the users mount only.
    let resp = client()
        .get(format!("http://127.0.0.1:{}/api/events/1", port))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.headers().get("location").unwrap(), "/auth/callback");

    gateway.shutdown().await;
}

#[tokio::test]
async fn test_preflight_foreign_origin_rejected() {
    let port = free_port().await;
    let backend = spawn_echo_backend().await;
    let config = test_config(
        port,
        vec![("EVENT_SERVICE_URL", format!("http://{}", backend))],
    );
    let gateway = start_gateway(config).await;

    let resp = client()
        .request(
            reqwest::Method::OPTIONS,
            format!("http://127.0.0.1:{}/api/events/1", port),
        )
        .header("Origin", "https://evil.example")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 403);

    gateway.shutdown().await;
}

#[tokio::test]
async fn test_preflight_frontend_origin_allowed() {
    let port = free_port().await;
    let config = test_config(port, vec![]);
    let gateway = start_gateway(config).await;

    let resp = client()
        .request(
            reqwest::Method::OPTIONS,
            format!("http://127.0.0.1:{}/api/events/1", port),
        )
        .header("Origin", "http://localhost:3010")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 204);
    assert_eq!(
        resp.headers().get("access-control-allow-origin").unwrap(),
        "http://localhost:3010"
    );
    assert_eq!(
        resp.headers()
            .get("access-control-allow-credentials")
            .unwrap(),
        "true"
    );

    gateway.shutdown().await;
}

#[tokio::test]
async fn test_unreachable_downstream_returns_500() {
    let port = free_port().await;
    let dead_port = free_port().await;
    let config = test_config(
        port,
        vec![(
            "DISCOVERY_SERVICE_URL",
            format!("http://127.0.0.1:{}", dead_port),
        )],
    );
    let gateway = start_gateway(config).await;

    let resp = client()
        .get(format!("http://127.0.0.1:{}/api/discovery/nearby", port))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 500);

    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["error"], "Something went wrong!");
    // Development mode exposes the underlying error.
    assert!(body["message"].as_str().is_some());

    gateway.shutdown().await;
}

#[tokio::test]
async fn test_unmatched_path_returns_404() {
    let port = free_port().await;
    let config = test_config(port, vec![]);
    let gateway = start_gateway(config).await;

    let resp = client()
        .get(format!("http://127.0.0.1:{}/api/unknown/thing", port))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);

    gateway.shutdown().await;
}

#[tokio::test]
async fn test_session_cookie_issued() {
    let port = free_port().await;
    let config = test_config(port, vec![]);
    let gateway = start_gateway(config).await;

    let resp = client()
        .get(format!("http://127.0.0.1:{}/health", port))
        .send()
        .await
        .unwrap();
    let cookies: Vec<&str> = resp
        .headers()
        .get_all("set-cookie")
        .iter()
        .filter_map(|v| v.to_str().ok())
        .collect();
    let session = cookies
        .iter()
        .find(|c| c.starts_with("tymout.sid="))
        .expect("session cookie issued");
    assert!(session.contains("HttpOnly"));
    assert!(session.contains("SameSite=Lax"));

    gateway.shutdown().await;
}

#[tokio::test]
async fn test_downstream_cookie_domain_rewritten() {
    let port = free_port().await;
    let backend = spawn_backend_with(
        "200 OK",
        &[("Set-Cookie", "sid=1; Domain=internal.host; Path=/")],
        "ok",
    )
    .await;
    let config = test_config(
        port,
        vec![("USER_SERVICE_URL", format!("http://{}", backend))],
    );
    let gateway = start_gateway(config).await;

    let resp = client()
        .get(format!("http://127.0.0.1:{}/api/users/login", port))
        .send()
        .await
        .unwrap();
    let cookies: Vec<String> = resp
        .headers()
        .get_all("set-cookie")
        .iter()
        .filter_map(|v| v.to_str().ok())
        .map(String::from)
        .collect();
    assert!(
        cookies.iter().any(|c| c == "sid=1; Domain=localhost; Path=/"),
        "cookie domain not rewritten: {:?}",
        cookies
    );

    gateway.shutdown().await;
}

#[tokio::test]
async fn test_security_and_cors_headers_on_proxied_response() {
    let port = free_port().await;
    let backend = spawn_backend_with("200 OK", &[], "ok").await;
    let config = test_config(
        port,
        vec![("SAFETY_SERVICE_URL", format!("http://{}", backend))],
    );
    let gateway = start_gateway(config).await;

    let resp = client()
        .get(format!("http://127.0.0.1:{}/api/safety/report", port))
        .send()
        .await
        .unwrap();
    assert_eq!(
        resp.headers().get("cross-origin-resource-policy").unwrap(),
        "cross-origin"
    );
    assert_eq!(
        resp.headers().get("access-control-allow-origin").unwrap(),
        "http://localhost:3010"
    );
    assert_eq!(
        resp.headers().get("access-control-expose-headers").unwrap(),
        "set-cookie"
    );

    gateway.shutdown().await;
}

#[tokio::test]
async fn test_concurrent_requests() {
    let port = free_port().await;
    let backend = spawn_backend_with("200 OK", &[], "concurrent-ok").await;
    let config = test_config(
        port,
        vec![("EVENT_SERVICE_URL", format!("http://{}", backend))],
    );
    let gateway = start_gateway(config).await;

    let mut handles = Vec::new();
    for _ in 0..20 {
        let url = format!("http://127.0.0.1:{}/api/events/1", port);
        handles.push(tokio::spawn(async move {
            client().get(&url).send().await.unwrap().text().await.unwrap()
        }));
    }

    for h in handles {
        assert_eq!(h.await.unwrap(), "concurrent-ok");
    }

    gateway.shutdown().await;
}

#[tokio::test]
async fn test_post_body_forwarded() {
    let port = free_port().await;
    let backend = spawn_echo_backend().await;
    let config = test_config(
        port,
        vec![("REQUEST_SERVICE_URL", format!("http://{}", backend))],
    );
    let gateway = start_gateway(config).await;

    let resp = client()
        .post(format!("http://127.0.0.1:{}/api/requests", port))
        .header("Content-Type", "application/json")
        .body(r#"{"event":"123"}"#)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    assert_eq!(resp.text().await.unwrap(), "POST /");

    gateway.shutdown().await;
}
