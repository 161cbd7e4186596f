//! Health reporter — configuration snapshot, not a reachability probe
//!
//! `/health` reports the targets the gateway was configured with and the
//! environment it resolved; it makes no network calls, so a 200 here says
//! nothing about whether the downstreams are actually up.

use crate::config::{GatewayConfig, ServiceDomain};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Service name reported in health payloads
pub const SERVICE_NAME: &str = "api-gateway";

/// Health status payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthReport {
    /// Fixed `"ok"` literal
    pub status: String,
    /// This service's name
    pub service: String,
    /// Resolved environment mode
    pub environment: String,
    /// Configured target per downstream domain
    pub services: BTreeMap<String, String>,
    /// ISO-8601 timestamp captured at request time
    pub timestamp: String,
}

/// Assemble a health report from the resolved configuration
pub fn report(config: &GatewayConfig) -> HealthReport {
    let services = ServiceDomain::ALL
        .into_iter()
        .map(|domain| (domain.name().to_string(), config.service_url(domain).to_string()))
        .collect();

    HealthReport {
        status: "ok".to_string(),
        service: SERVICE_NAME.to_string(),
        environment: config.environment.as_str().to_string(),
        services,
        timestamp: chrono::Utc::now().to_rfc3339(),
    }
}

/// Serialize the health payload, falling back to the error shape if the
/// report itself cannot be serialized.
pub fn respond(config: &GatewayConfig) -> (u16, String) {
    match serde_json::to_string(&report(config)) {
        Ok(body) => (200, body),
        Err(e) => (
            500,
            format!(
                r#"{{"status":"error","service":"{}","error":"{}"}}"#,
                SERVICE_NAME, e
            ),
        ),
    }
}
