//! Route table — ordered prefix matching for the nine service mounts
//!
//! Routing is an explicit ordered list of (prefix, target) bindings
//! evaluated top to bottom; the first matching prefix wins. The table is
//! built once at startup and never changes.

use crate::config::{GatewayConfig, ServiceDomain};

/// A single route binding — immutable for the process lifetime
#[derive(Debug, Clone)]
pub struct RouteBinding {
    /// Downstream domain this mount forwards to
    pub domain: ServiceDomain,
    /// Matched path prefix, e.g. `/api/events`
    pub prefix: &'static str,
    /// Resolved base URL of the downstream service
    pub target: String,
}

/// Ordered route table
pub struct RouteTable {
    bindings: Vec<RouteBinding>,
}

impl RouteTable {
    /// Build the table from resolved configuration, in mount order
    pub fn from_config(config: &GatewayConfig) -> Self {
        let bindings = ServiceDomain::ALL
            .into_iter()
            .map(|domain| RouteBinding {
                domain,
                prefix: domain.route_prefix(),
                target: config.service_url(domain).to_string(),
            })
            .collect();
        Self { bindings }
    }

    /// Match a request path against the bindings; first match wins
    pub fn match_path(&self, path: &str) -> Option<&RouteBinding> {
        self.bindings
            .iter()
            .find(|binding| prefix_matches(path, binding.prefix))
    }

    /// All bindings, in evaluation order
    pub fn bindings(&self) -> &[RouteBinding] {
        &self.bindings
    }

    /// Number of bindings
    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    /// Whether the table is empty
    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}

/// Segment-aware prefix test: `/api/users` matches `/api/users` and
/// `/api/users/...` but not `/api/users2`.
fn prefix_matches(path: &str, prefix: &str) -> bool {
    match path.strip_prefix(prefix) {
        Some("") => true,
        Some(rest) => rest.starts_with('/'),
        None => false,
    }
}

/// Strip the matched prefix from a path; an empty remainder becomes `/`
pub fn strip_route_prefix(path: &str, prefix: &str) -> String {
    match path.strip_prefix(prefix) {
        Some("") => "/".to_string(),
        Some(rest) if rest.starts_with('/') => rest.to_string(),
        _ => path.to_string(),
    }
}
