//! Gateway configuration — resolved once at startup from the environment
//!
//! All settings live in a single immutable [`GatewayConfig`] that is
//! constructed before the server starts and passed explicitly to every
//! component. Nothing reads the process environment after boot.
//!
//! Each downstream domain resolves to a base URL in two steps: an explicit
//! `<DOMAIN>_SERVICE_URL` variable wins; otherwise the gateway falls back to
//! `http://localhost:<port>` using `<DOMAIN>_SERVICE_PORT` or the domain's
//! default local port (3001–3009). URLs are not validated here — a malformed
//! value surfaces as a connection failure on the first forwarded request.

use std::collections::HashMap;

/// Default gateway listen port
const DEFAULT_PORT: u16 = 3000;

/// Default frontend origin for CORS and OAuth redirect rewriting
const DEFAULT_FRONTEND_URL: &str = "http://localhost:3010";

/// Development-only session signing secret
const DEFAULT_COOKIE_KEY: &str = "tymout_cookie_secret_key_change_in_production";

/// Deployment environment, derived from `NODE_ENV`
///
/// The variable name matches what existing deployments already set, so no
/// environment changes are needed to run this gateway in their place.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    /// Local development: plain HTTP, lax cookies
    Development,
    /// Production: secure cookies, `SameSite=None`
    Production,
}

impl Environment {
    fn from_node_env(value: Option<&str>) -> Self {
        match value {
            Some("production") => Self::Production,
            _ => Self::Development,
        }
    }

    /// Whether this is the production environment
    pub fn is_production(self) -> bool {
        self == Self::Production
    }

    /// Environment name as reported by `/health`
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Development => "development",
            Self::Production => "production",
        }
    }
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The nine downstream service domains, in mount order
///
/// Declaration order here is the route evaluation order: the first matching
/// prefix wins. Prefixes are disjoint, so the ordering carries no ambiguity,
/// but it is preserved as an explicit precedence rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ServiceDomain {
    User,
    Event,
    Discovery,
    Request,
    Notification,
    Feedback,
    Safety,
    Payment,
    Partnership,
}

impl ServiceDomain {
    /// All domains, in mount order
    pub const ALL: [ServiceDomain; 9] = [
        Self::User,
        Self::Event,
        Self::Discovery,
        Self::Request,
        Self::Notification,
        Self::Feedback,
        Self::Safety,
        Self::Payment,
        Self::Partnership,
    ];

    /// Short name used in the `/health` service map
    pub fn name(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Event => "event",
            Self::Discovery => "discovery",
            Self::Request => "request",
            Self::Notification => "notification",
            Self::Feedback => "feedback",
            Self::Safety => "safety",
            Self::Payment => "payment",
            Self::Partnership => "partnership",
        }
    }

    /// Route prefix this domain is mounted on
    pub fn route_prefix(self) -> &'static str {
        match self {
            Self::User => "/api/users",
            Self::Event => "/api/events",
            Self::Discovery => "/api/discovery",
            Self::Request => "/api/requests",
            Self::Notification => "/api/notifications",
            Self::Feedback => "/api/feedback",
            Self::Safety => "/api/safety",
            Self::Payment => "/api/payments",
            Self::Partnership => "/api/partnerships",
        }
    }

    /// Environment variable holding the full base URL override
    pub fn url_var(self) -> &'static str {
        match self {
            Self::User => "USER_SERVICE_URL",
            Self::Event => "EVENT_SERVICE_URL",
            Self::Discovery => "DISCOVERY_SERVICE_URL",
            Self::Request => "REQUEST_SERVICE_URL",
            Self::Notification => "NOTIFICATION_SERVICE_URL",
            Self::Feedback => "FEEDBACK_SERVICE_URL",
            Self::Safety => "SAFETY_SERVICE_URL",
            Self::Payment => "PAYMENT_SERVICE_URL",
            Self::Partnership => "PARTNERSHIP_SERVICE_URL",
        }
    }

    /// Environment variable holding the local port fallback
    pub fn port_var(self) -> &'static str {
        match self {
            Self::User => "USER_SERVICE_PORT",
            Self::Event => "EVENT_SERVICE_PORT",
            Self::Discovery => "DISCOVERY_SERVICE_PORT",
            Self::Request => "REQUEST_SERVICE_PORT",
            Self::Notification => "NOTIFICATION_SERVICE_PORT",
            Self::Feedback => "FEEDBACK_SERVICE_PORT",
            Self::Safety => "SAFETY_SERVICE_PORT",
            Self::Payment => "PAYMENT_SERVICE_PORT",
            Self::Partnership => "PARTNERSHIP_SERVICE_PORT",
        }
    }

    /// Default local port when neither override variable is set
    pub fn default_port(self) -> u16 {
        match self {
            Self::User => 3001,
            Self::Event => 3002,
            Self::Discovery => 3003,
            Self::Request => 3004,
            Self::Notification => 3005,
            Self::Feedback => 3006,
            Self::Safety => 3007,
            Self::Payment => 3008,
            Self::Partnership => 3009,
        }
    }
}

impl std::fmt::Display for ServiceDomain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Immutable gateway configuration
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Listen port (`PORT`, default 3000)
    pub port: u16,
    /// Deployment environment (`NODE_ENV`)
    pub environment: Environment,
    /// Allowed frontend origin (`FRONTEND_URL`)
    pub frontend_url: String,
    /// Session signing secret (`COOKIE_KEY`)
    pub cookie_secret: String,
    /// Resolved base URL per downstream domain
    service_urls: HashMap<ServiceDomain, String>,
}

impl GatewayConfig {
    /// Resolve configuration from the process environment
    pub fn from_env() -> Self {
        Self::resolve(|key| std::env::var(key).ok())
    }

    /// Resolve configuration through an arbitrary variable lookup
    ///
    /// Taking the lookup as a closure keeps resolution unit-testable
    /// without mutating the process environment.
    pub fn resolve(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let port = lookup("PORT")
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_PORT);
        let environment = Environment::from_node_env(lookup("NODE_ENV").as_deref());
        let frontend_url =
            lookup("FRONTEND_URL").unwrap_or_else(|| DEFAULT_FRONTEND_URL.to_string());
        let cookie_secret =
            lookup("COOKIE_KEY").unwrap_or_else(|| DEFAULT_COOKIE_KEY.to_string());

        let mut service_urls = HashMap::new();
        for domain in ServiceDomain::ALL {
            let url = lookup(domain.url_var()).unwrap_or_else(|| {
                let port = lookup(domain.port_var())
                    .and_then(|v| v.parse::<u16>().ok())
                    .unwrap_or_else(|| domain.default_port());
                format!("http://localhost:{}", port)
            });
            service_urls.insert(domain, url);
        }

        Self {
            port,
            environment,
            frontend_url,
            cookie_secret,
            service_urls,
        }
    }

    /// Resolved base URL for a downstream domain
    pub fn service_url(&self, domain: ServiceDomain) -> &str {
        // Every domain is inserted during resolution, so the lookup cannot miss.
        &self.service_urls[&domain]
    }

    /// Domain attribute written onto forwarded `Set-Cookie` headers
    pub fn cookie_rewrite_domain(&self) -> &'static str {
        if self.environment.is_production() {
            ".railway.app"
        } else {
            "localhost"
        }
    }
}
