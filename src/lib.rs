//! # Tymout API Gateway
//!
//! Reverse proxy fronting the Tymout platform's nine backend services.
//! Requests are dispatched by path prefix, the prefix is stripped before
//! forwarding, and OAuth redirects and cookie domains are rewritten so the
//! browser only ever talks to the gateway.
//!
//! ## Architecture
//!
//! ```text
//! Client → Session / CORS / Security Headers → Route Table → Proxy → Service
//! ```
//!
//! ## Request flow
//!
//! The route table is an ordered list of (prefix, target) bindings resolved
//! from the environment at startup; the first matching prefix wins. The
//! `/health` endpoint reports the resolved targets without probing them.
//!
//! ```rust,ignore
//! use tymout_gateway::{Gateway, GatewayConfig};
//!
//! #[tokio::main]
//! async fn main() -> tymout_gateway::Result<()> {
//!     let config = GatewayConfig::from_env();
//!     let gateway = Gateway::new(config);
//!     gateway.start().await?;
//!     gateway.wait_for_shutdown().await;
//!     Ok(())
//! }
//! ```

pub mod access_log;
pub mod config;
pub mod error;
pub mod gateway;
pub mod health;
pub mod middleware;
pub mod proxy;
pub mod rewrite;
pub mod router;
pub mod server;
pub mod session;

// Re-export main types
pub use config::{Environment, GatewayConfig, ServiceDomain};
pub use error::{GatewayError, Result};
pub use gateway::Gateway;

/// Gateway runtime state
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum GatewayState {
    /// Gateway has been created but not yet started
    #[default]
    Created,
    /// Gateway is binding its listener
    Starting,
    /// Gateway is actively accepting and proxying requests
    Running,
    /// Gateway is shutting down
    Stopping,
    /// Gateway has fully stopped
    Stopped,
}

impl std::fmt::Display for GatewayState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Created => write!(f, "created"),
            Self::Starting => write!(f, "starting"),
            Self::Running => write!(f, "running"),
            Self::Stopping => write!(f, "stopping"),
            Self::Stopped => write!(f, "stopped"),
        }
    }
}
