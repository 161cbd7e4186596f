//! Gateway orchestrator — ties configuration, routing and the server
//! together into a single manageable unit with a small state machine.

use crate::config::GatewayConfig;
use crate::error::Result;
use crate::health::{self, HealthReport};
use crate::server::{self, ServerState};
use crate::GatewayState;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

/// The main Gateway — coordinates all components
pub struct Gateway {
    /// Immutable configuration
    config: GatewayConfig,
    /// Gateway runtime state
    state: RwLock<GatewayState>,
    /// Shutdown flag
    shutdown: AtomicBool,
    /// Server task handle
    handle: RwLock<Option<tokio::task::JoinHandle<()>>>,
}

impl Gateway {
    /// Create a new gateway from resolved configuration
    pub fn new(config: GatewayConfig) -> Self {
        Self {
            config,
            state: RwLock::new(GatewayState::Created),
            shutdown: AtomicBool::new(false),
            handle: RwLock::new(None),
        }
    }

    /// Start the gateway — binds the listener and begins accepting requests
    pub async fn start(&self) -> Result<()> {
        self.set_state(GatewayState::Starting);

        let server_state = Arc::new(ServerState::new(self.config.clone()));
        tracing::info!(routes = server_state.routes.len(), "Route table built");

        let addr = SocketAddr::from(([0, 0, 0, 0], self.config.port));
        let handle = server::start(addr, server_state).await?;

        *self.handle.write().unwrap() = Some(handle);

        self.set_state(GatewayState::Running);
        tracing::info!(
            port = self.config.port,
            environment = %self.config.environment,
            "API gateway running"
        );

        Ok(())
    }

    /// Initiate shutdown
    pub async fn shutdown(&self) {
        if self.shutdown.swap(true, Ordering::SeqCst) {
            return; // Already shutting down
        }

        self.set_state(GatewayState::Stopping);
        tracing::info!("Gateway shutting down");

        if let Some(handle) = self.handle.write().unwrap().take() {
            handle.abort();
        }

        self.set_state(GatewayState::Stopped);
        tracing::info!("Gateway stopped");
    }

    /// Wait for a shutdown signal (Ctrl+C)
    pub async fn wait_for_shutdown(&self) {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to listen for Ctrl+C");
        self.shutdown().await;
    }

    /// Get the current gateway state
    pub fn state(&self) -> GatewayState {
        self.state.read().unwrap().clone()
    }

    /// Get a health report — the same payload served by `/health`
    pub fn health(&self) -> HealthReport {
        health::report(&self.config)
    }

    /// Get the configuration
    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    /// Check if the gateway is running
    pub fn is_running(&self) -> bool {
        self.state() == GatewayState::Running
    }

    /// Check if shutdown has been requested
    pub fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::Relaxed)
    }

    fn set_state(&self, new_state: GatewayState) {
        let mut state = self.state.write().unwrap();
        tracing::debug!(from = %*state, to = %new_state, "State transition");
        *state = new_state;
    }
}
