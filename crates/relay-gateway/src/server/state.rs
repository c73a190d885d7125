//! Gateway state
//!
//! Application state shared by every request handler.

use crate::connection::SessionConfig;
use crate::hub::Hub;
use relay_common::{HubConfig, JwtService};
use std::sync::Arc;

/// Gateway application state
#[derive(Clone)]
pub struct GatewayState {
    /// Handle to the broadcast hub
    hub: Hub,
    /// Verifies connection tokens
    jwt_service: Arc<JwtService>,
    /// Outbound queue capacity for new sessions
    outbound_buffer: usize,
    session_config: SessionConfig,
}

impl GatewayState {
    /// Create a new gateway state
    pub fn new(hub: Hub, jwt_service: JwtService, config: &HubConfig) -> Self {
        Self {
            hub,
            jwt_service: Arc::new(jwt_service),
            outbound_buffer: config.outbound_buffer,
            session_config: SessionConfig::from(config),
        }
    }

    /// Get the hub handle
    pub fn hub(&self) -> &Hub {
        &self.hub
    }

    /// Get the JWT service
    pub fn jwt_service(&self) -> &JwtService {
        &self.jwt_service
    }

    pub fn outbound_buffer(&self) -> usize {
        self.outbound_buffer
    }

    pub fn session_config(&self) -> SessionConfig {
        self.session_config
    }
}

impl std::fmt::Debug for GatewayState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayState")
            .field("hub", &self.hub)
            .field("outbound_buffer", &self.outbound_buffer)
            .field("session_config", &self.session_config)
            .finish()
    }
}
