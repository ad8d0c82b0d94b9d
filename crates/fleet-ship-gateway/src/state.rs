//! Gateway application state.
//!
//! This module defines the shared state that is available to all request handlers.

use std::sync::Arc;

use fleet_ship_control::{Dispatcher, FleetApi};

use crate::config::GatewayConfig;

/// Shared application state for the gateway.
///
/// The dispatcher owns the only fleet client; handlers reach fleet through it.
pub struct GatewayState<F>
where
    F: FleetApi + ?Sized + 'static,
{
    /// The orchestrator for unit operations.
    pub dispatcher: Arc<Dispatcher<F>>,
    /// Gateway configuration.
    pub config: GatewayConfig,
}

impl<F> GatewayState<F>
where
    F: FleetApi + ?Sized + 'static,
{
    /// Create a new gateway state.
    #[must_use]
    pub fn new(dispatcher: Arc<Dispatcher<F>>, config: GatewayConfig) -> Self {
        Self { dispatcher, config }
    }

    /// The fleet client.
    #[must_use]
    pub fn fleet(&self) -> &F {
        self.dispatcher.fleet()
    }
}

impl<F> Clone for GatewayState<F>
where
    F: FleetApi + ?Sized + 'static,
{
    fn clone(&self) -> Self {
        Self {
            dispatcher: Arc::clone(&self.dispatcher),
            config: self.config.clone(),
        }
    }
}
