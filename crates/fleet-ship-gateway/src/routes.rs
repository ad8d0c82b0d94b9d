//! Router configuration.
//!
//! This module sets up the Axum router with all routes and middleware.

use std::sync::Arc;

use axum::error_handling::HandleErrorLayer;
use axum::routing::{get, put};
use axum::Router;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

use fleet_ship_control::FleetApi;

use crate::error::handle_middleware_error;
use crate::handlers::{health, machines, operations, units};
use crate::state::GatewayState;

/// Create the gateway router with all routes and middleware.
///
/// # Routes
///
/// ## Public
/// - `GET /healthcheck` - Health check
///
/// ## Fleet queries (basic auth when configured)
/// - `GET /machines` - List machines
/// - `GET /units` - List units
/// - `GET /units/:name` - Get a unit
///
/// ## Unit operations (basic auth when configured)
/// - `PUT /deploy/:name` - Restart matching units
/// - `PUT /rebalance/:name` - Rebalance matching units
/// - `GET /operations` - List in-flight swaps
///
/// Requests running past the request timeout get a `408` JSON error.
pub fn create_router<F>(state: GatewayState<F>) -> Router
where
    F: FleetApi + ?Sized + 'static,
{
    let request_timeout = state.config.request_timeout();
    let state = Arc::new(state);

    Router::new()
        // Health (public)
        .route("/healthcheck", get(health::healthcheck::<F>))
        // Fleet queries
        .route("/machines", get(machines::list_machines::<F>))
        .route("/units", get(units::list_units::<F>))
        .route("/units/:name", get(units::get_unit::<F>))
        // Unit operations
        .route("/deploy/:name", put(units::deploy::<F>))
        .route("/rebalance/:name", put(units::rebalance::<F>))
        .route("/operations", get(operations::list_operations::<F>))
        // Middleware
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(HandleErrorLayer::new(handle_middleware_error))
                .timeout(request_timeout),
        )
        .with_state(state)
}
