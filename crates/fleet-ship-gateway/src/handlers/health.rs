//! Liveness endpoint.
//!
//! `GET /healthcheck` answers from process state only and never calls fleet.

use std::sync::Arc;

use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use serde::Serialize;

use fleet_ship_control::FleetApi;

use crate::state::GatewayState;

/// Body of a `GET /healthcheck` answer.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Always `healthy` while the process serves requests.
    pub status: &'static str,
    /// Crate version of the running binary.
    pub version: &'static str,
    /// Unit swaps registered with the dispatcher, queued ones included.
    pub swaps_in_flight: usize,
}

/// Report liveness. Public even when basic auth is configured.
pub async fn healthcheck<F>(State(state): State<Arc<GatewayState<F>>>) -> impl IntoResponse
where
    F: FleetApi + ?Sized + 'static,
{
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        swaps_in_flight: state.dispatcher.in_flight().len(),
    })
}
