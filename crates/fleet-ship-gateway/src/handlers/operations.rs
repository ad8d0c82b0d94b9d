//! In-flight swap listing endpoint.

use std::sync::Arc;

use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use serde::Serialize;

use fleet_ship_control::{FleetApi, SwapEntry};

use crate::auth::Authorized;
use crate::state::GatewayState;

/// Response for the operations listing.
#[derive(Debug, Serialize)]
pub struct OperationsResponse {
    /// Swaps currently in flight, oldest first.
    pub operations: Vec<SwapEntry>,
}

/// List the unit swaps currently in flight.
///
/// Finished swaps leave the list; their outcome shows in the unit state.
pub async fn list_operations<F>(
    State(state): State<Arc<GatewayState<F>>>,
    _auth: Authorized,
) -> impl IntoResponse
where
    F: FleetApi + ?Sized + 'static,
{
    Json(OperationsResponse {
        operations: state.dispatcher.in_flight(),
    })
}
