//! Machine listing endpoint.

use std::sync::Arc;

use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;

use fleet_ship_control::FleetApi;

use crate::auth::Authorized;
use crate::error::ApiError;
use crate::state::GatewayState;

/// List every machine of the cluster.
///
/// # Errors
///
/// Returns an error if fleet cannot be queried.
pub async fn list_machines<F>(
    State(state): State<Arc<GatewayState<F>>>,
    _auth: Authorized,
) -> Result<impl IntoResponse, ApiError>
where
    F: FleetApi + ?Sized + 'static,
{
    let machines = state.fleet().machines().await?;
    Ok(Json(machines))
}
