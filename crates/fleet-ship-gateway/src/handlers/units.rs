//! Unit endpoints.
//!
//! Queries go straight to fleet. The two `PUT` endpoints hand the request to
//! the dispatcher and answer as soon as the swaps are launched; how each swap
//! ends is only visible through later unit queries or `GET /operations`.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::Json;

use fleet_ship_control::{normalize_name, DispatchReport, FleetApi};

use crate::auth::Authorized;
use crate::error::ApiError;
use crate::state::GatewayState;

/// Acknowledgement returned by `PUT /deploy/:name`.
pub const DEPLOYMENT_ASKED: &str = "Deployment asked";

/// Acknowledgement returned by `PUT /rebalance/:name`.
pub const REBALANCING_ASKED: &str = "Rebalancing asked";

/// List every unit known to fleet.
///
/// # Errors
///
/// Returns an error if fleet cannot be queried.
pub async fn list_units<F>(
    State(state): State<Arc<GatewayState<F>>>,
    _auth: Authorized,
) -> Result<impl IntoResponse, ApiError>
where
    F: FleetApi + ?Sized + 'static,
{
    let units = state.fleet().units().await?;
    Ok(Json(units))
}

/// Get a single unit. The `.service` suffix is optional.
///
/// A unit fleet does not know renders as `null`.
///
/// # Errors
///
/// Returns an error if fleet cannot be queried.
pub async fn get_unit<F>(
    State(state): State<Arc<GatewayState<F>>>,
    _auth: Authorized,
    Path(name): Path<String>,
) -> Result<impl IntoResponse, ApiError>
where
    F: FleetApi + ?Sized + 'static,
{
    let unit = state.fleet().unit(&normalize_name(&name)).await?;
    Ok(Json(unit))
}

/// Restart every unit matching `name`.
///
/// # Errors
///
/// Returns an error if unit discovery fails, or if nothing matches and empty
/// matches are rejected.
pub async fn deploy<F>(
    State(state): State<Arc<GatewayState<F>>>,
    auth: Authorized,
    Path(name): Path<String>,
) -> Result<impl IntoResponse, ApiError>
where
    F: FleetApi + ?Sized + 'static,
{
    let report = state.dispatcher.restart(&name).await?;
    log_report(&report, &auth);
    Ok(Json(DEPLOYMENT_ASKED))
}

/// Rebalance every unit matching `name`.
///
/// # Errors
///
/// Same as [`deploy`].
pub async fn rebalance<F>(
    State(state): State<Arc<GatewayState<F>>>,
    auth: Authorized,
    Path(name): Path<String>,
) -> Result<impl IntoResponse, ApiError>
where
    F: FleetApi + ?Sized + 'static,
{
    let report = state.dispatcher.rebalance(&name).await?;
    log_report(&report, &auth);
    Ok(Json(REBALANCING_ASKED))
}

// The swap handles are dropped here; the tasks keep running detached.
fn log_report(report: &DispatchReport, auth: &Authorized) {
    tracing::info!(
        unit = %report.name,
        operation = %report.operation,
        matched = report.matched.len(),
        launched = report.launched.len(),
        skipped = report.skipped.len(),
        user = auth.username.as_deref().unwrap_or("-"),
        "Unit operation accepted"
    );
}
