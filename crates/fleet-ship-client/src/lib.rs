//! Client for the fleet cluster init system.
//!
//! This crate selects a transport for a configured fleet endpoint and exposes
//! the handful of fleet API operations the orchestrator depends on:
//!
//! - query one unit
//! - list all units
//! - list machines
//! - set a unit's target state
//!
//! # Example
//!
//! ```no_run
//! use fleet_ship_client::{connect, FleetApi, JobState, TransportOptions};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let fleet = connect("unix:///var/run/fleet.sock", &TransportOptions::default())?;
//!
//! for unit in fleet.units().await? {
//!     println!("{} is {:?}", unit.name, unit.current_state);
//! }
//!
//! fleet.set_unit_target_state("web.service", JobState::Launched).await?;
//! # Ok(())
//! # }
//! ```
//!
//! # Testing
//!
//! Enable the `test-utils` feature for [`mock::MockFleet`], an in-memory
//! fleet that records every call.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod client;
pub mod error;
pub mod transport;
pub mod types;

pub use client::{connect, FleetApi, HttpFleetClient};
pub use error::{FleetError, Result};
pub use transport::{Endpoint, Transport, TransportOptions, DEFAULT_ENDPOINT};
pub use types::{JobState, Machine, Unit, UnitOption};

#[cfg(any(test, feature = "test-utils"))]
pub use client::mock;
