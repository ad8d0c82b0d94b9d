//! Unit state transition orchestration for fleet.
//!
//! This crate turns a requested unit name into concrete fleet units and
//! drives each of them through a two-step target-state swap, polling fleet
//! until each step is observed to have converged.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     Gateway (HTTP)                          │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        Dispatcher                           │
//! │  ┌─────────────┐ ┌─────────────┐ ┌─────────────────────┐    │
//! │  │    Unit     │ │    Swap     │ │     Converger       │    │
//! │  │   Matcher   │ │  Registry   │ │   (state machine)   │    │
//! │  └─────────────┘ └─────────────┘ └─────────────────────┘    │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//!                       ┌─────────────┐
//!                       │  FleetApi   │
//!                       └─────────────┘
//! ```
//!
//! # Usage
//!
//! ```no_run
//! use std::sync::Arc;
//! use fleet_ship_client::{connect, TransportOptions};
//! use fleet_ship_control::{ControlConfig, Dispatcher};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let fleet = Arc::new(connect("unix:///var/run/fleet.sock", &TransportOptions::default())?);
//! let dispatcher = Dispatcher::new(fleet, ControlConfig::default());
//!
//! // Restart web.service, or every web@N.service if there is no web.service
//! let report = dispatcher.restart("web").await?;
//! for swap in report.launched {
//!     swap.join().await?;
//! }
//! # Ok(())
//! # }
//! ```
//!
//! # Operations
//!
//! - Restart: `loaded` → `launched`
//! - Rebalance: `inactive` → `launched`
//!
//! See the [`convergence`] module for the swap state machine.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod convergence;
pub mod dispatcher;
pub mod error;
pub mod matcher;
pub mod registry;
pub mod types;

pub use convergence::Converger;
pub use dispatcher::{DispatchReport, Dispatcher, SwapHandle};
pub use error::{ControlError, ConvergenceError, Result};
pub use matcher::{normalize_name, Discovery, MatchResult, UnitMatcher};
pub use registry::{SwapEntry, SwapRegistry};
pub use types::{ControlConfig, EmptyMatchPolicy, Operation, SwapPhase, MIN_POLL_INTERVAL_MS};

// Re-export commonly used types from the client for convenience
pub use fleet_ship_client::{FleetApi, FleetError, JobState, Machine, Unit};
