//! HTTP gateway for fleet unit lifecycle operations.
//!
//! This crate exposes the fleet cluster and the swap orchestrator over a
//! small JSON API. It handles:
//!
//! - Read-through queries of machines and units
//! - Restart and rebalance requests, dispatched in the background
//! - Optional HTTP basic authentication
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        Clients                              │
//! │                         (HTTP)                              │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    fleet-ship-gateway                       │
//! │  ┌─────────────┐ ┌──────────────────────────────────────┐   │
//! │  │ Basic Auth  │ │          Router + Handlers           │   │
//! │  │  Extractor  │ │                                      │   │
//! │  └─────────────┘ └──────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────┘
//!                 │                            │
//!                 ▼                            ▼
//!          ┌────────────┐              ┌──────────────┐
//!          │ Dispatcher │ ───────────▶ │  Fleet API   │
//!          │  (swaps)   │              │ (unix / tcp) │
//!          └────────────┘              └──────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use fleet_ship_client::{connect, TransportOptions};
//! use fleet_ship_control::Dispatcher;
//! use fleet_ship_gateway::{create_router, GatewayConfig, GatewayState};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = GatewayConfig::default();
//! let fleet = Arc::new(connect(&config.fleet_endpoint, &TransportOptions::default())?);
//! let dispatcher = Arc::new(Dispatcher::with_defaults(fleet));
//!
//! let app = create_router(GatewayState::new(dispatcher, config));
//!
//! let listener = tokio::net::TcpListener::bind("0.0.0.0:8080").await?;
//! axum::serve(listener, app).await?;
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;
pub mod routes;
pub mod state;

pub use config::{Args, BasicAuthConfig, GatewayConfig};
pub use error::ApiError;
pub use routes::create_router;
pub use state::GatewayState;

pub use auth::Authorized;
