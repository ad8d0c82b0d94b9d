//! Gateway configuration.
//!
//! Settings come from command-line flags with environment variable
//! fallbacks, and are folded into [`GatewayConfig`] and the orchestrator's
//! [`ControlConfig`].

use std::time::Duration;

use clap::Parser;
use fleet_ship_client::{TransportOptions, DEFAULT_ENDPOINT};
use fleet_ship_control::{ControlConfig, EmptyMatchPolicy};
use serde::Deserialize;

/// Credentials for HTTP basic authentication.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct BasicAuthConfig {
    /// Expected user name.
    pub username: String,
    /// Expected password.
    pub password: String,
}

/// Configuration for the gateway service.
#[derive(Debug, Clone, Deserialize)]
pub struct GatewayConfig {
    /// Listen address (e.g., "0.0.0.0:8080").
    #[serde(default = "GatewayConfig::default_listen_addr")]
    pub listen_addr: String,

    /// Fleet API address (`unix:///path`, `file:///path` or `http://host:port`).
    #[serde(default = "GatewayConfig::default_fleet_endpoint")]
    pub fleet_endpoint: String,

    /// Basic auth credentials. Routes are public when unset.
    #[serde(default)]
    pub basic_auth: Option<BasicAuthConfig>,

    /// Request timeout in seconds.
    #[serde(default = "GatewayConfig::default_request_timeout")]
    pub request_timeout_seconds: u64,

    /// Timeout for a single fleet API call in seconds.
    #[serde(default = "GatewayConfig::default_fleet_timeout")]
    pub fleet_timeout_seconds: u64,
}

impl GatewayConfig {
    fn default_listen_addr() -> String {
        "0.0.0.0:8080".to_string()
    }

    fn default_fleet_endpoint() -> String {
        DEFAULT_ENDPOINT.to_string()
    }

    const fn default_request_timeout() -> u64 {
        30
    }

    const fn default_fleet_timeout() -> u64 {
        10
    }

    /// Get the request timeout as a `Duration`.
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }

    /// Connection settings for the fleet client.
    #[must_use]
    pub fn transport_options(&self) -> TransportOptions {
        TransportOptions {
            request_timeout: Duration::from_secs(self.fleet_timeout_seconds),
            ..TransportOptions::default()
        }
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            listen_addr: Self::default_listen_addr(),
            fleet_endpoint: Self::default_fleet_endpoint(),
            basic_auth: None,
            request_timeout_seconds: Self::default_request_timeout(),
            fleet_timeout_seconds: Self::default_fleet_timeout(),
        }
    }
}

/// Command-line arguments of the `fleet-ship` binary.
#[derive(Debug, Parser)]
#[command(name = "fleet-ship", version, about = "HTTP front-end for fleet unit lifecycle operations")]
pub struct Args {
    /// Fleet API address.
    #[arg(long, env = "FLEET_ENDPOINT", default_value = DEFAULT_ENDPOINT)]
    pub endpoint: String,

    /// Address to listen on.
    #[arg(long, env = "LISTEN_ADDR", default_value = "0.0.0.0:8080")]
    pub listen_addr: String,

    /// Basic auth user name.
    #[arg(long, env = "BASIC_USERNAME")]
    pub basic_username: Option<String>,

    /// Basic auth password.
    #[arg(long, env = "BASIC_PASSWORD", hide_env_values = true)]
    pub basic_password: Option<String>,

    /// Delay between two polls of a converging unit, in milliseconds.
    #[arg(long, env = "POLL_INTERVAL_MS", default_value_t = 500)]
    pub poll_interval_ms: u64,

    /// Maximum time a swap step waits for fleet, in seconds. Unbounded if unset.
    #[arg(long, env = "STEP_TIMEOUT_SECS")]
    pub step_timeout_secs: Option<u64>,

    /// Maximum number of unit swaps running at once.
    #[arg(long, env = "MAX_CONCURRENT_SWAPS", default_value_t = 64)]
    pub max_concurrent_swaps: usize,

    /// What to do when a name matches no units: `accept` or `reject`.
    #[arg(long, env = "EMPTY_MATCH_POLICY", default_value = "accept")]
    pub empty_match: EmptyMatchPolicy,
}

impl Args {
    /// Split the arguments into gateway and orchestrator configuration.
    #[must_use]
    pub fn into_configs(self) -> (GatewayConfig, ControlConfig) {
        // Auth is on as soon as either credential is set.
        let basic_auth = if self.basic_username.is_some() || self.basic_password.is_some() {
            Some(BasicAuthConfig {
                username: self.basic_username.unwrap_or_default(),
                password: self.basic_password.unwrap_or_default(),
            })
        } else {
            None
        };

        let gateway = GatewayConfig {
            listen_addr: self.listen_addr,
            fleet_endpoint: self.endpoint,
            basic_auth,
            ..GatewayConfig::default()
        };

        let control = ControlConfig {
            poll_interval_ms: self.poll_interval_ms,
            step_timeout_seconds: self.step_timeout_secs,
            max_concurrent_swaps: self.max_concurrent_swaps,
            empty_match: self.empty_match,
        };

        (gateway, control)
    }
}
