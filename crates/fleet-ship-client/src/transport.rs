//! Transport selection for the fleet API.
//!
//! Fleet is usually reached through its local Unix domain socket, but it can
//! also be exposed over TCP. Both are configured from a single address:
//!
//! - `unix:///var/run/fleet.sock` or `file:///var/run/fleet.sock` route every
//!   connection through the socket at the URL's path. Requests are still
//!   addressed by URL, so the effective base becomes the synthetic
//!   `http://domain-sock/`.
//! - `http://host:port` and `https://host:port` are used verbatim.

use std::path::{Path, PathBuf};
use std::time::Duration;

use reqwest::Url;

use crate::error::{FleetError, Result};

/// Address used when none is configured.
pub const DEFAULT_ENDPOINT: &str = "unix:///var/run/fleet.sock";

/// Base URL for requests carried over a Unix domain socket.
const SOCKET_BASE_URL: &str = "http://domain-sock/";

/// How connections to the fleet API are established.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transport {
    /// Every connection goes through the Unix domain socket at this path.
    UnixSocket(PathBuf),
    /// Connections are made over the network to the base URL's host.
    Network,
}

/// A parsed fleet endpoint.
#[derive(Debug, Clone)]
pub struct Endpoint {
    address: String,
    base_url: Url,
    transport: Transport,
}

impl Endpoint {
    /// Parse an endpoint address. An empty address selects [`DEFAULT_ENDPOINT`].
    ///
    /// # Errors
    ///
    /// Returns `FleetError::Transport` if the address is not a URL, uses a
    /// scheme other than `unix`, `file`, `http` or `https`, or names a socket
    /// without a path.
    pub fn parse(address: &str) -> Result<Self> {
        let address = if address.trim().is_empty() {
            DEFAULT_ENDPOINT
        } else {
            address.trim()
        };

        let fail = |reason: String| FleetError::Transport {
            endpoint: address.to_string(),
            reason,
        };

        let url = Url::parse(address).map_err(|e| fail(format!("invalid address: {e}")))?;

        match url.scheme() {
            "unix" | "file" => {
                let socket_path = url.path();
                if socket_path.is_empty() || socket_path == "/" {
                    return Err(fail("socket address has no path".to_string()));
                }

                let base_url = Url::parse(SOCKET_BASE_URL)
                    .map_err(|e| fail(format!("invalid socket base url: {e}")))?;

                Ok(Self {
                    address: address.to_string(),
                    base_url,
                    transport: Transport::UnixSocket(PathBuf::from(socket_path)),
                })
            }
            "http" | "https" => Ok(Self {
                address: address.to_string(),
                base_url: url,
                transport: Transport::Network,
            }),
            other => Err(fail(format!("unsupported scheme {other:?}"))),
        }
    }

    /// The address this endpoint was parsed from.
    #[must_use]
    pub fn address(&self) -> &str {
        &self.address
    }

    /// The URL requests are addressed to.
    #[must_use]
    pub const fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// How connections are established.
    #[must_use]
    pub const fn transport(&self) -> &Transport {
        &self.transport
    }

    /// The socket path, for Unix socket endpoints.
    #[must_use]
    pub fn socket_path(&self) -> Option<&Path> {
        match &self.transport {
            Transport::UnixSocket(path) => Some(path),
            Transport::Network => None,
        }
    }
}

/// Connection settings for the underlying HTTP client.
#[derive(Debug, Clone)]
pub struct TransportOptions {
    /// Timeout for a whole request.
    pub request_timeout: Duration,
    /// Timeout for establishing a connection.
    pub connect_timeout: Duration,
}

impl Default for TransportOptions {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(5),
        }
    }
}

/// Build a `reqwest::Client` bound to the endpoint's transport.
///
/// # Errors
///
/// Returns `FleetError::Transport` if the client cannot be constructed.
pub fn build_http_client(endpoint: &Endpoint, options: &TransportOptions) -> Result<reqwest::Client> {
    let builder = reqwest::Client::builder()
        .timeout(options.request_timeout)
        .connect_timeout(options.connect_timeout);

    let builder = match endpoint.transport() {
        Transport::Network => builder,
        #[cfg(unix)]
        Transport::UnixSocket(path) => builder.unix_socket(path.clone()),
        #[cfg(not(unix))]
        Transport::UnixSocket(_) => {
            return Err(FleetError::Transport {
                endpoint: endpoint.address().to_string(),
                reason: "unix sockets are not supported on this platform".to_string(),
            });
        }
    };

    builder.build().map_err(|e| FleetError::Transport {
        endpoint: endpoint.address().to_string(),
        reason: format!("failed to build HTTP client: {e}"),
    })
}
