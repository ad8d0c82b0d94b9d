//! Error types for the fleet client.

use thiserror::Error;

use crate::types::JobState;

/// A result type using `FleetError`.
pub type Result<T> = std::result::Result<T, FleetError>;

/// Errors that can occur while talking to the fleet API.
#[derive(Debug, Error)]
pub enum FleetError {
    /// The endpoint could not be parsed or no client could be built for it.
    ///
    /// This is fatal at startup.
    #[error("cannot reach fleet endpoint {endpoint}: {reason}")]
    Transport {
        /// The configured endpoint address.
        endpoint: String,
        /// Why the transport could not be set up.
        reason: String,
    },

    /// A read against the fleet API failed.
    #[error("fleet query failed: {0}")]
    Query(String),

    /// Setting a unit's target state failed.
    #[error("failed to set unit {unit} to {state}: {reason}")]
    Mutation {
        /// The unit being mutated.
        unit: String,
        /// The requested target state.
        state: JobState,
        /// The error reported by fleet or the transport.
        reason: String,
    },
}

impl FleetError {
    /// Returns true if retrying the same call might succeed.
    #[must_use]
    pub const fn is_retriable(&self) -> bool {
        matches!(self, Self::Query(_))
    }
}
