//! Error types for the orchestrator.
//!
//! Two layers of errors exist: [`ControlError`] is returned synchronously by
//! the dispatcher, [`ConvergenceError`] is the outcome of a single unit's
//! state swap, observable only through its [`crate::SwapHandle`].

use std::time::Duration;

use fleet_ship_client::{FleetError, JobState};
use thiserror::Error;

/// A result type using `ControlError`.
pub type Result<T> = std::result::Result<T, ControlError>;

/// Errors returned by dispatcher and query operations.
#[derive(Debug, Error)]
pub enum ControlError {
    /// No exact unit and no template instance matched the requested name.
    ///
    /// Only raised when the empty-match policy rejects empty matches.
    #[error("no units match {0}")]
    NoMatchingUnits(String),

    /// Unit discovery could not list units from fleet.
    #[error("unit discovery for {name} failed: {source}")]
    DiscoveryFailed {
        /// The normalized name being resolved.
        name: String,
        /// The listing failure.
        #[source]
        source: FleetError,
    },

    /// A fleet call failed.
    #[error(transparent)]
    Fleet(#[from] FleetError),
}

impl ControlError {
    /// Returns the appropriate HTTP status code for this error.
    #[must_use]
    pub const fn http_status_code(&self) -> u16 {
        match self {
            Self::NoMatchingUnits(_) => 404,
            Self::DiscoveryFailed { .. } | Self::Fleet(_) => 500,
        }
    }
}

/// Why a unit's two-step state swap did not complete.
#[derive(Debug, Error)]
pub enum ConvergenceError {
    /// Fleet refused a target-state request. The unit may be left in the
    /// first state of the swap.
    #[error(transparent)]
    Mutation(FleetError),

    /// The unit did not report the target state before the step deadline.
    #[error("unit {unit} did not reach {state} within {waited:?}")]
    TimedOut {
        /// The unit being swapped.
        unit: String,
        /// The state being waited for.
        state: JobState,
        /// How long the step waited.
        waited: Duration,
    },

    /// The swap was cancelled before reaching `state`.
    #[error("swap of unit {unit} cancelled while heading to {state}")]
    Cancelled {
        /// The unit being swapped.
        unit: String,
        /// The state the swap was heading to.
        state: JobState,
    },

    /// The task running the swap panicked or was aborted.
    #[error("swap task for unit {unit} ended abnormally: {reason}")]
    Aborted {
        /// The unit being swapped.
        unit: String,
        /// The join error.
        reason: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_status_codes() {
        assert_eq!(
            ControlError::NoMatchingUnits("web.service".into()).http_status_code(),
            404
        );
        assert_eq!(
            ControlError::DiscoveryFailed {
                name: "web.service".into(),
                source: FleetError::Query("down".into()),
            }
            .http_status_code(),
            500
        );
        assert_eq!(
            ControlError::Fleet(FleetError::Query("down".into())).http_status_code(),
            500
        );
    }

    #[test]
    fn convergence_messages() {
        let err = ConvergenceError::TimedOut {
            unit: "web.service".into(),
            state: JobState::Loaded,
            waited: Duration::from_secs(2),
        };
        assert_eq!(err.to_string(), "unit web.service did not reach loaded within 2s");

        let err = ConvergenceError::Mutation(FleetError::Mutation {
            unit: "web.service".into(),
            state: JobState::Inactive,
            reason: "rejected".into(),
        });
        assert_eq!(err.to_string(), "failed to set unit web.service to inactive: rejected");
    }
}
