//! Two-step state convergence for a single unit.
//!
//! # State Machine
//!
//! ```text
//!   Requested ──set(first)──▶ AwaitingFirst ──observed──▶ FirstReached
//!       │                          │                          │
//!       │ mutation error           │ timeout / cancel         │ set(second)
//!       ▼                          ▼                          ▼
//!    Failed ◀──────────────────────┴──────────────────── AwaitingSecond
//!                                                             │
//!                                                             │ observed
//!                                                             ▼
//!                                                         Completed
//! ```
//!
//! A wait step ends only when fleet reports the unit's current state equal
//! to the step's target. Query errors while polling are logged and retried.
//! Waiting is bounded by an optional per-step deadline and by a
//! cancellation token.

use std::sync::Arc;
use std::time::Duration;

use fleet_ship_client::{FleetApi, JobState};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::error::ConvergenceError;
use crate::types::{ControlConfig, Operation, SwapPhase};

/// Drives units through target-state swaps.
pub struct Converger<F: FleetApi + ?Sized> {
    fleet: Arc<F>,
    poll_interval: Duration,
    step_timeout: Option<Duration>,
}

impl<F: FleetApi + ?Sized> Converger<F> {
    /// Create a converger polling every `poll_interval`, waiting at most
    /// `step_timeout` per step.
    #[must_use]
    pub fn new(fleet: Arc<F>, poll_interval: Duration, step_timeout: Option<Duration>) -> Self {
        Self {
            fleet,
            poll_interval,
            step_timeout,
        }
    }

    /// Create a converger from the orchestrator configuration.
    #[must_use]
    pub fn from_config(fleet: Arc<F>, config: &ControlConfig) -> Self {
        Self::new(fleet, config.poll_interval(), config.step_timeout())
    }

    /// Restart a unit: `loaded`, then `launched`.
    ///
    /// # Errors
    ///
    /// See [`Converger::swap_state`].
    pub async fn restart_unit(
        &self,
        name: &str,
        cancel: &CancellationToken,
    ) -> Result<(), ConvergenceError> {
        self.run(Operation::Restart, name, cancel, |_| {}).await
    }

    /// Rebalance a unit: `inactive`, then `launched`.
    ///
    /// # Errors
    ///
    /// See [`Converger::swap_state`].
    pub async fn rebalance_unit(
        &self,
        name: &str,
        cancel: &CancellationToken,
    ) -> Result<(), ConvergenceError> {
        self.run(Operation::Rebalance, name, cancel, |_| {}).await
    }

    /// Run `operation` on a unit, reporting each phase to `on_phase`.
    ///
    /// # Errors
    ///
    /// See [`Converger::swap_state`].
    pub async fn run(
        &self,
        operation: Operation,
        name: &str,
        cancel: &CancellationToken,
        on_phase: impl Fn(SwapPhase) + Send + Sync,
    ) -> Result<(), ConvergenceError> {
        let (first, second) = operation.states();
        self.swap_state_observed(name, first, second, cancel, on_phase)
            .await
    }

    /// Move a unit to `first`, wait for it, then to `second` and wait again.
    ///
    /// # Errors
    ///
    /// - `ConvergenceError::Mutation` if either target-state request fails.
    ///   The second request is never issued if the first one failed.
    /// - `ConvergenceError::TimedOut` if a step exceeds the step timeout.
    /// - `ConvergenceError::Cancelled` if `cancel` fires.
    pub async fn swap_state(
        &self,
        name: &str,
        first: JobState,
        second: JobState,
        cancel: &CancellationToken,
    ) -> Result<(), ConvergenceError> {
        self.swap_state_observed(name, first, second, cancel, |_| {})
            .await
    }

    async fn swap_state_observed(
        &self,
        name: &str,
        first: JobState,
        second: JobState,
        cancel: &CancellationToken,
        on_phase: impl Fn(SwapPhase) + Send + Sync,
    ) -> Result<(), ConvergenceError> {
        on_phase(SwapPhase::Requested);

        let result = async {
            self.set_target(name, first, cancel).await?;
            on_phase(SwapPhase::AwaitingFirst);
            self.wait_for_state(name, first, cancel).await?;
            on_phase(SwapPhase::FirstReached);

            self.set_target(name, second, cancel).await?;
            on_phase(SwapPhase::AwaitingSecond);
            self.wait_for_state(name, second, cancel).await
        }
        .await;

        match &result {
            Ok(()) => {
                on_phase(SwapPhase::Completed);
                tracing::info!(unit = %name, from = %first, to = %second, "Unit swap completed");
            }
            Err(e) => {
                on_phase(SwapPhase::Failed);
                tracing::error!(unit = %name, error = %e, "Unit swap failed");
            }
        }

        result
    }

    async fn set_target(
        &self,
        name: &str,
        state: JobState,
        cancel: &CancellationToken,
    ) -> Result<(), ConvergenceError> {
        if cancel.is_cancelled() {
            return Err(ConvergenceError::Cancelled {
                unit: name.to_string(),
                state,
            });
        }

        tracing::info!(unit = %name, state = %state, "Setting unit target state");

        self.fleet
            .set_unit_target_state(name, state)
            .await
            .map_err(ConvergenceError::Mutation)
    }

    /// Poll the unit until fleet reports it in `state`.
    ///
    /// The first poll happens immediately, later ones every poll interval.
    ///
    /// # Errors
    ///
    /// Returns `ConvergenceError::TimedOut` once the step timeout elapses and
    /// `ConvergenceError::Cancelled` if `cancel` fires.
    pub async fn wait_for_state(
        &self,
        name: &str,
        state: JobState,
        cancel: &CancellationToken,
    ) -> Result<(), ConvergenceError> {
        let started = Instant::now();
        let cancelled = || ConvergenceError::Cancelled {
            unit: name.to_string(),
            state,
        };

        loop {
            let observed = tokio::select! {
                biased;
                () = cancel.cancelled() => return Err(cancelled()),
                observed = self.fleet.unit(name) => observed,
            };

            match observed {
                Ok(Some(unit)) if unit.is_in(state) => {
                    tracing::debug!(unit = %name, state = %state, "Unit reached target state");
                    return Ok(());
                }
                Ok(Some(unit)) => {
                    tracing::debug!(
                        unit = %name,
                        current = ?unit.current_state,
                        wanted = %state,
                        "Unit has not reached target state yet"
                    );
                }
                Ok(None) => {
                    tracing::debug!(unit = %name, wanted = %state, "Unit not reported by fleet");
                }
                Err(e) => {
                    tracing::warn!(unit = %name, error = %e, "Error while waiting for unit state");
                }
            }

            if let Some(timeout) = self.step_timeout {
                let waited = started.elapsed();
                if waited >= timeout {
                    return Err(ConvergenceError::TimedOut {
                        unit: name.to_string(),
                        state,
                        waited,
                    });
                }
            }

            tokio::select! {
                biased;
                () = cancel.cancelled() => return Err(cancelled()),
                () = tokio::time::sleep(self.poll_interval) => {}
            }
        }
    }
}
