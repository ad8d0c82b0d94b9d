//! Dispatch of unit operations across matched units.
//!
//! A dispatch resolves the requested name, then launches one swap task per
//! matched unit and returns without waiting for any of them. Each launched
//! task is returned as a [`SwapHandle`] the caller may await or drop.
//!
//! Swaps are bounded in two ways:
//!
//! - at most one swap per unit is in flight; duplicates are skipped
//! - at most `max_concurrent_swaps` swaps talk to fleet at once; the rest
//!   wait for a slot while registered as `Requested`

use std::sync::Arc;

use fleet_ship_client::FleetApi;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::convergence::Converger;
use crate::error::{ControlError, ConvergenceError, Result};
use crate::matcher::{normalize_name, Discovery, MatchResult, UnitMatcher};
use crate::registry::{Registration, SwapEntry, SwapRegistry};
use crate::types::{ControlConfig, EmptyMatchPolicy, Operation};

/// A launched swap.
#[derive(Debug)]
pub struct SwapHandle {
    /// The unit being swapped.
    pub unit: String,
    /// Identifies the swap in the registry.
    pub task_id: Uuid,
    handle: JoinHandle<std::result::Result<(), ConvergenceError>>,
}

impl SwapHandle {
    /// Wait for the swap to finish.
    ///
    /// # Errors
    ///
    /// Returns the swap's `ConvergenceError`, or `ConvergenceError::Aborted`
    /// if the task panicked or was aborted.
    pub async fn join(self) -> std::result::Result<(), ConvergenceError> {
        match self.handle.await {
            Ok(result) => result,
            Err(e) => Err(ConvergenceError::Aborted {
                unit: self.unit,
                reason: e.to_string(),
            }),
        }
    }

    /// Check if the swap has finished.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Abort the swap task.
    pub fn abort(&self) {
        self.handle.abort();
    }
}

/// Result of a dispatch.
#[derive(Debug)]
pub struct DispatchReport {
    /// The normalized requested name.
    pub name: String,
    /// The operation dispatched.
    pub operation: Operation,
    /// How the name resolved.
    pub matched: MatchResult,
    /// Swaps launched, in match order.
    pub launched: Vec<SwapHandle>,
    /// Matched units skipped because a swap was already in flight for them.
    pub skipped: Vec<String>,
}

/// Resolves requests and launches swaps.
pub struct Dispatcher<F: FleetApi + ?Sized + 'static> {
    fleet: Arc<F>,
    matcher: UnitMatcher<F>,
    converger: Arc<Converger<F>>,
    registry: Arc<SwapRegistry>,
    permits: Arc<Semaphore>,
    shutdown: CancellationToken,
    config: ControlConfig,
}

impl<F: FleetApi + ?Sized + 'static> Dispatcher<F> {
    /// Create a dispatcher for `fleet`.
    #[must_use]
    pub fn new(fleet: Arc<F>, config: ControlConfig) -> Self {
        let converger = Arc::new(Converger::from_config(Arc::clone(&fleet), &config));
        let permits = config.max_concurrent_swaps.clamp(1, Semaphore::MAX_PERMITS);
        let permits = Arc::new(Semaphore::new(permits));

        Self {
            matcher: UnitMatcher::new(Arc::clone(&fleet)),
            fleet,
            converger,
            registry: Arc::new(SwapRegistry::new()),
            permits,
            shutdown: CancellationToken::new(),
            config,
        }
    }

    /// Create with default configuration.
    #[must_use]
    pub fn with_defaults(fleet: Arc<F>) -> Self {
        Self::new(fleet, ControlConfig::default())
    }

    /// The fleet client shared by every swap.
    #[must_use]
    pub fn fleet(&self) -> &F {
        &self.fleet
    }

    /// The unit matcher.
    #[must_use]
    pub const fn matcher(&self) -> &UnitMatcher<F> {
        &self.matcher
    }

    /// Get the configuration.
    #[must_use]
    pub const fn config(&self) -> &ControlConfig {
        &self.config
    }

    /// Swaps currently in flight, oldest first.
    #[must_use]
    pub fn in_flight(&self) -> Vec<SwapEntry> {
        self.registry.snapshot()
    }

    /// Cancel every in-flight and queued swap. Later dispatches are cancelled
    /// as soon as they start.
    pub fn shutdown(&self) {
        tracing::info!(in_flight = self.registry.len(), "Cancelling unit swaps");
        self.shutdown.cancel();
    }

    /// Restart every unit `name` resolves to.
    ///
    /// # Errors
    ///
    /// See [`Dispatcher::dispatch`].
    pub async fn restart(&self, name: &str) -> Result<DispatchReport> {
        self.dispatch(name, Operation::Restart).await
    }

    /// Rebalance every unit `name` resolves to.
    ///
    /// # Errors
    ///
    /// See [`Dispatcher::dispatch`].
    pub async fn rebalance(&self, name: &str) -> Result<DispatchReport> {
        self.dispatch(name, Operation::Rebalance).await
    }

    /// Resolve `name` and launch `operation` on every matched unit.
    ///
    /// Returns as soon as the swaps are launched.
    ///
    /// # Errors
    ///
    /// - `ControlError::DiscoveryFailed` if fleet could not list units.
    /// - `ControlError::NoMatchingUnits` if nothing matched and the empty
    ///   match policy is `Reject`.
    pub async fn dispatch(&self, name: &str, operation: Operation) -> Result<DispatchReport> {
        let name = normalize_name(name);

        let matched = match self.matcher.resolve(&name).await {
            Discovery::Found(matched) => matched,
            Discovery::RemoteUnavailable(source) => {
                return Err(ControlError::DiscoveryFailed { name, source });
            }
        };

        if matched.is_empty() {
            match self.config.empty_match {
                EmptyMatchPolicy::Accept => {
                    tracing::info!(unit = %name, operation = %operation, "No units matched, nothing to do");
                }
                EmptyMatchPolicy::Reject => return Err(ControlError::NoMatchingUnits(name)),
            }
        }

        let mut launched = Vec::new();
        let mut skipped = Vec::new();

        for unit in matched.names() {
            match self.launch(unit, operation) {
                Some(handle) => launched.push(handle),
                None => {
                    tracing::warn!(unit = %unit, operation = %operation, "Swap already in flight, skipping");
                    skipped.push(unit.to_string());
                }
            }
        }

        tracing::info!(
            unit = %name,
            operation = %operation,
            launched = launched.len(),
            skipped = skipped.len(),
            "Dispatched unit operation"
        );

        Ok(DispatchReport {
            name,
            operation,
            matched,
            launched,
            skipped,
        })
    }

    fn launch(&self, unit: &str, operation: Operation) -> Option<SwapHandle> {
        let task_id = self.registry.try_register(unit, operation)?;
        let registration = Registration::new(Arc::clone(&self.registry), unit.to_string(), task_id);

        let converger = Arc::clone(&self.converger);
        let permits = Arc::clone(&self.permits);
        let cancel = self.shutdown.child_token();
        let task_unit = unit.to_string();

        let handle = tokio::spawn(async move {
            let (first, _) = operation.states();
            let cancelled = || ConvergenceError::Cancelled {
                unit: task_unit.clone(),
                state: first,
            };

            let _permit = tokio::select! {
                biased;
                () = cancel.cancelled() => return Err(cancelled()),
                permit = permits.acquire_owned() => permit.map_err(|_| cancelled())?,
            };

            converger
                .run(operation, &task_unit, &cancel, |phase| registration.set_phase(phase))
                .await
        });

        Some(SwapHandle {
            unit: unit.to_string(),
            task_id,
            handle,
        })
    }
}
