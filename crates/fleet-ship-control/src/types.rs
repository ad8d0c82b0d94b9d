//! Operation and configuration types for the orchestrator.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use fleet_ship_client::JobState;
use serde::{Deserialize, Serialize};

/// A unit operation that is carried out as a two-step state swap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    /// Unload and relaunch the unit on its current machine (`loaded` → `launched`).
    Restart,
    /// Unschedule and relaunch the unit, letting fleet pick a machine
    /// (`inactive` → `launched`).
    Rebalance,
}

impl Operation {
    /// The intermediate and final states of the swap.
    #[must_use]
    pub const fn states(self) -> (JobState, JobState) {
        match self {
            Self::Restart => (JobState::Loaded, JobState::Launched),
            Self::Rebalance => (JobState::Inactive, JobState::Launched),
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Restart => f.write_str("restart"),
            Self::Rebalance => f.write_str("rebalance"),
        }
    }
}

/// Progress of a single unit's state swap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SwapPhase {
    /// Registered, waiting for a worker slot or about to set the first state.
    Requested,
    /// First target state set, polling until fleet reports it.
    AwaitingFirst,
    /// First state observed.
    FirstReached,
    /// Final target state set, polling until fleet reports it.
    AwaitingSecond,
    /// Final state observed.
    Completed,
    /// A mutation failed, the step timed out or the swap was cancelled.
    Failed,
}

/// What the dispatcher does when a name matches no units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmptyMatchPolicy {
    /// Nothing to do: report success without launching anything.
    #[default]
    Accept,
    /// Report the request as not found.
    Reject,
}

impl FromStr for EmptyMatchPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "accept" => Ok(Self::Accept),
            "reject" => Ok(Self::Reject),
            other => Err(format!("unknown empty match policy: {other} (expected accept or reject)")),
        }
    }
}

/// Lowest accepted poll interval, in milliseconds.
pub const MIN_POLL_INTERVAL_MS: u64 = 10;

/// Configuration for the orchestrator.
#[derive(Debug, Clone, Deserialize)]
pub struct ControlConfig {
    /// Delay between two polls of a converging unit (milliseconds).
    /// Values below [`MIN_POLL_INTERVAL_MS`] are raised to it.
    #[serde(default = "ControlConfig::default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Maximum time a single swap step may wait for fleet to report the
    /// target state (seconds). `None` waits until cancelled.
    #[serde(default)]
    pub step_timeout_seconds: Option<u64>,

    /// Maximum number of swaps running at once. Further swaps queue.
    #[serde(default = "ControlConfig::default_max_concurrent_swaps")]
    pub max_concurrent_swaps: usize,

    /// Behaviour when a requested name matches no units.
    #[serde(default)]
    pub empty_match: EmptyMatchPolicy,
}

impl ControlConfig {
    const fn default_poll_interval_ms() -> u64 {
        500
    }

    const fn default_max_concurrent_swaps() -> usize {
        64
    }

    /// Get the poll interval as a `Duration`, never below
    /// [`MIN_POLL_INTERVAL_MS`].
    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(MIN_POLL_INTERVAL_MS))
    }

    /// Get the step timeout as a `Duration`, if any.
    #[must_use]
    pub fn step_timeout(&self) -> Option<Duration> {
        self.step_timeout_seconds.map(Duration::from_secs)
    }
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: Self::default_poll_interval_ms(),
            step_timeout_seconds: None,
            max_concurrent_swaps: Self::default_max_concurrent_swaps(),
            empty_match: EmptyMatchPolicy::Accept,
        }
    }
}
