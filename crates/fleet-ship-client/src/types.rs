//! Wire types for the fleet v1 API.
//!
//! Units and machines are passthrough values: the orchestrator only looks at
//! a unit's name and current state, everything else is rendered back to API
//! callers as fleet reported it.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Lifecycle state of a fleet job.
///
/// The ordering follows the fleet vocabulary: `inactive` < `loaded` < `launched`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    /// Known to the cluster but not scheduled anywhere.
    Inactive,
    /// Scheduled to a machine and loaded into its init system, not started.
    Loaded,
    /// Scheduled and running.
    Launched,
}

impl JobState {
    /// The wire representation of this state.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Inactive => "inactive",
            Self::Loaded => "loaded",
            Self::Launched => "launched",
        }
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "inactive" => Ok(Self::Inactive),
            "loaded" => Ok(Self::Loaded),
            "launched" => Ok(Self::Launched),
            other => Err(format!("unknown job state: {other}")),
        }
    }
}

/// A single `[Section] Name=Value` line of a unit file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitOption {
    /// Unit file section, e.g. `Service`.
    pub section: String,
    /// Option name, e.g. `ExecStart`.
    pub name: String,
    /// Option value.
    pub value: String,
}

/// A unit as described by the fleet API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Unit {
    /// Full unit name, including the `.service` suffix.
    pub name: String,
    /// Unit file contents.
    #[serde(default)]
    pub options: Vec<UnitOption>,
    /// State the unit has been asked to reach.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub desired_state: Option<JobState>,
    /// State the cluster currently observes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_state: Option<JobState>,
    /// Machine the unit is scheduled to, if any.
    #[serde(rename = "machineID", default, skip_serializing_if = "Option::is_none")]
    pub machine_id: Option<String>,
    /// Fields this client does not model, kept so the unit renders unchanged.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl Unit {
    /// Create a bare unit with the given name and current state.
    #[must_use]
    pub fn new(name: impl Into<String>, current_state: Option<JobState>) -> Self {
        Self {
            name: name.into(),
            options: Vec::new(),
            desired_state: None,
            current_state,
            machine_id: None,
            extra: serde_json::Map::new(),
        }
    }

    /// Returns true if the cluster reports the unit in `state`.
    #[must_use]
    pub fn is_in(&self, state: JobState) -> bool {
        self.current_state == Some(state)
    }
}

/// A machine participating in the cluster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Machine {
    /// Machine ID.
    pub id: String,
    /// Address the machine advertises.
    #[serde(rename = "primaryIP", default)]
    pub primary_ip: String,
    /// Free-form metadata used for scheduling constraints.
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

/// One page of `GET /fleet/v1/units`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct UnitPage {
    #[serde(default)]
    pub units: Vec<Unit>,
    #[serde(default)]
    pub next_page_token: Option<String>,
}

/// One page of `GET /fleet/v1/machines`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct MachinePage {
    #[serde(default)]
    pub machines: Vec<Machine>,
    #[serde(default)]
    pub next_page_token: Option<String>,
}

/// Body of `PUT /fleet/v1/units/{name}` when only the desired state changes.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct DesiredStateRequest<'a> {
    pub name: &'a str,
    pub desired_state: JobState,
}
