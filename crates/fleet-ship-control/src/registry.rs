//! In-flight swap registry.
//!
//! At most one swap runs per unit. The registry is keyed by unit name and
//! entries are removed when the task owning them ends, however it ends.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;
use uuid::Uuid;

use crate::types::{Operation, SwapPhase};

/// A swap currently in flight.
#[derive(Debug, Clone, Serialize)]
pub struct SwapEntry {
    /// Identifies the task running the swap.
    pub task_id: Uuid,
    /// The unit being swapped.
    pub unit: String,
    /// The operation being carried out.
    pub operation: Operation,
    /// Current progress.
    pub phase: SwapPhase,
    /// When the swap was registered.
    pub started_at: DateTime<Utc>,
}

/// Registry of in-flight swaps keyed by unit name.
#[derive(Debug, Default)]
pub struct SwapRegistry {
    entries: RwLock<HashMap<String, SwapEntry>>,
}

impl SwapRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a swap for `unit` unless one is already in flight.
    ///
    /// Returns the new task ID, or `None` if the unit is busy.
    pub fn try_register(&self, unit: &str, operation: Operation) -> Option<Uuid> {
        let mut entries = self.entries.write();
        if entries.contains_key(unit) {
            return None;
        }

        let task_id = Uuid::new_v4();
        entries.insert(
            unit.to_string(),
            SwapEntry {
                task_id,
                unit: unit.to_string(),
                operation,
                phase: SwapPhase::Requested,
                started_at: Utc::now(),
            },
        );
        Some(task_id)
    }

    /// Record the phase of the swap `task_id` running on `unit`.
    pub fn set_phase(&self, unit: &str, task_id: Uuid, phase: SwapPhase) {
        if let Some(entry) = self.entries.write().get_mut(unit) {
            if entry.task_id == task_id {
                entry.phase = phase;
            }
        }
    }

    /// Remove the swap `task_id` running on `unit`.
    pub fn release(&self, unit: &str, task_id: Uuid) -> Option<SwapEntry> {
        let mut entries = self.entries.write();
        match entries.get(unit) {
            Some(entry) if entry.task_id == task_id => entries.remove(unit),
            _ => None,
        }
    }

    /// Get the swap in flight for `unit`, if any.
    #[must_use]
    pub fn get(&self, unit: &str) -> Option<SwapEntry> {
        self.entries.read().get(unit).cloned()
    }

    /// Check if a swap is in flight for `unit`.
    #[must_use]
    pub fn contains(&self, unit: &str) -> bool {
        self.entries.read().contains_key(unit)
    }

    /// Number of swaps in flight.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Check if no swap is in flight.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// All swaps in flight, oldest first.
    #[must_use]
    pub fn snapshot(&self) -> Vec<SwapEntry> {
        let mut entries: Vec<_> = self.entries.read().values().cloned().collect();
        entries.sort_by(|a, b| a.started_at.cmp(&b.started_at).then_with(|| a.unit.cmp(&b.unit)));
        entries
    }
}

/// Releases a registry entry when dropped.
///
/// Held by the task running the swap so the entry goes away on completion,
/// panic or abort alike.
pub(crate) struct Registration {
    registry: Arc<SwapRegistry>,
    unit: String,
    task_id: Uuid,
}

impl Registration {
    pub(crate) fn new(registry: Arc<SwapRegistry>, unit: String, task_id: Uuid) -> Self {
        Self {
            registry,
            unit,
            task_id,
        }
    }

    pub(crate) fn set_phase(&self, phase: SwapPhase) {
        self.registry.set_phase(&self.unit, self.task_id, phase);
    }
}

impl Drop for Registration {
    fn drop(&mut self) {
        self.registry.release(&self.unit, self.task_id);
    }
}
