//! Lifecycle of a pipeline worker.

use std::sync::{Arc, Mutex};

/// Worker states: Idle → Processing → Idle ... → ShuttingDown → Stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    /// Waiting on its queue
    Idle,
    /// Working on one item
    Processing,
    /// Saw the shutdown flag or a sentinel
    ShuttingDown,
    /// Thread has returned
    Stopped,
}

impl std::fmt::Display for WorkerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WorkerState::Idle => write!(f, "Idle"),
            WorkerState::Processing => write!(f, "Processing"),
            WorkerState::ShuttingDown => write!(f, "Shutting down"),
            WorkerState::Stopped => write!(f, "Stopped"),
        }
    }
}

/// State cell shared between a worker thread and the coordinator.
#[derive(Debug, Clone)]
pub struct StateCell(Arc<Mutex<WorkerState>>);

impl StateCell {
    pub fn new() -> Self {
        Self(Arc::new(Mutex::new(WorkerState::Idle)))
    }

    pub fn get(&self) -> WorkerState {
        self.0
            .lock()
            .map(|s| *s)
            .unwrap_or(WorkerState::Stopped)
    }

    pub fn set(&self, state: WorkerState) {
        if let Ok(mut s) = self.0.lock() {
            *s = state;
        }
    }
}

impl Default for StateCell {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_display() {
        assert_eq!(format!("{}", WorkerState::Idle), "Idle");
        assert_eq!(format!("{}", WorkerState::ShuttingDown), "Shutting down");
    }

    #[test]
    fn test_cell_is_shared_between_clones() {
        let cell = StateCell::new();
        let other = cell.clone();
        assert_eq!(other.get(), WorkerState::Idle);
        cell.set(WorkerState::Processing);
        assert_eq!(other.get(), WorkerState::Processing);
    }
}
