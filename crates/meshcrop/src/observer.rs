//! Lifecycle callbacks.

use serde::{Deserialize, Serialize};

use crate::state::LoadingState;

/// Structured load progress.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadProgress {
    /// 0 to 100.
    pub percentage: f64,
    /// Bytes processed so far.
    pub bytes_loaded: u64,
    /// Total bytes, when known.
    pub bytes_total: Option<u64>,
    /// Human-readable stage.
    pub message: String,
}

/// Receives engine notifications. Every method defaults to a no-op.
pub trait EngineObserver {
    /// The loading state changed.
    fn on_state_change(&self, _state: LoadingState) {}

    /// A load or export failed.
    fn on_error(&self, _message: &str) {}

    /// A load advanced.
    fn on_progress(&self, _progress: &LoadProgress) {}
}
