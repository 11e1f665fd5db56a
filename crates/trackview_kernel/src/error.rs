//! Pipeline errors

use thiserror::Error;
use trackview_render::{DeviceError, ShadowError};

use crate::fault::Fault;
use crate::scheduler::SchedulerState;
use crate::settings::SettingsError;

/// Errors raised by the frame pipeline
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("An update is already in flight")]
    UpdateInFlight,

    #[error("Frame slot {0} is already held by the buffer")]
    SlotOccupied(usize),

    #[error("Update worker has been stopped")]
    UpdaterStopped,

    #[error("Update worker disconnected")]
    WorkerDisconnected,

    #[error("Failed to start update worker: {0}")]
    WorkerSpawn(String),

    #[error("Scheduler is {actual:?}, expected {expected:?}")]
    InvalidState {
        expected: SchedulerState,
        actual: SchedulerState,
    },

    #[error("Invalid settings: {0}")]
    Settings(#[from] SettingsError),

    #[error("Shadow setup failed: {0}")]
    Shadow(#[from] ShadowError),

    #[error("Graphics device error: {0}")]
    Device(#[from] DeviceError),

    #[error(transparent)]
    Fault(#[from] Fault),
}

/// Result type for pipeline operations
pub type PipelineResult<T> = Result<T, PipelineError>;
