//! Error types shared across the scheduler, dispatcher, and collaborators.
//!
//! Only [`SchedulerError`] ever reaches the caller of a run. Dispatch,
//! sink, and power-flow errors are logged at the point they occur and the
//! scenario continues.

use std::io;

use crate::network::{EquipmentId, LineId};

/// Failure to apply a single event.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    /// The target line does not exist in the directory.
    #[error("line id={0} not found")]
    LineNotFound(LineId),

    /// The target equipment does not exist in the directory.
    #[error("equipment id={0} not found")]
    EquipmentNotFound(EquipmentId),

    /// The event kind is not one the dispatcher knows how to apply.
    #[error("unknown event kind: {0}")]
    UnknownKind(String),
}

/// Error raised by a notification consumer.
#[derive(Debug, thiserror::Error)]
#[error("notification sink failed: {0}")]
pub struct SinkError(pub String);

impl From<io::Error> for SinkError {
    fn from(e: io::Error) -> Self {
        Self(e.to_string())
    }
}

impl From<serde_json::Error> for SinkError {
    fn from(e: serde_json::Error) -> Self {
        Self(e.to_string())
    }
}

/// Failure of the power-flow collaborator or of persisting its result.
#[derive(Debug, thiserror::Error)]
pub enum PowerFlowError {
    /// The solver reported an error (or panicked).
    #[error("power-flow solver failed: {0}")]
    Solver(String),

    /// The artifact could not be written.
    #[error("failed to write power-flow artifact: {0}")]
    Io(#[from] io::Error),

    /// The result could not be serialized.
    #[error("failed to serialize power-flow result: {0}")]
    Json(#[from] serde_json::Error),
}

/// Errors surfaced to the caller of the scheduler.
#[derive(Debug, thiserror::Error)]
pub enum SchedulerError {
    /// A run is already active on this scheduler.
    #[error("scheduler is already running a scenario")]
    AlreadyRunning,

    /// The background thread could not be started.
    #[error("failed to spawn scenario thread: {0}")]
    ThreadSpawn(#[from] io::Error),
}

/// Configuration error with field path and constraint description.
#[derive(Debug, thiserror::Error)]
#[error("config error: {field} - {message}")]
pub struct ConfigError {
    /// Dotted field path (e.g., `"events[2].at_s"`).
    pub field: String,
    /// Human-readable constraint description.
    pub message: String,
}

impl ConfigError {
    pub(crate) fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}
