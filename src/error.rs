use thiserror::Error;

use crate::engine::HandleId;

/// Errors returned by the client facade.
#[derive(Debug, Error)]
pub enum Error {
    /// The client is not running (never started, or already stopped).
    #[error("client is not running")]
    Stopped,
    /// A transfer handle was registered twice. Handles are unique per
    /// in-flight transfer, so this is a programming error in the engine
    /// binding, not a transient condition.
    #[error("duplicate transfer handle {0:?}")]
    DuplicateHandle(HandleId),
    /// Engine-level failure.
    #[error("engine error: {0}")]
    Engine(#[from] EngineError),
}

/// Errors produced by a transfer engine binding.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Transfer handle creation or option application failed. The request
    /// this was for is dropped without a completion callback.
    #[error("transfer setup: {0}")]
    Setup(String),
    /// Driving the engine's active set failed.
    #[error("engine drive: {0}")]
    Drive(String),
    /// The engine's bounded wait primitive failed.
    #[error("engine wait: {0}")]
    Wait(String),
}
