//! Bridge error types.

use serde_json::Value;
use thiserror::Error;

use crate::transport::TransportError;

/// Result type for bridge operations.
pub type BridgeResult<T> = Result<T, BridgeError>;

/// Errors that can occur while constructing or starting a bridge.
#[derive(Debug, Error)]
pub enum BridgeError {
    /// Two inbound bindings share a wire event name.
    #[error("duplicate inbound binding for event '{0}'")]
    DuplicateEvent(String),

    /// Two outbound bindings share a port name.
    #[error("duplicate outbound binding for port '{0}'")]
    DuplicatePort(String),

    /// `start()` was called on a bridge that is already running.
    #[error("bridge already started")]
    AlreadyStarted,

    /// The transport refused a request outright.
    #[error("transport unavailable: {0}")]
    Transport(#[from] TransportError),
}

/// A payload arrived without the fields its transform requires.
///
/// Recovered locally: the bridge logs the error and drops the single event,
/// leaving every other binding untouched.
#[derive(Debug, Error)]
#[error("malformed '{event}' payload: missing field '{field}' in {payload}")]
pub struct PayloadShapeError {
    /// Canonical name of the offending event.
    pub event: String,
    /// Field the transform required but did not find.
    pub field: &'static str,
    /// The raw payload as delivered.
    pub payload: Value,
}
