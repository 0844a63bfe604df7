//! Error types for remote service operations.

use std::fmt;

/// Errors surfaced by the D-Bus clients and the components built on them.
///
/// Remote failures are logged at the call site and returned to the caller;
/// none of them is fatal to the process.
#[derive(Debug)]
pub enum ServiceError {
    ConnectionFailed(String),
    ClaimFailed(String),
    CallFailed(String),
    InvalidPayload(String),
}

impl fmt::Display for ServiceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServiceError::ConnectionFailed(msg) => write!(f, "Connection failed: {}", msg),
            ServiceError::ClaimFailed(msg) => write!(f, "Failed to claim device: {}", msg),
            ServiceError::CallFailed(msg) => write!(f, "Remote call failed: {}", msg),
            ServiceError::InvalidPayload(msg) => write!(f, "Invalid payload: {}", msg),
        }
    }
}

impl std::error::Error for ServiceError {}

impl From<zbus::Error> for ServiceError {
    fn from(e: zbus::Error) -> Self {
        ServiceError::CallFailed(e.to_string())
    }
}

impl From<serde_json::Error> for ServiceError {
    fn from(e: serde_json::Error) -> Self {
        ServiceError::InvalidPayload(e.to_string())
    }
}
