//! Error types for the Lumen3D engine
//!
//! This module defines the error types used throughout the engine.
//! Usage-contract violations (a disposed buffer mutated, an out-of-range
//! handle, a full descriptor pool) get their own variant so callers can
//! tell an engine bug apart from a GPU failure.

use std::fmt;

/// Result type for Lumen3D engine operations
pub type Result<T> = std::result::Result<T, Error>;

/// Lumen3D engine errors
#[derive(Debug, Clone, PartialEq)]
pub enum Error {
    /// Backend-specific error (Vulkan API failure)
    BackendError(String),

    /// Out of GPU memory
    OutOfMemory,

    /// Invalid resource (unknown device object id, malformed data)
    InvalidResource(String),

    /// Initialization failed (device, swapchain, passes, pipelines)
    InitializationFailed(String),

    /// The caller broke a usage contract of the engine. Not recoverable.
    ContractViolation(String),
}

impl Error {
    /// True for errors raised by a broken usage contract
    pub fn is_contract_violation(&self) -> bool {
        matches!(self, Error::ContractViolation(_))
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::BackendError(msg) => write!(f, "Backend error: {}", msg),
            Error::OutOfMemory => write!(f, "Out of GPU memory"),
            Error::InvalidResource(msg) => write!(f, "Invalid resource: {}", msg),
            Error::InitializationFailed(msg) => write!(f, "Initialization failed: {}", msg),
            Error::ContractViolation(msg) => write!(f, "Contract violation: {}", msg),
        }
    }
}

impl std::error::Error for Error {}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
