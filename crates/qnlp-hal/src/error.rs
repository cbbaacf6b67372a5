//! Error types for the HAL crate.

use qnlp_ir::IrError;
use thiserror::Error;

/// Errors that can occur in executor operations.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum HalError {
    /// Backend is not available.
    #[error("Backend not available: {0}")]
    BackendUnavailable(String),

    /// Authentication failed.
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    /// Backend session could not be established.
    #[error("Backend initialization failed: {0}")]
    Initialization(String),

    /// Circuit rejected by the executor.
    #[error("Invalid circuit: {0}")]
    InvalidCircuit(String),

    /// Circuit failed structural validation.
    #[error("Invalid circuit: {0}")]
    Ir(#[from] IrError),

    /// Network error.
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Operation did not complete within its time budget.
    #[error("Timeout: {0}")]
    Timeout(String),

    /// Circuit exceeds backend capabilities.
    #[error("Circuit exceeds backend capabilities: {0}")]
    CircuitTooLarge(String),

    /// Unsupported feature.
    #[error("Unsupported feature: {0}")]
    Unsupported(String),

    /// Invalid number of shots.
    #[error("Invalid shots: {0}")]
    InvalidShots(String),

    /// Dispatch was cancelled before completion.
    #[error("Execution cancelled")]
    Cancelled,

    /// Generic backend error.
    #[error("Backend error: {0}")]
    Backend(String),
}

/// Result type for HAL operations.
pub type HalResult<T> = Result<T, HalError>;
