//! Provider and engine error types

use stackflow_core::{ConfigurationError, OutputError};
use thiserror::Error;

/// Errors that stop a run or a state operation as a whole
#[derive(Error, Debug)]
pub enum CloudError {
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Invalid configuration: {0}")]
    Configuration(#[from] ConfigurationError),

    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    #[error("State file error: {0}")]
    StateError(String),

    #[error("Lock acquisition failed: {0}")]
    LockError(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, CloudError>;

/// Error returned by a single provisioning call
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProviderError {
    #[error("Rate limited: {0}")]
    RateLimited(String),

    #[error("Timeout: {0}")]
    Timeout(String),

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("API error: {0}")]
    Api(String),
}

impl ProviderError {
    /// Whether the call may succeed if repeated
    pub fn is_transient(&self) -> bool {
        matches!(self, ProviderError::RateLimited(_) | ProviderError::Timeout(_))
    }
}

/// Why a node ended up failed
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NodeError {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    #[error("Input '{input}' was rejected: {error}")]
    Input { input: String, error: OutputError },

    #[error("Provisioning failed after {attempts} attempt(s): {error}")]
    Provisioning { error: ProviderError, attempts: u32 },

    #[error("Provider did not return outputs: {}", .0.join(", "))]
    MissingOutputs(Vec<String>),

    #[error("Provider call panicked: {0}")]
    Panicked(String),
}

impl NodeError {
    pub(crate) fn from_input(input: String, error: OutputError) -> Self {
        match error {
            OutputError::Configuration(e) => NodeError::Configuration(e),
            error => NodeError::Input { input, error },
        }
    }
}
