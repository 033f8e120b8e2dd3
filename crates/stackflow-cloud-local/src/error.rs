//! Local provider error types

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LocalProviderError {
    #[error("Invalid fault specification '{0}', expected <resource>=<fault>[*<times>]")]
    InvalidFaultSpec(String),

    #[error("Unknown fault kind: {0}")]
    UnknownFault(String),

    #[error("Resource '{resource}' is missing required input '{input}'")]
    MissingInput { resource: String, input: String },

    #[error("Resource '{resource}' has an invalid input '{input}': {reason}")]
    InvalidInput {
        resource: String,
        input: String,
        reason: String,
    },
}

pub type Result<T> = std::result::Result<T, LocalProviderError>;
