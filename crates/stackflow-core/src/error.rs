//! Core error types

use crate::resource::ResourceId;
use chrono::{DateTime, Utc};
use thiserror::Error;

/// Errors in how a stack is declared.
///
/// These are detected before or while values are composed and are never
/// retried.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigurationError {
    #[error("Cyclic dependency detected: {}", .0.join(" -> "))]
    CyclicDependency(Vec<String>),

    #[error("Resource '{node}' depends on {dependency}, which is not part of the stack")]
    UnknownDependency { node: String, dependency: ResourceId },

    #[error("Resource already declared: {0}")]
    DuplicateResource(String),

    #[error("Resource '{resource}' has no output named '{output}'")]
    UnknownOutput { resource: String, output: String },

    #[error("Invalid validity window: start {start} is not before end {end}")]
    InvalidWindow {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },

    #[error("Permission scope mismatch: {0}")]
    PermissionScopeMismatch(String),

    #[error("Missing identity: {0}")]
    MissingIdentity(String),

    #[error("Invalid signing key: {0}")]
    InvalidSigningKey(String),
}

/// Why a deferred value settled without a value.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OutputError {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    #[error("Resource '{resource}' failed: {reason}")]
    ResourceFailed { resource: String, reason: String },

    #[error("Resource '{resource}' was not realized")]
    Abandoned { resource: String },
}

/// A deferred value was settled more than once.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("Deferred value has already been settled")]
pub struct DoubleResolutionError;
