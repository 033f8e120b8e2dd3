//! Fault injection
//!
//! Faults make the local provider fail a given resource a number of times,
//! which is how retries and failure isolation are exercised without a real
//! cloud.

use crate::error::{LocalProviderError, Result};
use stackflow_cloud::ProviderError;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultKind {
    RateLimited,
    Timeout,
    Validation,
    PermissionDenied,
    Api,
}

impl FaultKind {
    pub fn to_error(self, resource: &str) -> ProviderError {
        let message = format!("injected fault for '{}'", resource);
        match self {
            FaultKind::RateLimited => ProviderError::RateLimited(message),
            FaultKind::Timeout => ProviderError::Timeout(message),
            FaultKind::Validation => ProviderError::Validation(message),
            FaultKind::PermissionDenied => ProviderError::PermissionDenied(message),
            FaultKind::Api => ProviderError::Api(message),
        }
    }
}

impl FromStr for FaultKind {
    type Err = LocalProviderError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "rate-limited" | "throttle" => Ok(FaultKind::RateLimited),
            "timeout" => Ok(FaultKind::Timeout),
            "validation" => Ok(FaultKind::Validation),
            "permission-denied" | "forbidden" => Ok(FaultKind::PermissionDenied),
            "api" | "error" => Ok(FaultKind::Api),
            other => Err(LocalProviderError::UnknownFault(other.to_string())),
        }
    }
}

/// Fail `resource` with `kind` for the next `times` calls
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fault {
    pub resource: String,
    pub kind: FaultKind,
    pub times: u32,
}

impl Fault {
    pub fn new(resource: impl Into<String>, kind: FaultKind, times: u32) -> Self {
        Self {
            resource: resource.into(),
            kind,
            times,
        }
    }
}

impl FromStr for Fault {
    type Err = LocalProviderError;

    /// `storage=rate-limited*2`; the count defaults to one
    fn from_str(s: &str) -> Result<Self> {
        let invalid = || LocalProviderError::InvalidFaultSpec(s.to_string());
        let (resource, fault) = s.split_once('=').ok_or_else(invalid)?;
        if resource.trim().is_empty() {
            return Err(invalid());
        }
        let (kind, times) = match fault.split_once('*') {
            Some((kind, times)) => (kind, times.trim().parse().map_err(|_| invalid())?),
            None => (fault, 1),
        };
        Ok(Fault::new(resource.trim(), kind.trim().parse()?, times))
    }
}
