//! Deployment context
//!
//! Everything a stack program needs to know about where it is deployed is
//! passed explicitly through this object.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentContext {
    /// Project name, used as the prefix of physical resource names
    pub project: String,

    /// Stack (environment) name, e.g. "dev" or "prod"
    pub stack: String,

    /// Directory tenant the access policies are issued in
    pub tenant_id: String,

    /// Default location for resources that take one
    pub location: String,
}

impl DeploymentContext {
    pub fn new(
        project: impl Into<String>,
        stack: impl Into<String>,
        tenant_id: impl Into<String>,
    ) -> Self {
        Self {
            project: project.into(),
            stack: stack.into(),
            tenant_id: tenant_id.into(),
            location: "westeurope".to_string(),
        }
    }

    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = location.into();
        self
    }

    /// `{project}-{suffix}-{stack}`, or `{project}-{stack}` for an empty suffix
    pub fn resource_name(&self, suffix: &str) -> String {
        if suffix.is_empty() {
            format!("{}-{}", self.project, self.stack)
        } else {
            format!("{}-{}-{}", self.project, suffix, self.stack)
        }
    }

    /// Name for services that only allow lowercase alphanumerics.
    ///
    /// The project part is cut to ten characters so the stack name still fits
    /// within storage account limits.
    pub fn compact_name(&self) -> String {
        let project: String = self
            .project
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .map(|c| c.to_ascii_lowercase())
            .take(10)
            .collect();
        let stack: String = self
            .stack
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .map(|c| c.to_ascii_lowercase())
            .collect();
        format!("{}{}", project, stack)
    }
}
