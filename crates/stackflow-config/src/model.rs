//! Project and stack settings

use serde::{Deserialize, Serialize};

/// Contents of `stackflow.yaml`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectFile {
    /// Project name, used as the prefix of resource names
    pub name: String,

    #[serde(default)]
    pub description: Option<String>,

    /// Defaults for every stack
    #[serde(default)]
    pub defaults: Settings,
}

/// Settings that a stack file may override.
///
/// Every field is optional so stack files only need to list what differs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    pub tenant_id: Option<String>,
    pub subscription: Option<String>,
    pub location: Option<String>,
    pub concurrency: Option<usize>,
    pub call_timeout_ms: Option<u64>,
    #[serde(default)]
    pub retry: RetrySettings,
}

impl Settings {
    /// Fields set in `other` win
    pub fn merge(mut self, other: Settings) -> Self {
        self.tenant_id = other.tenant_id.or(self.tenant_id);
        self.subscription = other.subscription.or(self.subscription);
        self.location = other.location.or(self.location);
        self.concurrency = other.concurrency.or(self.concurrency);
        self.call_timeout_ms = other.call_timeout_ms.or(self.call_timeout_ms);
        self.retry = self.retry.merge(other.retry);
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetrySettings {
    pub max_attempts: Option<u32>,
    pub initial_delay_ms: Option<u64>,
    pub max_delay_ms: Option<u64>,
    pub backoff_multiplier: Option<f64>,
}

impl RetrySettings {
    pub fn merge(self, other: RetrySettings) -> Self {
        Self {
            max_attempts: other.max_attempts.or(self.max_attempts),
            initial_delay_ms: other.initial_delay_ms.or(self.initial_delay_ms),
            max_delay_ms: other.max_delay_ms.or(self.max_delay_ms),
            backoff_multiplier: other.backoff_multiplier.or(self.backoff_multiplier),
        }
    }
}

/// Settings of one stack with project defaults applied
#[derive(Debug, Clone, PartialEq)]
pub struct StackConfig {
    pub project: String,
    pub stack: String,
    pub tenant_id: String,
    pub subscription: Option<String>,
    pub location: Option<String>,
    pub concurrency: Option<usize>,
    pub call_timeout_ms: Option<u64>,
    pub retry: RetrySettings,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stack_settings_override_defaults() {
        let defaults = Settings {
            tenant_id: Some("tenant".into()),
            location: Some("westeurope".into()),
            concurrency: Some(4),
            retry: RetrySettings {
                max_attempts: Some(3),
                initial_delay_ms: Some(1000),
                ..RetrySettings::default()
            },
            ..Settings::default()
        };
        let stack = Settings {
            location: Some("japaneast".into()),
            retry: RetrySettings {
                max_attempts: Some(5),
                ..RetrySettings::default()
            },
            ..Settings::default()
        };

        let merged = defaults.merge(stack);
        assert_eq!(merged.tenant_id.as_deref(), Some("tenant"));
        assert_eq!(merged.location.as_deref(), Some("japaneast"));
        assert_eq!(merged.concurrency, Some(4));
        assert_eq!(merged.retry.max_attempts, Some(5));
        assert_eq!(merged.retry.initial_delay_ms, Some(1000));
    }

    #[test]
    fn test_parse_project_file() {
        let project: ProjectFile = serde_yaml::from_str(
            "name: contact-legacy\n\
             defaults:\n  tenantId: 88a91815-758a-48c5-8810-c5520e8f581a\n  retry:\n    maxAttempts: 4\n",
        )
        .unwrap();
        assert_eq!(project.name, "contact-legacy");
        assert_eq!(
            project.defaults.tenant_id.as_deref(),
            Some("88a91815-758a-48c5-8810-c5520e8f581a")
        );
        assert_eq!(project.defaults.retry.max_attempts, Some(4));
    }
}
