//! App Service plans, web apps and deployment slots

use super::{Inputs, ResourceArgs, string_value};
use crate::error::ConfigurationError;
use crate::output::{Input, Output};
use crate::resource::{ResourceId, ResourceKind};
use crate::stack::Stack;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkuDescription {
    pub tier: String,
    pub name: String,
}

impl SkuDescription {
    /// Serverless consumption plan
    pub fn consumption() -> Self {
        Self {
            tier: "Dynamic".to_string(),
            name: "Y1".to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppServicePlanArgs {
    pub resource_group_name: Input<String>,
    pub kind: String,
    pub sku: SkuDescription,
    /// Must be true for Linux plans
    pub reserved: bool,
    pub location: Option<Input<String>>,
}

impl ResourceArgs for AppServicePlanArgs {
    const KIND: ResourceKind = ResourceKind::AppServicePlan;
    const OUTPUTS: &'static [(&'static str, bool)] = &[("name", false), ("id", false)];

    fn into_inputs(self) -> Inputs {
        Inputs::new()
            .string("resourceGroupName", self.resource_group_name)
            .optional_string("location", self.location)
            .literal("kind", json!(self.kind))
            .literal("sku", json!(self.sku))
            .literal("reserved", json!(self.reserved))
    }
}

#[derive(Debug, Clone)]
pub struct AppServicePlan {
    pub resource: ResourceId,
    pub name: Output<String>,
    pub id: Output<String>,
}

impl AppServicePlan {
    pub fn new(
        stack: &mut Stack,
        name: impl Into<String>,
        args: AppServicePlanArgs,
    ) -> Result<Self, ConfigurationError> {
        let node = stack.declare(name, args)?;
        Ok(Self {
            resource: node.id(),
            name: node.string_output("name"),
            id: node.string_output("id"),
        })
    }
}

/// One application setting
#[derive(Debug, Clone)]
pub struct NameValuePair {
    pub name: String,
    pub value: Input<String>,
}

/// Site configuration shared by an app and its slots
#[derive(Debug, Clone, Default)]
pub struct SiteConfig {
    pub app_settings: Vec<NameValuePair>,
}

impl SiteConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn setting(mut self, name: impl Into<String>, value: impl Into<Input<String>>) -> Self {
        self.app_settings.push(NameValuePair {
            name: name.into(),
            value: value.into(),
        });
        self
    }

    /// True when any setting carries secret material
    pub fn is_secret(&self) -> bool {
        self.app_settings.iter().any(|s| s.value.is_secret())
    }

    /// `{"appSettings": [{"name", "value"}, ...]}`, secret if any setting is
    pub fn to_output(&self) -> Output<Value> {
        let settings = self.app_settings.iter().map(|setting| {
            let name = setting.name.clone();
            string_value(setting.value.clone()).map(move |value| json!({ "name": name, "value": value }))
        });
        Output::all(settings).map(|settings| json!({ "appSettings": settings }))
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum IdentityType {
    #[default]
    SystemAssigned,
    UserAssigned,
    None,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManagedServiceIdentity {
    #[serde(rename = "type")]
    pub kind: IdentityType,
}

impl ManagedServiceIdentity {
    pub fn system_assigned() -> Self {
        Self {
            kind: IdentityType::SystemAssigned,
        }
    }
}

#[derive(Debug, Clone)]
pub struct WebAppArgs {
    /// Physical site name; generated from the logical name when absent
    pub name: Option<Input<String>>,
    pub kind: String,
    pub resource_group_name: Input<String>,
    pub server_farm_id: Input<String>,
    pub site_config: SiteConfig,
    pub identity: Option<ManagedServiceIdentity>,
}

fn site_inputs(
    inputs: Inputs,
    kind: String,
    resource_group_name: Input<String>,
    server_farm_id: Input<String>,
    site_config: &SiteConfig,
    identity: Option<ManagedServiceIdentity>,
) -> Inputs {
    let inputs = inputs
        .literal("kind", json!(kind))
        .string("resourceGroupName", resource_group_name)
        .string("serverFarmId", server_farm_id)
        .value("siteConfig", site_config.to_output());
    match identity {
        Some(identity) => inputs.literal("identity", json!(identity)),
        None => inputs,
    }
}

impl ResourceArgs for WebAppArgs {
    const KIND: ResourceKind = ResourceKind::WebApp;
    const OUTPUTS: &'static [(&'static str, bool)] = &[
        ("name", false),
        ("id", false),
        ("defaultHostName", false),
        ("principalId", false),
    ];

    fn into_inputs(self) -> Inputs {
        site_inputs(
            Inputs::new().optional_string("name", self.name),
            self.kind,
            self.resource_group_name,
            self.server_farm_id,
            &self.site_config,
            self.identity,
        )
    }
}

#[derive(Debug, Clone)]
pub struct WebApp {
    pub resource: ResourceId,
    pub name: Output<String>,
    pub id: Output<String>,
    pub default_host_name: Output<String>,
    /// Object id of the system-assigned identity; empty without one
    pub principal_id: Output<String>,
}

impl WebApp {
    pub fn new(
        stack: &mut Stack,
        name: impl Into<String>,
        args: WebAppArgs,
    ) -> Result<Self, ConfigurationError> {
        let node = stack.declare(name, args)?;
        Ok(Self {
            resource: node.id(),
            name: node.string_output("name"),
            id: node.string_output("id"),
            default_host_name: node.string_output("defaultHostName"),
            principal_id: node.string_output("principalId"),
        })
    }
}

#[derive(Debug, Clone)]
pub struct WebAppSlotArgs {
    /// Name of the app the slot belongs to
    pub name: Input<String>,
    pub slot: String,
    pub kind: String,
    pub resource_group_name: Input<String>,
    pub server_farm_id: Input<String>,
    pub site_config: SiteConfig,
    pub identity: Option<ManagedServiceIdentity>,
}

impl ResourceArgs for WebAppSlotArgs {
    const KIND: ResourceKind = ResourceKind::WebAppSlot;
    const OUTPUTS: &'static [(&'static str, bool)] =
        &[("name", false), ("id", false), ("principalId", false)];

    fn into_inputs(self) -> Inputs {
        site_inputs(
            Inputs::new()
                .string("name", self.name)
                .literal("slot", json!(self.slot)),
            self.kind,
            self.resource_group_name,
            self.server_farm_id,
            &self.site_config,
            self.identity,
        )
    }
}

#[derive(Debug, Clone)]
pub struct WebAppSlot {
    pub resource: ResourceId,
    pub name: Output<String>,
    pub id: Output<String>,
    pub principal_id: Output<String>,
}

impl WebAppSlot {
    pub fn new(
        stack: &mut Stack,
        name: impl Into<String>,
        args: WebAppSlotArgs,
    ) -> Result<Self, ConfigurationError> {
        let node = stack.declare(name, args)?;
        Ok(Self {
            resource: node.id(),
            name: node.string_output("name"),
            id: node.string_output("id"),
            principal_id: node.string_output("principalId"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_site_config_inherits_secret_setting() {
        let key = Output::secret("k1".to_string());
        let config = SiteConfig::new()
            .setting("FUNCTIONS_WORKER_RUNTIME", "dotnet")
            .setting("AzureWebJobsStorage", &key);
        assert!(config.is_secret());

        let value = config.to_output().peek().unwrap().unwrap();
        assert!(value.is_secret());
        assert_eq!(
            value.expose(),
            json!({ "appSettings": [
                { "name": "FUNCTIONS_WORKER_RUNTIME", "value": "dotnet" },
                { "name": "AzureWebJobsStorage", "value": "k1" },
            ]})
        );
    }

    #[test]
    fn test_plain_site_config_is_not_secret() {
        let config = SiteConfig::new().setting("FUNCTIONS_EXTENSION_VERSION", "~4");
        assert!(!config.is_secret());
        assert!(!config.to_output().is_secret());
    }

    #[test]
    fn test_empty_site_config_resolves() {
        let value = SiteConfig::new().to_output().peek().unwrap().unwrap();
        assert_eq!(value.expose(), json!({ "appSettings": [] }));
    }
}
