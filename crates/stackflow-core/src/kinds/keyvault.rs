//! Secrets vaults

use super::{Inputs, ResourceArgs};
use crate::access::AccessPolicyEntry;
use crate::error::ConfigurationError;
use crate::output::{Input, Output};
use crate::resource::{ResourceId, ResourceKind};
use crate::stack::Stack;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VaultSkuName {
    #[default]
    Standard,
    Premium,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VaultSku {
    pub family: String,
    pub name: VaultSkuName,
}

impl Default for VaultSku {
    fn default() -> Self {
        Self {
            family: "A".to_string(),
            name: VaultSkuName::Standard,
        }
    }
}

#[derive(Debug, Clone)]
pub struct VaultProperties {
    pub tenant_id: String,
    pub sku: VaultSku,
    pub access_policies: Vec<AccessPolicyEntry>,
    pub enabled_for_deployment: bool,
    pub enabled_for_disk_encryption: bool,
    pub enabled_for_template_deployment: bool,
}

impl VaultProperties {
    pub fn new(tenant_id: impl Into<String>) -> Self {
        Self {
            tenant_id: tenant_id.into(),
            sku: VaultSku::default(),
            access_policies: Vec::new(),
            enabled_for_deployment: false,
            enabled_for_disk_encryption: false,
            enabled_for_template_deployment: false,
        }
    }

    /// Property document, pending until every access policy principal resolves
    pub fn to_output(&self) -> Output<Value> {
        let fixed = json!({
            "tenantId": self.tenant_id,
            "sku": self.sku,
            "enabledForDeployment": self.enabled_for_deployment,
            "enabledForDiskEncryption": self.enabled_for_disk_encryption,
            "enabledForTemplateDeployment": self.enabled_for_template_deployment,
        });
        let policies = self.access_policies.iter().map(AccessPolicyEntry::to_output);
        Output::all(policies).map(move |policies| {
            let mut document = fixed.clone();
            document["accessPolicies"] = Value::Array(policies.clone());
            document
        })
    }
}

#[derive(Debug, Clone)]
pub struct VaultArgs {
    pub vault_name: Option<Input<String>>,
    pub location: Option<Input<String>>,
    pub resource_group_name: Input<String>,
    pub properties: VaultProperties,
}

impl ResourceArgs for VaultArgs {
    const KIND: ResourceKind = ResourceKind::Vault;
    const OUTPUTS: &'static [(&'static str, bool)] =
        &[("name", false), ("id", false), ("vaultUri", false)];

    fn into_inputs(self) -> Inputs {
        Inputs::new()
            .optional_string("vaultName", self.vault_name)
            .optional_string("location", self.location)
            .string("resourceGroupName", self.resource_group_name)
            .value("properties", self.properties.to_output())
    }
}

#[derive(Debug, Clone)]
pub struct Vault {
    pub resource: ResourceId,
    pub name: Output<String>,
    pub id: Output<String>,
    pub vault_uri: Output<String>,
}

impl Vault {
    pub fn new(
        stack: &mut Stack,
        name: impl Into<String>,
        args: VaultArgs,
    ) -> Result<Self, ConfigurationError> {
        let node = stack.declare(name, args)?;
        Ok(Self {
            resource: node.id(),
            name: node.string_output("name"),
            id: node.string_output("id"),
            vault_uri: node.string_output("vaultUri"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access::{Permissions, SecretPermission};

    #[test]
    fn test_properties_wait_for_principal() {
        let principal = Output::<String>::pending();
        let mut properties = VaultProperties::new("tenant");
        properties.access_policies.push(AccessPolicyEntry::new(
            "tenant",
            &principal,
            Permissions::secrets([SecretPermission::Get]),
        ));

        let document = properties.to_output();
        assert!(!document.is_settled());

        principal.resolve("obj-1".to_string()).unwrap();
        let document = document.peek().unwrap().unwrap().expose();
        assert_eq!(document["tenantId"], "tenant");
        assert_eq!(document["sku"], json!({ "family": "A", "name": "standard" }));
        assert_eq!(document["accessPolicies"][0]["objectId"], "obj-1");
        assert_eq!(
            document["accessPolicies"][0]["permissions"]["secrets"],
            json!(["get"])
        );
    }
}
