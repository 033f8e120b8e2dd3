//! Access policy binding
//!
//! A principal id is usually only known once the resource that owns the
//! identity has been realized. [`bind`] attaches the deferred id to a vault's
//! access policies; the vault then depends on the identity's producer and is
//! realized after it.

use crate::error::ConfigurationError;
use crate::kinds::VaultArgs;
use crate::output::Output;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::collections::BTreeSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SecretPermission {
    Get,
    List,
    Set,
    Delete,
    Backup,
    Restore,
    Recover,
    Purge,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyPermission {
    Get,
    List,
    Create,
    Update,
    Import,
    Delete,
    Encrypt,
    Decrypt,
    Sign,
    Verify,
    WrapKey,
    UnwrapKey,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CertificatePermission {
    Get,
    List,
    Create,
    Update,
    Import,
    Delete,
}

/// Permissions granted to one principal, grouped by object class
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Permissions {
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub secrets: BTreeSet<SecretPermission>,
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub keys: BTreeSet<KeyPermission>,
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub certificates: BTreeSet<CertificatePermission>,
}

impl Permissions {
    pub fn secrets(permissions: impl IntoIterator<Item = SecretPermission>) -> Self {
        Self {
            secrets: permissions.into_iter().collect(),
            ..Self::default()
        }
    }

    pub fn with_keys(mut self, permissions: impl IntoIterator<Item = KeyPermission>) -> Self {
        self.keys.extend(permissions);
        self
    }

    pub fn with_certificates(
        mut self,
        permissions: impl IntoIterator<Item = CertificatePermission>,
    ) -> Self {
        self.certificates.extend(permissions);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.secrets.is_empty() && self.keys.is_empty() && self.certificates.is_empty()
    }
}

/// One access policy of a vault
#[derive(Debug, Clone)]
pub struct AccessPolicyEntry {
    pub tenant_id: String,
    /// Rejected with [`ConfigurationError::MissingIdentity`] if the principal
    /// resolves to an empty id
    pub object_id: Output<String>,
    pub permissions: Permissions,
}

impl AccessPolicyEntry {
    pub fn new(
        tenant_id: impl Into<String>,
        principal: &Output<String>,
        permissions: Permissions,
    ) -> Self {
        let object_id = principal.try_map(|id| {
            if id.trim().is_empty() {
                Err(missing_identity())
            } else {
                Ok(id.clone())
            }
        });
        Self {
            tenant_id: tenant_id.into(),
            object_id,
            permissions,
        }
    }

    pub fn to_output(&self) -> Output<Value> {
        let tenant_id = self.tenant_id.clone();
        let permissions = self.permissions.clone();
        self.object_id.map(move |object_id| {
            json!({
                "tenantId": tenant_id,
                "objectId": object_id,
                "permissions": permissions,
            })
        })
    }
}

fn missing_identity() -> ConfigurationError {
    ConfigurationError::MissingIdentity("access policy principal resolved to an empty id".into())
}

/// Grant `permissions` on `vault` to `principal`.
///
/// The policy uses the vault's tenant. A principal that has already resolved
/// to an empty id is refused here; one that resolves empty later rejects the
/// vault's properties, failing the vault when it is realized.
pub fn bind(
    vault: &mut VaultArgs,
    principal: &Output<String>,
    permissions: Permissions,
) -> Result<(), ConfigurationError> {
    if let Some(Ok(id)) = principal.peek() {
        if id.expose_ref().trim().is_empty() {
            return Err(missing_identity());
        }
    }
    let tenant_id = vault.properties.tenant_id.clone();
    vault
        .properties
        .access_policies
        .push(AccessPolicyEntry::new(tenant_id, principal, permissions));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::OutputError;
    use crate::kinds::VaultProperties;
    use crate::resource::ResourceId;

    fn vault_args() -> VaultArgs {
        VaultArgs {
            vault_name: None,
            location: None,
            resource_group_name: "rg".into(),
            properties: VaultProperties::new("tenant"),
        }
    }

    #[test]
    fn test_bind_adds_dependency_on_principal_producer() {
        let principal = Output::for_resource(ResourceId::new(4), false);
        let mut vault = vault_args();
        bind(&mut vault, &principal, Permissions::secrets([SecretPermission::Get])).unwrap();

        let properties = vault.properties.to_output();
        assert!(properties.dependencies().contains(&ResourceId::new(4)));
        assert_eq!(vault.properties.access_policies[0].tenant_id, "tenant");
    }

    #[test]
    fn test_bind_refuses_resolved_empty_principal() {
        let mut vault = vault_args();
        let err = bind(
            &mut vault,
            &Output::resolved(String::new()),
            Permissions::secrets([SecretPermission::Get]),
        )
        .unwrap_err();
        assert!(matches!(err, ConfigurationError::MissingIdentity(_)));
        assert!(vault.properties.access_policies.is_empty());
    }

    #[test]
    fn test_empty_principal_later_rejects_properties() {
        let principal = Output::pending();
        let mut vault = vault_args();
        bind(&mut vault, &principal, Permissions::secrets([SecretPermission::Get])).unwrap();
        let properties = vault.properties.to_output();

        principal.resolve(String::new()).unwrap();
        assert!(matches!(
            properties.peek(),
            Some(Err(OutputError::Configuration(
                ConfigurationError::MissingIdentity(_)
            )))
        ));
    }

    #[test]
    fn test_permissions_serialize_by_class() {
        let permissions = Permissions::secrets([SecretPermission::List, SecretPermission::Get])
            .with_keys([KeyPermission::WrapKey]);
        assert_eq!(
            serde_json::to_value(&permissions).unwrap(),
            json!({ "secrets": ["get", "list"], "keys": ["wrapkey"] })
        );
        assert!(!permissions.is_empty());
        assert!(Permissions::default().is_empty());
    }
}
