//! Local provider implementation
//!
//! Resources are "created" by deriving their outputs from their inputs. The
//! same stack always yields the same names, ids and keys, so previews and
//! tests are reproducible.

use crate::error::{LocalProviderError, Result};
use crate::fault::Fault;
use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use serde_json::{Value, json};
use sha2::{Digest, Sha256};
use stackflow_cloud::{AuthStatus, CreateRequest, Provider, ProviderError};
use stackflow_core::ResourceKind;
use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;
use std::time::Duration;
use uuid::Uuid;

pub const DEFAULT_SUBSCRIPTION: &str = "00000000-0000-0000-0000-000000000000";

pub struct LocalProvider {
    subscription: String,
    location: String,
    latency: Option<Duration>,
    faults: Mutex<HashMap<String, Fault>>,
    calls: Mutex<Vec<String>>,
}

impl LocalProvider {
    pub fn new(subscription: impl Into<String>) -> Self {
        Self {
            subscription: subscription.into(),
            location: "westeurope".to_string(),
            latency: None,
            faults: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Location for resources that do not set one
    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = location.into();
        self
    }

    /// Simulated duration of every call
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    pub fn with_fault(self, fault: Fault) -> Self {
        self.inject(fault);
        self
    }

    pub fn inject(&self, fault: Fault) {
        tracing::debug!(resource = %fault.resource, kind = ?fault.kind, times = fault.times, "Injecting fault");
        self.faults
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(fault.resource.clone(), fault);
    }

    /// Logical names of every call received, in order
    pub fn calls(&self) -> Vec<String> {
        self.calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    fn take_fault(&self, resource: &str) -> Option<ProviderError> {
        let mut faults = self.faults.lock().unwrap_or_else(|e| e.into_inner());
        let fault = faults.get_mut(resource)?;
        if fault.times == 0 {
            return None;
        }
        fault.times -= 1;
        Some(fault.kind.to_error(resource))
    }

    fn resource_id(&self, group: &str, provider_type: &str, name: &str) -> String {
        format!(
            "/subscriptions/{}/resourceGroups/{}/providers/{}/{}",
            self.subscription, group, provider_type, name
        )
    }

    fn realize(&self, request: &CreateRequest) -> Result<BTreeMap<String, Value>> {
        let inputs = Inputs(request);
        let location = inputs
            .optional("location")
            .unwrap_or(&self.location)
            .to_string();

        let outputs = match request.kind {
            ResourceKind::ResourceGroup => {
                let name = inputs
                    .optional("resourceGroupName")
                    .map(str::to_string)
                    .unwrap_or_else(|| auto_name(&request.name, "-"));
                let id = format!("/subscriptions/{}/resourceGroups/{}", self.subscription, name);
                json!({ "name": name, "location": location, "id": id })
            }
            ResourceKind::StorageAccount => {
                let group = inputs.required("resourceGroupName")?;
                let name = inputs
                    .optional("accountName")
                    .map(str::to_string)
                    .unwrap_or_else(|| storage_name(&request.name));
                let id = self.resource_id(group, "Microsoft.Storage/storageAccounts", &name);
                json!({
                    "name": name,
                    "id": id,
                    "primaryEndpoint": format!("https://{}.blob.core.windows.net/", name),
                    "primaryKey": account_key(&id),
                })
            }
            ResourceKind::BlobContainer => {
                let group = inputs.required("resourceGroupName")?;
                let account = inputs.required("accountName")?;
                let name = inputs.optional("containerName").unwrap_or(&request.name);
                let id = self.resource_id(
                    group,
                    "Microsoft.Storage/storageAccounts",
                    &format!("{}/blobServices/default/containers/{}", account, name),
                );
                json!({ "name": name, "id": id })
            }
            ResourceKind::Blob => {
                inputs.required("resourceGroupName")?;
                let account = inputs.required("accountName")?;
                let container = inputs.required("containerName")?;
                let name = inputs.optional("blobName").unwrap_or(&request.name);
                json!({
                    "name": name,
                    "url": format!("https://{}.blob.core.windows.net/{}/{}", account, container, name),
                })
            }
            ResourceKind::Component => {
                let group = inputs.required("resourceGroupName")?;
                let name = auto_name(&request.name, "");
                let id = self.resource_id(group, "Microsoft.Insights/components", &name);
                let key = guid(&format!("instrumentation:{}", id));
                json!({ "name": name, "id": id, "instrumentationKey": key })
            }
            ResourceKind::AppServicePlan => {
                let group = inputs.required("resourceGroupName")?;
                let name = auto_name(&request.name, "");
                let id = self.resource_id(group, "Microsoft.Web/serverfarms", &name);
                json!({ "name": name, "id": id })
            }
            ResourceKind::WebApp => {
                let group = inputs.required("resourceGroupName")?;
                inputs.required("serverFarmId")?;
                let name = inputs
                    .optional("name")
                    .map(str::to_string)
                    .unwrap_or_else(|| auto_name(&request.name, ""));
                let id = self.resource_id(group, "Microsoft.Web/sites", &name);
                json!({
                    "name": name,
                    "id": id,
                    "defaultHostName": format!("{}.azurewebsites.net", name),
                    "principalId": inputs.principal(&id),
                })
            }
            ResourceKind::WebAppSlot => {
                let group = inputs.required("resourceGroupName")?;
                inputs.required("serverFarmId")?;
                let site = inputs.required("name")?;
                let slot = inputs.required("slot")?;
                let id = self.resource_id(
                    group,
                    "Microsoft.Web/sites",
                    &format!("{}/slots/{}", site, slot),
                );
                json!({
                    "name": format!("{}/{}", site, slot),
                    "id": id,
                    "principalId": inputs.principal(&id),
                })
            }
            ResourceKind::Vault => {
                let group = inputs.required("resourceGroupName")?;
                validate_access_policies(request)?;
                let name = inputs
                    .optional("vaultName")
                    .map(str::to_string)
                    .unwrap_or_else(|| auto_name(&request.name, ""));
                let id = self.resource_id(group, "Microsoft.KeyVault/vaults", &name);
                json!({
                    "name": name,
                    "id": id,
                    "vaultUri": format!("https://{}.vault.azure.net/", name),
                })
            }
        };

        let Value::Object(outputs) = outputs else {
            return Ok(BTreeMap::new());
        };
        Ok(outputs.into_iter().collect())
    }
}

impl Default for LocalProvider {
    fn default() -> Self {
        Self::new(DEFAULT_SUBSCRIPTION)
    }
}

#[async_trait]
impl Provider for LocalProvider {
    fn name(&self) -> &str {
        "local"
    }

    fn display_name(&self) -> &str {
        "Local (simulated)"
    }

    async fn check_auth(&self) -> stackflow_cloud::Result<AuthStatus> {
        if self.subscription.trim().is_empty() {
            return Ok(AuthStatus::failed("no subscription configured"));
        }
        Ok(AuthStatus::ok(format!("subscription {}", self.subscription)))
    }

    async fn create(
        &self,
        request: CreateRequest,
    ) -> std::result::Result<BTreeMap<String, Value>, ProviderError> {
        self.calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(request.name.clone());

        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        if let Some(error) = self.take_fault(&request.name) {
            tracing::debug!(resource = %request.name, error = %error, "Returning injected fault");
            return Err(error);
        }

        let outputs = self
            .realize(&request)
            .map_err(|e| ProviderError::Validation(e.to_string()))?;
        tracing::debug!(resource = %request.name, kind = %request.kind, "Created resource");
        Ok(outputs)
    }
}

/// Read access to the inputs of one request
struct Inputs<'a>(&'a CreateRequest);

impl<'a> Inputs<'a> {
    fn optional(&self, key: &str) -> Option<&'a str> {
        self.0.input_str(key).filter(|value| !value.is_empty())
    }

    fn required(&self, key: &str) -> Result<&'a str> {
        self.optional(key)
            .ok_or_else(|| LocalProviderError::MissingInput {
                resource: self.0.name.clone(),
                input: key.to_string(),
            })
    }

    /// Principal of a system-assigned identity, empty without one
    fn principal(&self, id: &str) -> String {
        let system_assigned = self
            .0
            .inputs
            .get("identity")
            .and_then(|identity| identity.expose().get("type"))
            .and_then(Value::as_str)
            == Some("SystemAssigned");
        if system_assigned {
            guid(&format!("principal:{}", id))
        } else {
            String::new()
        }
    }
}

fn validate_access_policies(request: &CreateRequest) -> Result<()> {
    let Some(properties) = request.inputs.get("properties") else {
        return Ok(());
    };
    let policies = properties
        .expose()
        .get("accessPolicies")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();
    for policy in policies {
        let object_id = policy.get("objectId").and_then(Value::as_str).unwrap_or("");
        if object_id.is_empty() {
            return Err(LocalProviderError::InvalidInput {
                resource: request.name.clone(),
                input: "properties.accessPolicies".to_string(),
                reason: "access policy without object id".to_string(),
            });
        }
    }
    Ok(())
}

fn digest(seed: &str) -> Vec<u8> {
    Sha256::digest(seed.as_bytes()).to_vec()
}

/// Logical name plus a stable eight character suffix
fn auto_name(logical: &str, separator: &str) -> String {
    let suffix = hex::encode(digest(logical));
    format!("{}{}{}", logical, separator, &suffix[..8])
}

/// Storage account names: lowercase alphanumerics, at most 24 characters
fn storage_name(logical: &str) -> String {
    let base: String = logical
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_lowercase())
        .take(16)
        .collect();
    let suffix = hex::encode(digest(logical));
    format!("{}{}", base, &suffix[..8])
}

/// 32 byte key, base64 encoded like real account keys
fn account_key(id: &str) -> String {
    STANDARD.encode(digest(&format!("key1:{}", id)))
}

/// Name-based UUID, stable for the same seed
fn guid(seed: &str) -> String {
    Uuid::new_v5(&Uuid::NAMESPACE_OID, seed.as_bytes()).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fault::FaultKind;
    use stackflow_core::{PropertyMap, PropertyValue};

    fn request(name: &str, kind: ResourceKind, inputs: &[(&str, Value)]) -> CreateRequest {
        CreateRequest {
            name: name.to_string(),
            kind,
            inputs: inputs
                .iter()
                .map(|(k, v)| (k.to_string(), PropertyValue::new(v.clone(), false)))
                .collect::<PropertyMap>(),
        }
    }

    #[tokio::test]
    async fn test_outputs_are_deterministic() {
        let provider = LocalProvider::default();
        let req = request(
            "contactlegdev",
            ResourceKind::StorageAccount,
            &[("resourceGroupName", json!("rg"))],
        );
        let first = provider.create(req.clone()).await.unwrap();
        let second = LocalProvider::default().create(req).await.unwrap();
        assert_eq!(first, second);

        let name = first["name"].as_str().unwrap();
        assert!(name.starts_with("contactlegdev"));
        assert!(name.len() <= 24);
        let key = STANDARD.decode(first["primaryKey"].as_str().unwrap()).unwrap();
        assert_eq!(key.len(), 32);
    }

    #[test]
    fn test_generated_ids_are_stable() {
        let id = guid("principal:app");
        assert_eq!(id, guid("principal:app"));
        assert_ne!(id, guid("principal:other"));
        assert_eq!(Uuid::parse_str(&id).unwrap().get_version_num(), 5);

        let name = auto_name("plan", "-");
        assert_eq!(name, auto_name("plan", "-"));
        let suffix = name.strip_prefix("plan-").unwrap();
        assert_eq!(suffix.len(), 8);
        assert!(suffix.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[tokio::test]
    async fn test_missing_input_is_a_validation_error() {
        let provider = LocalProvider::default();
        let err = provider
            .create(request("plan", ResourceKind::AppServicePlan, &[]))
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::Validation(_)));
        assert!(!err.is_transient());
    }

    #[tokio::test]
    async fn test_fault_fires_given_number_of_times() {
        let provider = LocalProvider::default()
            .with_fault(Fault::new("rg", FaultKind::RateLimited, 2));
        let req = request("rg", ResourceKind::ResourceGroup, &[]);

        for _ in 0..2 {
            assert!(matches!(
                provider.create(req.clone()).await,
                Err(ProviderError::RateLimited(_))
            ));
        }
        assert!(provider.create(req).await.is_ok());
        assert_eq!(provider.calls().len(), 3);
    }

    #[tokio::test]
    async fn test_principal_requires_system_identity() {
        let provider = LocalProvider::default();
        let base = [
            ("resourceGroupName", json!("rg")),
            ("serverFarmId", json!("/plans/y1")),
        ];
        let without = provider
            .create(request("app", ResourceKind::WebApp, &base))
            .await
            .unwrap();
        assert_eq!(without["principalId"], json!(""));

        let mut with_identity = base.to_vec();
        with_identity.push(("identity", json!({ "type": "SystemAssigned" })));
        let with = provider
            .create(request("app", ResourceKind::WebApp, &with_identity))
            .await
            .unwrap();
        assert_eq!(with["principalId"].as_str().unwrap().len(), 36);
    }

    #[tokio::test]
    async fn test_vault_refuses_policy_without_object_id() {
        let provider = LocalProvider::default();
        let err = provider
            .create(request(
                "vault",
                ResourceKind::Vault,
                &[
                    ("resourceGroupName", json!("rg")),
                    ("properties", json!({ "accessPolicies": [{ "objectId": "" }] })),
                ],
            ))
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::Validation(_)));
    }

    #[tokio::test]
    async fn test_empty_subscription_is_not_authenticated() {
        assert!(!LocalProvider::new("").check_auth().await.unwrap().authenticated);
        assert!(LocalProvider::default().check_auth().await.unwrap().authenticated);
    }
}
