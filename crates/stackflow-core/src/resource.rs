//! Resource nodes
//!
//! A [`ResourceNode`] is one unit of desired state. Its inputs are fixed when
//! it is declared; its outputs are pending [`Output`]s that the provisioning
//! engine settles once the node has been realized.

use crate::error::{ConfigurationError, OutputError};
use crate::output::Output;
use crate::secret::{REDACTED, Revealed, Secret};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Stable identity of a node within one stack
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ResourceId(u32);

impl ResourceId {
    pub fn new(id: u32) -> Self {
        Self(id)
    }

    pub fn get(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "resource #{}", self.0)
    }
}

/// Kind of a resource node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResourceKind {
    ResourceGroup,
    StorageAccount,
    BlobContainer,
    Blob,
    Component,
    AppServicePlan,
    WebApp,
    WebAppSlot,
    Vault,
}

impl ResourceKind {
    /// Type token used in logs and state files
    pub fn type_token(&self) -> &'static str {
        match self {
            ResourceKind::ResourceGroup => "resources:ResourceGroup",
            ResourceKind::StorageAccount => "storage:StorageAccount",
            ResourceKind::BlobContainer => "storage:BlobContainer",
            ResourceKind::Blob => "storage:Blob",
            ResourceKind::Component => "insights:Component",
            ResourceKind::AppServicePlan => "web:AppServicePlan",
            ResourceKind::WebApp => "web:WebApp",
            ResourceKind::WebAppSlot => "web:WebAppSlot",
            ResourceKind::Vault => "keyvault:Vault",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.type_token())
    }
}

/// A fully resolved property, secret values wrapped
#[derive(Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum PropertyValue {
    Plain(Value),
    Secret(Secret<Value>),
}

impl PropertyValue {
    pub fn new(value: Value, secret: bool) -> Self {
        if secret {
            PropertyValue::Secret(Secret::new(value))
        } else {
            PropertyValue::Plain(value)
        }
    }

    pub fn is_secret(&self) -> bool {
        matches!(self, PropertyValue::Secret(_))
    }

    /// The underlying value, secret or not.
    ///
    /// Only providers and sinks that know how to treat secrets should call this.
    pub fn expose(&self) -> &Value {
        match self {
            PropertyValue::Plain(value) => value,
            PropertyValue::Secret(secret) => secret.expose_secret(),
        }
    }

    /// Value safe for logs and state files
    pub fn redacted(&self) -> Value {
        match self {
            PropertyValue::Plain(value) => value.clone(),
            PropertyValue::Secret(_) => Value::String(REDACTED.to_string()),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        self.expose().as_str()
    }
}

impl From<Revealed<Value>> for PropertyValue {
    fn from(revealed: Revealed<Value>) -> Self {
        let secret = revealed.is_secret();
        PropertyValue::new(revealed.expose(), secret)
    }
}

impl fmt::Debug for PropertyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropertyValue::Plain(value) => write!(f, "{:?}", value),
            PropertyValue::Secret(secret) => write!(f, "{:?}", secret),
        }
    }
}

impl fmt::Display for PropertyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropertyValue::Plain(Value::String(s)) => f.write_str(s),
            PropertyValue::Plain(value) => write!(f, "{}", value),
            PropertyValue::Secret(_) => f.write_str(REDACTED),
        }
    }
}

/// Resolved properties keyed by name
pub type PropertyMap = BTreeMap<String, PropertyValue>;

/// Render a JSON value as the string form used by typed outputs
pub fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// A declared unit of desired state
#[derive(Debug)]
pub struct ResourceNode {
    id: ResourceId,
    name: String,
    kind: ResourceKind,
    inputs: BTreeMap<String, Output<Value>>,
    outputs: BTreeMap<String, Output<Value>>,
}

impl ResourceNode {
    pub fn new(id: ResourceId, name: impl Into<String>, kind: ResourceKind) -> Self {
        Self {
            id,
            name: name.into(),
            kind,
            inputs: BTreeMap::new(),
            outputs: BTreeMap::new(),
        }
    }

    pub fn with_input(mut self, name: impl Into<String>, input: Output<Value>) -> Self {
        self.inputs.insert(name.into(), input);
        self
    }

    pub fn with_inputs(mut self, inputs: BTreeMap<String, Output<Value>>) -> Self {
        self.inputs.extend(inputs);
        self
    }

    /// Declare an output the provider is expected to return
    pub fn with_output(mut self, name: impl Into<String>, secret: bool) -> Self {
        self.outputs
            .insert(name.into(), Output::for_resource(self.id, secret));
        self
    }

    pub fn id(&self) -> ResourceId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> ResourceKind {
        self.kind
    }

    pub fn inputs(&self) -> &BTreeMap<String, Output<Value>> {
        &self.inputs
    }

    pub fn outputs(&self) -> &BTreeMap<String, Output<Value>> {
        &self.outputs
    }

    pub fn output(&self, name: &str) -> Option<&Output<Value>> {
        self.outputs.get(name)
    }

    /// Typed view of an output.
    ///
    /// An undeclared name yields an output that is already rejected.
    pub fn string_output(&self, name: &str) -> Output<String> {
        match self.outputs.get(name) {
            Some(output) => output.map(value_to_string),
            None => Output::rejected(ConfigurationError::UnknownOutput {
                resource: self.name.clone(),
                output: name.to_string(),
            }),
        }
    }

    /// Resources this node reads outputs from
    pub fn dependencies(&self) -> BTreeSet<ResourceId> {
        self.inputs
            .values()
            .flat_map(|input| input.dependencies().iter().copied())
            .collect()
    }

    /// Wait for every input and collect the resolved values.
    ///
    /// Fails with the name of the first input that was rejected.
    pub async fn resolve_inputs(&self) -> Result<PropertyMap, (String, OutputError)> {
        let mut resolved = PropertyMap::new();
        for (name, input) in &self.inputs {
            match input.wait().await {
                Ok(value) => {
                    resolved.insert(name.clone(), value.into());
                }
                Err(e) => return Err((name.clone(), e)),
            }
        }
        Ok(resolved)
    }

    /// Settle declared outputs from provider results.
    ///
    /// Returns the names of declared outputs the provider did not return;
    /// those outputs are rejected.
    pub fn populate_outputs(&self, values: &BTreeMap<String, Value>) -> Vec<String> {
        let mut missing = Vec::new();
        for (name, output) in &self.outputs {
            let outcome = match values.get(name) {
                Some(value) => output.resolve(value.clone()),
                None => {
                    missing.push(name.clone());
                    output.reject(OutputError::ResourceFailed {
                        resource: self.name.clone(),
                        reason: format!("provider did not return output '{}'", name),
                    })
                }
            };
            if outcome.is_err() {
                tracing::warn!(node = %self.name, output = %name, "output was already settled");
            }
        }
        missing
    }

    /// Reject every output that has not settled yet
    pub fn reject_outputs(&self, error: OutputError) {
        for output in self.outputs.values() {
            let _ = output.reject(error.clone());
        }
    }

    /// Snapshot of settled outputs with their taint
    pub fn output_values(&self) -> PropertyMap {
        self.outputs
            .iter()
            .filter_map(|(name, output)| match output.peek() {
                Some(Ok(value)) => Some((name.clone(), value.into())),
                _ => None,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_dependencies_come_from_inputs() {
        let group = ResourceNode::new(ResourceId::new(0), "rg", ResourceKind::ResourceGroup)
            .with_output("name", false);
        let storage = ResourceNode::new(ResourceId::new(1), "sa", ResourceKind::StorageAccount)
            .with_input("resourceGroupName", group.output("name").unwrap().clone())
            .with_input("kind", Output::resolved(json!("StorageV2")));

        assert!(group.dependencies().is_empty());
        assert_eq!(
            storage.dependencies().into_iter().collect::<Vec<_>>(),
            vec![ResourceId::new(0)]
        );
    }

    #[test]
    fn test_populate_outputs_rejects_missing() {
        let node = ResourceNode::new(ResourceId::new(0), "sa", ResourceKind::StorageAccount)
            .with_output("name", false)
            .with_output("primaryKey", true);
        let name = node.string_output("name");

        let missing = node.populate_outputs(&BTreeMap::from([(
            "name".to_string(),
            json!("contactlegdev"),
        )]));

        assert_eq!(missing, vec!["primaryKey".to_string()]);
        assert_eq!(name.peek().unwrap().unwrap().expose(), "contactlegdev");
        assert!(node.output("primaryKey").unwrap().peek().unwrap().is_err());
    }

    #[test]
    fn test_output_values_keep_taint() {
        let node = ResourceNode::new(ResourceId::new(0), "sa", ResourceKind::StorageAccount)
            .with_output("primaryKey", true);
        node.populate_outputs(&BTreeMap::from([("primaryKey".to_string(), json!("k1"))]));

        let values = node.output_values();
        let key = &values["primaryKey"];
        assert!(key.is_secret());
        assert_eq!(key.to_string(), REDACTED);
        assert_eq!(key.as_str(), Some("k1"));
    }

    #[test]
    fn test_unknown_output_is_rejected() {
        let node = ResourceNode::new(ResourceId::new(3), "vault", ResourceKind::Vault);
        assert!(matches!(
            node.string_output("vaultUri").peek(),
            Some(Err(OutputError::Configuration(
                ConfigurationError::UnknownOutput { .. }
            )))
        ));
    }

    #[tokio::test]
    async fn test_resolve_inputs_reports_rejected_input() {
        let node = ResourceNode::new(ResourceId::new(0), "vault", ResourceKind::Vault)
            .with_input("location", Output::resolved(json!("japaneast")))
            .with_input(
                "accessPolicies",
                Output::rejected(ConfigurationError::MissingIdentity("x".to_string())),
            );

        let (input, error) = node.resolve_inputs().await.unwrap_err();
        assert_eq!(input, "accessPolicies");
        assert!(matches!(error, OutputError::Configuration(_)));
    }
}
