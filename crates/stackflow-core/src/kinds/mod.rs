//! Typed resource kinds
//!
//! Each kind has an args struct with a fixed set of fields and a handle that
//! exposes its outputs as typed [`Output`]s. Args are lowered into the generic
//! property map of a [`ResourceNode`](crate::resource::ResourceNode) when the
//! resource is declared.

pub mod insights;
pub mod keyvault;
pub mod resources;
pub mod storage;
pub mod web;

use crate::output::{Input, Output};
use crate::resource::ResourceKind;
use serde_json::Value;
use std::collections::BTreeMap;

pub use insights::{ApplicationType, Component, ComponentArgs};
pub use keyvault::{Vault, VaultArgs, VaultProperties, VaultSku, VaultSkuName};
pub use resources::{ResourceGroup, ResourceGroupArgs};
pub use storage::{
    Blob, BlobArgs, BlobContainer, BlobContainerArgs, BlobType, PublicAccess, StorageAccount,
    StorageAccountArgs, StorageKind, StorageSku,
};
pub use web::{
    AppServicePlan, AppServicePlanArgs, IdentityType, ManagedServiceIdentity, NameValuePair,
    SiteConfig, SkuDescription, WebApp, WebAppArgs, WebAppSlot, WebAppSlotArgs,
};

/// Arguments of one resource kind
pub trait ResourceArgs {
    const KIND: ResourceKind;

    /// Output names the provider returns, with their secret flag
    const OUTPUTS: &'static [(&'static str, bool)];

    fn into_inputs(self) -> Inputs;
}

/// Builder for the property map of a node
#[derive(Debug, Default)]
pub struct Inputs(BTreeMap<String, Output<Value>>);

impl Inputs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn string(mut self, key: &str, input: Input<String>) -> Self {
        self.0.insert(key.to_string(), string_value(input));
        self
    }

    pub fn optional_string(self, key: &str, input: Option<Input<String>>) -> Self {
        match input {
            Some(input) => self.string(key, input),
            None => self,
        }
    }

    pub fn literal(mut self, key: &str, value: Value) -> Self {
        self.0.insert(key.to_string(), Output::resolved(value));
        self
    }

    pub fn value(mut self, key: &str, value: Output<Value>) -> Self {
        self.0.insert(key.to_string(), value);
        self
    }

    pub fn into_map(self) -> BTreeMap<String, Output<Value>> {
        self.0
    }
}

pub(crate) fn string_value(input: Input<String>) -> Output<Value> {
    input.into_output().map(|s| Value::String(s.clone()))
}
