//! Storage accounts, blob containers and blobs

use super::{Inputs, ResourceArgs};
use crate::connection::build_connection_string;
use crate::error::ConfigurationError;
use crate::output::{Input, Output};
use crate::resource::{ResourceId, ResourceKind};
use crate::stack::Stack;
use serde::{Deserialize, Serialize};
use serde_json::json;

/// Replication SKU of a storage account
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum StorageSku {
    #[default]
    #[serde(rename = "Standard_LRS")]
    StandardLrs,
    #[serde(rename = "Standard_GRS")]
    StandardGrs,
    #[serde(rename = "Standard_RAGRS")]
    StandardRagrs,
    #[serde(rename = "Standard_ZRS")]
    StandardZrs,
    #[serde(rename = "Premium_LRS")]
    PremiumLrs,
}

impl StorageSku {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::StandardLrs => "Standard_LRS",
            Self::StandardGrs => "Standard_GRS",
            Self::StandardRagrs => "Standard_RAGRS",
            Self::StandardZrs => "Standard_ZRS",
            Self::PremiumLrs => "Premium_LRS",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum StorageKind {
    Storage,
    #[default]
    StorageV2,
    BlobStorage,
}

impl StorageKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Storage => "Storage",
            Self::StorageV2 => "StorageV2",
            Self::BlobStorage => "BlobStorage",
        }
    }
}

#[derive(Debug, Clone)]
pub struct StorageAccountArgs {
    pub resource_group_name: Input<String>,
    /// Physical name; generated from the logical name when absent
    pub account_name: Option<Input<String>>,
    pub location: Option<Input<String>>,
    pub sku: StorageSku,
    pub kind: StorageKind,
}

impl StorageAccountArgs {
    pub fn new(resource_group_name: impl Into<Input<String>>) -> Self {
        Self {
            resource_group_name: resource_group_name.into(),
            account_name: None,
            location: None,
            sku: StorageSku::default(),
            kind: StorageKind::default(),
        }
    }
}

impl ResourceArgs for StorageAccountArgs {
    const KIND: ResourceKind = ResourceKind::StorageAccount;
    const OUTPUTS: &'static [(&'static str, bool)] = &[
        ("name", false),
        ("id", false),
        ("primaryEndpoint", false),
        ("primaryKey", true),
    ];

    fn into_inputs(self) -> Inputs {
        Inputs::new()
            .string("resourceGroupName", self.resource_group_name)
            .optional_string("accountName", self.account_name)
            .optional_string("location", self.location)
            .literal("sku", json!({ "name": self.sku.as_str() }))
            .literal("kind", json!(self.kind.as_str()))
    }
}

#[derive(Debug, Clone)]
pub struct StorageAccount {
    pub resource: ResourceId,
    pub name: Output<String>,
    pub id: Output<String>,
    pub primary_endpoint: Output<String>,
    /// First access key of the account
    pub primary_key: Output<String>,
}

impl StorageAccount {
    pub fn new(
        stack: &mut Stack,
        name: impl Into<String>,
        args: StorageAccountArgs,
    ) -> Result<Self, ConfigurationError> {
        let node = stack.declare(name, args)?;
        Ok(Self {
            resource: node.id(),
            name: node.string_output("name"),
            id: node.string_output("id"),
            primary_endpoint: node.string_output("primaryEndpoint"),
            primary_key: node.string_output("primaryKey"),
        })
    }

    /// Connection string for the primary key
    pub fn connection_string(&self) -> Output<String> {
        build_connection_string(&self.name, &self.primary_key)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum PublicAccess {
    #[default]
    None,
    Blob,
    Container,
}

#[derive(Debug, Clone)]
pub struct BlobContainerArgs {
    pub account_name: Input<String>,
    pub resource_group_name: Input<String>,
    pub container_name: Option<Input<String>>,
    pub public_access: PublicAccess,
}

impl ResourceArgs for BlobContainerArgs {
    const KIND: ResourceKind = ResourceKind::BlobContainer;
    const OUTPUTS: &'static [(&'static str, bool)] = &[("name", false), ("id", false)];

    fn into_inputs(self) -> Inputs {
        Inputs::new()
            .string("accountName", self.account_name)
            .string("resourceGroupName", self.resource_group_name)
            .optional_string("containerName", self.container_name)
            .literal("publicAccess", json!(self.public_access))
    }
}

#[derive(Debug, Clone)]
pub struct BlobContainer {
    pub resource: ResourceId,
    pub name: Output<String>,
    pub id: Output<String>,
}

impl BlobContainer {
    pub fn new(
        stack: &mut Stack,
        name: impl Into<String>,
        args: BlobContainerArgs,
    ) -> Result<Self, ConfigurationError> {
        let node = stack.declare(name, args)?;
        Ok(Self {
            resource: node.id(),
            name: node.string_output("name"),
            id: node.string_output("id"),
        })
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum BlobType {
    #[default]
    Block,
    Append,
    Page,
}

#[derive(Debug, Clone)]
pub struct BlobArgs {
    pub account_name: Input<String>,
    pub container_name: Input<String>,
    pub resource_group_name: Input<String>,
    pub blob_name: Option<Input<String>>,
    pub blob_type: BlobType,
    /// Local file or archive uploaded as the blob content
    pub source: Option<String>,
    pub content_type: Option<String>,
}

impl ResourceArgs for BlobArgs {
    const KIND: ResourceKind = ResourceKind::Blob;
    const OUTPUTS: &'static [(&'static str, bool)] = &[("name", false), ("url", false)];

    fn into_inputs(self) -> Inputs {
        let mut inputs = Inputs::new()
            .string("accountName", self.account_name)
            .string("containerName", self.container_name)
            .string("resourceGroupName", self.resource_group_name)
            .optional_string("blobName", self.blob_name)
            .literal("type", json!(self.blob_type));
        if let Some(source) = self.source {
            inputs = inputs.literal("source", json!(source));
        }
        if let Some(content_type) = self.content_type {
            inputs = inputs.literal("contentType", json!(content_type));
        }
        inputs
    }
}

#[derive(Debug, Clone)]
pub struct Blob {
    pub resource: ResourceId,
    pub name: Output<String>,
    pub url: Output<String>,
}

impl Blob {
    pub fn new(
        stack: &mut Stack,
        name: impl Into<String>,
        args: BlobArgs,
    ) -> Result<Self, ConfigurationError> {
        let node = stack.declare(name, args)?;
        Ok(Self {
            resource: node.id(),
            name: node.string_output("name"),
            url: node.string_output("url"),
        })
    }
}
