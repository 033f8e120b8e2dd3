//! Application telemetry components

use super::{Inputs, ResourceArgs};
use crate::error::ConfigurationError;
use crate::output::{Input, Output};
use crate::resource::{ResourceId, ResourceKind};
use crate::stack::Stack;
use serde::{Deserialize, Serialize};
use serde_json::json;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApplicationType {
    #[default]
    Web,
    Other,
}

#[derive(Debug, Clone)]
pub struct ComponentArgs {
    pub resource_group_name: Input<String>,
    pub application_type: ApplicationType,
    pub kind: String,
    pub location: Option<Input<String>>,
}

impl ComponentArgs {
    pub fn web(resource_group_name: impl Into<Input<String>>) -> Self {
        Self {
            resource_group_name: resource_group_name.into(),
            application_type: ApplicationType::Web,
            kind: "web".to_string(),
            location: None,
        }
    }
}

impl ResourceArgs for ComponentArgs {
    const KIND: ResourceKind = ResourceKind::Component;
    const OUTPUTS: &'static [(&'static str, bool)] = &[
        ("name", false),
        ("id", false),
        ("instrumentationKey", false),
    ];

    fn into_inputs(self) -> Inputs {
        Inputs::new()
            .string("resourceGroupName", self.resource_group_name)
            .optional_string("location", self.location)
            .literal("applicationType", json!(self.application_type))
            .literal("kind", json!(self.kind))
    }
}

#[derive(Debug, Clone)]
pub struct Component {
    pub resource: ResourceId,
    pub name: Output<String>,
    pub id: Output<String>,
    pub instrumentation_key: Output<String>,
}

impl Component {
    pub fn new(
        stack: &mut Stack,
        name: impl Into<String>,
        args: ComponentArgs,
    ) -> Result<Self, ConfigurationError> {
        let node = stack.declare(name, args)?;
        Ok(Self {
            resource: node.id(),
            name: node.string_output("name"),
            id: node.string_output("id"),
            instrumentation_key: node.string_output("instrumentationKey"),
        })
    }
}
