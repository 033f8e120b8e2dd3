//! Resource groups

use super::{Inputs, ResourceArgs};
use crate::error::ConfigurationError;
use crate::output::{Input, Output};
use crate::resource::{ResourceId, ResourceKind};
use crate::stack::Stack;

#[derive(Debug, Clone, Default)]
pub struct ResourceGroupArgs {
    /// Physical name; generated from the logical name when absent
    pub resource_group_name: Option<Input<String>>,
    pub location: Option<Input<String>>,
}

impl ResourceArgs for ResourceGroupArgs {
    const KIND: ResourceKind = ResourceKind::ResourceGroup;
    const OUTPUTS: &'static [(&'static str, bool)] =
        &[("name", false), ("location", false), ("id", false)];

    fn into_inputs(self) -> Inputs {
        Inputs::new()
            .optional_string("resourceGroupName", self.resource_group_name)
            .optional_string("location", self.location)
    }
}

#[derive(Debug, Clone)]
pub struct ResourceGroup {
    pub resource: ResourceId,
    pub name: Output<String>,
    pub location: Output<String>,
    pub id: Output<String>,
}

impl ResourceGroup {
    pub fn new(
        stack: &mut Stack,
        name: impl Into<String>,
        args: ResourceGroupArgs,
    ) -> Result<Self, ConfigurationError> {
        let node = stack.declare(name, args)?;
        Ok(Self {
            resource: node.id(),
            name: node.string_output("name"),
            location: node.string_output("location"),
            id: node.string_output("id"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::DeploymentContext;

    #[test]
    fn test_group_declares_outputs() {
        let mut stack = Stack::new(DeploymentContext::new("p", "dev", "t"));
        let group = ResourceGroup::new(&mut stack, "p-dev", ResourceGroupArgs::default()).unwrap();

        let node = &stack.nodes()[0];
        assert_eq!(node.kind(), ResourceKind::ResourceGroup);
        assert_eq!(node.outputs().len(), 3);
        assert!(node.inputs().is_empty());
        assert_eq!(
            group.name.dependencies().iter().copied().collect::<Vec<_>>(),
            vec![group.resource]
        );
    }

    #[test]
    fn test_duplicate_group_is_rejected() {
        let mut stack = Stack::new(DeploymentContext::new("p", "dev", "t"));
        ResourceGroup::new(&mut stack, "rg", ResourceGroupArgs::default()).unwrap();
        assert!(matches!(
            ResourceGroup::new(&mut stack, "rg", ResourceGroupArgs::default()),
            Err(ConfigurationError::DuplicateResource(_))
        ));
    }
}
