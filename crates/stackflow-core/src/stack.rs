//! Stack: the set of declared resources and exports of one deployment

use crate::context::DeploymentContext;
use crate::error::ConfigurationError;
use crate::kinds::ResourceArgs;
use crate::output::Output;
use crate::resource::{ResourceId, ResourceNode};
use serde_json::Value;

/// A named value published by the stack once it is realized
#[derive(Debug, Clone)]
pub struct Export {
    pub name: String,
    pub value: Output<Value>,
}

#[derive(Debug)]
pub struct Stack {
    context: DeploymentContext,
    nodes: Vec<ResourceNode>,
    exports: Vec<Export>,
    next_id: u32,
}

impl Stack {
    pub fn new(context: DeploymentContext) -> Self {
        Self {
            context,
            nodes: Vec::new(),
            exports: Vec::new(),
            next_id: 0,
        }
    }

    pub fn context(&self) -> &DeploymentContext {
        &self.context
    }

    /// Reserve the identity for a node declared by hand
    pub fn allocate_id(&mut self) -> ResourceId {
        let id = ResourceId::new(self.next_id);
        self.next_id += 1;
        id
    }

    /// Declare a typed resource and return its node
    pub fn declare<A: ResourceArgs>(
        &mut self,
        name: impl Into<String>,
        args: A,
    ) -> Result<&ResourceNode, ConfigurationError> {
        let id = self.allocate_id();
        let node = A::OUTPUTS.iter().fold(
            ResourceNode::new(id, name, A::KIND).with_inputs(args.into_inputs().into_map()),
            |node, (output, secret)| node.with_output(*output, *secret),
        );
        self.add_node(node)?;
        Ok(&self.nodes[self.nodes.len() - 1])
    }

    /// Add a node built by hand.
    ///
    /// Logical names are unique within a stack, whatever the kind.
    pub fn add_node(&mut self, node: ResourceNode) -> Result<(), ConfigurationError> {
        if self.nodes.iter().any(|n| n.name() == node.name()) {
            return Err(ConfigurationError::DuplicateResource(format!(
                "{} ({})",
                node.name(),
                node.kind()
            )));
        }
        self.next_id = self.next_id.max(node.id().get() + 1);
        self.nodes.push(node);
        Ok(())
    }

    /// Publish `value` under `name` after the run
    pub fn export(&mut self, name: impl Into<String>, value: &Output<String>) {
        self.exports.push(Export {
            name: name.into(),
            value: value.map(|s| Value::String(s.clone())),
        });
    }

    pub fn nodes(&self) -> &[ResourceNode] {
        &self.nodes
    }

    pub fn exports(&self) -> &[Export] {
        &self.exports
    }

    pub fn into_parts(self) -> (DeploymentContext, Vec<ResourceNode>, Vec<Export>) {
        (self.context, self.nodes, self.exports)
    }
}
