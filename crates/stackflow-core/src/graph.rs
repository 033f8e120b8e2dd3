//! Dependency graph between resource nodes
//!
//! Edges are read from the dependency sets of each node's input outputs. The
//! graph is built once, checked for cycles, and shared read-only while the
//! engine walks it.

use crate::error::ConfigurationError;
use crate::resource::{ResourceId, ResourceNode};
use std::collections::{BTreeSet, HashMap};

#[derive(Debug, Clone)]
pub struct DependencyGraph {
    names: Vec<String>,
    dependencies: Vec<Vec<usize>>,
    dependents: Vec<Vec<usize>>,
    order: Vec<usize>,
}

impl DependencyGraph {
    /// Build the graph for `nodes`, indexed by declaration position.
    ///
    /// Fails on duplicate identities, on dependencies outside `nodes`, and on
    /// cycles.
    pub fn build(nodes: &[ResourceNode]) -> Result<Self, ConfigurationError> {
        let mut index: HashMap<ResourceId, usize> = HashMap::with_capacity(nodes.len());
        for (position, node) in nodes.iter().enumerate() {
            if index.insert(node.id(), position).is_some() {
                return Err(ConfigurationError::DuplicateResource(node.name().to_string()));
            }
        }

        let mut dependencies = Vec::with_capacity(nodes.len());
        let mut dependents = vec![Vec::new(); nodes.len()];
        for (position, node) in nodes.iter().enumerate() {
            let mut deps = Vec::new();
            for id in node.dependencies() {
                let Some(&dep) = index.get(&id) else {
                    return Err(ConfigurationError::UnknownDependency {
                        node: node.name().to_string(),
                        dependency: id,
                    });
                };
                deps.push(dep);
                dependents[dep].push(position);
            }
            deps.sort_unstable();
            dependencies.push(deps);
        }
        for list in &mut dependents {
            list.sort_unstable();
        }

        let mut graph = Self {
            names: nodes.iter().map(|n| n.name().to_string()).collect(),
            dependencies,
            dependents,
            order: Vec::new(),
        };
        graph.order = graph.topological_order()?;
        Ok(graph)
    }

    /// Kahn's algorithm, lowest declaration index first among ready nodes
    fn topological_order(&self) -> Result<Vec<usize>, ConfigurationError> {
        let mut pending: Vec<usize> = self.dependencies.iter().map(Vec::len).collect();
        let mut ready: BTreeSet<usize> = (0..self.len()).filter(|&i| pending[i] == 0).collect();
        let mut order = Vec::with_capacity(self.len());

        while let Some(next) = ready.pop_first() {
            order.push(next);
            for &dependent in &self.dependents[next] {
                pending[dependent] -= 1;
                if pending[dependent] == 0 {
                    ready.insert(dependent);
                }
            }
        }

        if order.len() < self.len() {
            let stuck: BTreeSet<usize> = (0..self.len()).filter(|&i| pending[i] > 0).collect();
            return Err(ConfigurationError::CyclicDependency(self.find_cycle(&stuck)));
        }
        Ok(order)
    }

    /// Names along one cycle among `stuck`, first name repeated at the end
    fn find_cycle(&self, stuck: &BTreeSet<usize>) -> Vec<String> {
        // Every stuck node has a stuck dependency, so walking dependencies
        // from any of them must revisit a node.
        let Some(&start) = stuck.iter().next() else {
            return Vec::new();
        };
        let mut path = vec![start];
        let mut seen: HashMap<usize, usize> = HashMap::from([(start, 0)]);
        let mut current = start;
        loop {
            let Some(&next) = self.dependencies[current]
                .iter()
                .find(|d| stuck.contains(d))
            else {
                return path.iter().map(|&i| self.names[i].clone()).collect();
            };
            if let Some(&at) = seen.get(&next) {
                // path[k] depends on path[k + 1]; reverse to read producer first
                let mut cycle: Vec<String> =
                    path[at..].iter().rev().map(|&i| self.names[i].clone()).collect();
                cycle.push(cycle[0].clone());
                return cycle;
            }
            seen.insert(next, path.len());
            path.push(next);
            current = next;
        }
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Realization order as declaration indices
    pub fn order(&self) -> &[usize] {
        &self.order
    }

    pub fn name(&self, index: usize) -> &str {
        &self.names[index]
    }

    pub fn dependencies(&self, index: usize) -> &[usize] {
        &self.dependencies[index]
    }

    pub fn dependents(&self, index: usize) -> &[usize] {
        &self.dependents[index]
    }

    /// Every node that reads, directly or not, from `index`
    pub fn transitive_dependents(&self, index: usize) -> BTreeSet<usize> {
        let mut found = BTreeSet::new();
        let mut stack = vec![index];
        while let Some(current) = stack.pop() {
            for &dependent in &self.dependents[current] {
                if found.insert(dependent) {
                    stack.push(dependent);
                }
            }
        }
        found
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::Output;
    use crate::resource::ResourceKind;
    use serde_json::Value;

    fn node(id: u32, name: &str) -> ResourceNode {
        ResourceNode::new(ResourceId::new(id), name, ResourceKind::ResourceGroup)
            .with_output("out", false)
    }

    fn out(node: &ResourceNode) -> Output<Value> {
        node.output("out").unwrap().clone()
    }

    #[test]
    fn test_order_respects_edges_and_declaration() {
        let a = node(0, "a");
        let b = node(1, "b");
        let c = node(2, "c").with_input("x", out(&b)).with_input("y", out(&a));
        let d = node(3, "d");
        let e = node(4, "e").with_input("x", out(&c));

        let graph = DependencyGraph::build(&[a, b, c, d, e]).unwrap();
        assert_eq!(graph.order(), &[0, 1, 2, 3, 4]);
        assert_eq!(graph.dependencies(2), &[0, 1]);
        assert_eq!(graph.dependents(0), &[2]);
        assert_eq!(
            graph.transitive_dependents(1).into_iter().collect::<Vec<_>>(),
            vec![2, 4]
        );
    }

    #[test]
    fn test_later_declaration_can_be_realized_first() {
        let late = node(1, "late");
        let early = node(0, "early").with_input("x", out(&late));

        let graph = DependencyGraph::build(&[early, late]).unwrap();
        assert_eq!(graph.order(), &[1, 0]);
    }

    #[test]
    fn test_cycle_is_rejected_with_names() {
        let a = node(0, "a");
        let b = node(1, "b").with_input("x", out(&a));
        let c = node(2, "c").with_input("x", out(&b));
        let a = a.with_input("x", out(&c));

        let err = DependencyGraph::build(&[a, b, c]).unwrap_err();
        let ConfigurationError::CyclicDependency(cycle) = err else {
            panic!("expected cycle error");
        };
        assert_eq!(cycle.first(), cycle.last());
        assert_eq!(cycle.len(), 4);
        for name in ["a", "b", "c"] {
            assert!(cycle.contains(&name.to_string()));
        }
    }

    #[test]
    fn test_self_reference_is_a_cycle() {
        let a = node(0, "a");
        let a = {
            let own = out(&a);
            a.with_input("x", own)
        };
        let err = DependencyGraph::build(&[a]).unwrap_err();
        assert_eq!(
            err,
            ConfigurationError::CyclicDependency(vec!["a".to_string(), "a".to_string()])
        );
    }

    #[test]
    fn test_unknown_dependency_is_rejected() {
        let outside = node(9, "outside");
        let a = node(0, "a").with_input("x", out(&outside));
        assert!(matches!(
            DependencyGraph::build(&[a]),
            Err(ConfigurationError::UnknownDependency { .. })
        ));
    }

    #[test]
    fn test_duplicate_identity_is_rejected() {
        assert!(matches!(
            DependencyGraph::build(&[node(0, "a"), node(0, "b")]),
            Err(ConfigurationError::DuplicateResource(_))
        ));
    }
}
