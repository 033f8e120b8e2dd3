//! Run reports

use crate::error::NodeError;
use stackflow_core::{PropertyMap, PropertyValue, ResourceKind};
use std::fmt;

/// Terminal status of one node
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeStatus {
    /// Outputs populated
    Realized { attempts: u32 },
    Failed(NodeError),
    /// Not attempted because an upstream node failed
    Skipped { blocked_by: String },
    /// Never started because the run was cancelled
    Cancelled,
}

impl NodeStatus {
    pub fn is_realized(&self) -> bool {
        matches!(self, NodeStatus::Realized { .. })
    }

    pub fn label(&self) -> &'static str {
        match self {
            NodeStatus::Realized { .. } => "realized",
            NodeStatus::Failed(_) => "failed",
            NodeStatus::Skipped { .. } => "skipped",
            NodeStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for NodeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeStatus::Realized { attempts: 1 } => write!(f, "realized"),
            NodeStatus::Realized { attempts } => write!(f, "realized after {} attempts", attempts),
            NodeStatus::Failed(e) => write!(f, "failed: {}", e),
            NodeStatus::Skipped { blocked_by } => write!(f, "skipped (blocked by {})", blocked_by),
            NodeStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Outcome of one node
#[derive(Debug, Clone)]
pub struct NodeReport {
    pub name: String,
    pub kind: ResourceKind,
    pub status: NodeStatus,
    /// Settled outputs, secret ones still wrapped
    pub outputs: PropertyMap,
}

/// Result of a provisioning run
#[derive(Debug, Clone, Default)]
pub struct RunReport {
    /// Every node, in declaration order
    pub nodes: Vec<NodeReport>,

    /// Exports that resolved
    pub exports: PropertyMap,

    /// Exports that were rejected, with the reason
    pub failed_exports: Vec<(String, String)>,

    /// Total execution time in milliseconds
    pub duration_ms: u64,
}

impl RunReport {
    pub fn is_success(&self) -> bool {
        self.nodes.iter().all(|n| n.status.is_realized()) && self.failed_exports.is_empty()
    }

    pub fn node(&self, name: &str) -> Option<&NodeReport> {
        self.nodes.iter().find(|n| n.name == name)
    }

    pub fn status(&self, name: &str) -> Option<&NodeStatus> {
        self.node(name).map(|n| &n.status)
    }

    pub fn export(&self, name: &str) -> Option<&PropertyValue> {
        self.exports.get(name)
    }

    pub fn summary(&self) -> RunSummary {
        let count = |label: &str| {
            self.nodes
                .iter()
                .filter(|n| n.status.label() == label)
                .count()
        };
        RunSummary {
            realized: count("realized"),
            failed: count("failed"),
            skipped: count("skipped"),
            cancelled: count("cancelled"),
        }
    }
}

/// Counts of terminal statuses
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    pub realized: usize,
    pub failed: usize,
    pub skipped: usize,
    pub cancelled: usize,
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} realized, {} failed, {} skipped, {} cancelled",
            self.realized, self.failed, self.skipped, self.cancelled
        )
    }
}
