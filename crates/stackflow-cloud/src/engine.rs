//! Provisioning engine
//!
//! Walks the dependency graph and realizes nodes through a [`Provider`].
//! Independent branches run concurrently up to a limit. A failed node rejects
//! its outputs and skips everything downstream of it while unrelated branches
//! keep going.

use crate::error::{CloudError, NodeError, ProviderError, Result};
use crate::provider::{CreateRequest, Provider, RetryConfig};
use crate::report::{NodeReport, NodeStatus, RunReport};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use stackflow_core::{
    DependencyGraph, Export, OutputError, PropertyValue, ResourceNode, SecretSink, Stack,
    TracingSink,
};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::{JoinError, JoinSet};
use tokio_util::sync::CancellationToken;

/// Engine settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Maximum number of nodes being realized at once
    pub concurrency: usize,

    pub retry: RetryConfig,

    /// Limit for a single provider call, in milliseconds
    pub call_timeout_ms: Option<u64>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            concurrency: 4,
            retry: RetryConfig::default(),
            call_timeout_ms: None,
        }
    }
}

impl EngineConfig {
    pub fn call_timeout(&self) -> Option<Duration> {
        self.call_timeout_ms.map(Duration::from_millis)
    }
}

pub struct ProvisioningEngine {
    provider: Arc<dyn Provider>,
    sink: Arc<dyn SecretSink>,
    config: EngineConfig,
    cancel: CancellationToken,
}

impl ProvisioningEngine {
    pub fn new(provider: Arc<dyn Provider>) -> Self {
        Self {
            provider,
            sink: Arc::new(TracingSink),
            config: EngineConfig::default(),
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_sink(mut self, sink: Arc<dyn SecretSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Token that stops new provisioning calls when cancelled
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Realize a stack and publish its exports through the sink
    pub async fn run_stack(&self, stack: Stack) -> Result<RunReport> {
        let (context, nodes, exports) = stack.into_parts();
        tracing::info!(
            project = %context.project,
            stack = %context.stack,
            provider = %self.provider.name(),
            nodes = nodes.len(),
            "Starting run"
        );
        let mut report = self.run(nodes).await?;
        self.collect_exports(&exports, &mut report);
        Ok(report)
    }

    /// Realize `nodes` in dependency order.
    ///
    /// Configuration errors in the graph and a failed auth check are returned
    /// before any provisioning call. Per-node failures end up in the report.
    pub async fn run(&self, nodes: Vec<ResourceNode>) -> Result<RunReport> {
        let started = Instant::now();
        let graph = Arc::new(DependencyGraph::build(&nodes)?);
        if graph.is_empty() {
            tracing::warn!("Stack declares no resources");
        }

        let auth = self.provider.check_auth().await?;
        if !auth.authenticated {
            return Err(CloudError::AuthenticationFailed(auth.error.unwrap_or_else(
                || format!("{} is not authenticated", self.provider.display_name()),
            )));
        }
        tracing::debug!(
            provider = %self.provider.name(),
            account = auth.account_info.as_deref().unwrap_or("-"),
            "Provider authenticated"
        );

        let walk = Arc::new(Walk {
            nodes,
            provider: Arc::clone(&self.provider),
            sink: Arc::clone(&self.sink),
            retry: self.config.retry.clone(),
            call_timeout: self.config.call_timeout(),
            cancel: self.cancel.clone(),
        });

        let mut statuses: Vec<Option<NodeStatus>> = vec![None; graph.len()];
        let mut pending: Vec<usize> = (0..graph.len())
            .map(|i| graph.dependencies(i).len())
            .collect();
        let mut ready: BTreeSet<usize> = (0..graph.len()).filter(|&i| pending[i] == 0).collect();
        let mut running = JoinSet::new();
        let mut tasks = HashMap::new();
        let limit = self.config.concurrency.max(1);

        loop {
            while running.len() < limit && !self.cancel.is_cancelled() {
                let Some(index) = ready.pop_first() else {
                    break;
                };
                let walk = Arc::clone(&walk);
                let handle = running.spawn(async move { walk.realize(index).await });
                tasks.insert(handle.id(), index);
            }

            let Some(joined) = running.join_next_with_id().await else {
                break;
            };
            let (id, outcome) = match joined {
                Ok((id, status)) => (id, Ok(status)),
                Err(e) => (e.id(), Err(e)),
            };
            let Some(index) = tasks.remove(&id) else {
                continue;
            };
            let status = outcome.unwrap_or_else(|e| walk.crashed(index, e));

            match &status {
                NodeStatus::Realized { .. } => {
                    for &dependent in graph.dependents(index) {
                        pending[dependent] -= 1;
                        if pending[dependent] == 0 && statuses[dependent].is_none() {
                            ready.insert(dependent);
                        }
                    }
                }
                NodeStatus::Failed(_) => {
                    let root = graph.name(index).to_string();
                    for dependent in graph.transitive_dependents(index) {
                        if statuses[dependent].is_some() {
                            continue;
                        }
                        let name = graph.name(dependent);
                        tracing::warn!(node = %name, blocked_by = %root, "Skipping resource");
                        walk.nodes[dependent].reject_outputs(OutputError::Abandoned {
                            resource: name.to_string(),
                        });
                        statuses[dependent] = Some(NodeStatus::Skipped {
                            blocked_by: root.clone(),
                        });
                    }
                }
                NodeStatus::Skipped { .. } | NodeStatus::Cancelled => {}
            }
            statuses[index] = Some(status);
        }

        if !self.cancel.is_cancelled() && statuses.iter().any(Option::is_none) {
            tracing::warn!("Run ended with nodes that were never started");
        }

        let mut report = RunReport::default();
        for (index, status) in statuses.into_iter().enumerate() {
            let node = &walk.nodes[index];
            let status = status.unwrap_or_else(|| {
                node.reject_outputs(OutputError::Abandoned {
                    resource: node.name().to_string(),
                });
                NodeStatus::Cancelled
            });
            report.nodes.push(NodeReport {
                name: node.name().to_string(),
                kind: node.kind(),
                status,
                outputs: node.output_values(),
            });
        }
        report.duration_ms = started.elapsed().as_millis() as u64;

        tracing::info!(summary = %report.summary(), duration_ms = report.duration_ms, "Run finished");
        Ok(report)
    }

    fn collect_exports(&self, exports: &[Export], report: &mut RunReport) {
        for export in exports {
            match export.value.peek() {
                Some(Ok(value)) => {
                    let value = PropertyValue::from(value);
                    self.sink.write(&export.name, &value);
                    report.exports.insert(export.name.clone(), value);
                }
                Some(Err(e)) => {
                    tracing::warn!(export = %export.name, error = %e, "Export was rejected");
                    report
                        .failed_exports
                        .push((export.name.clone(), e.to_string()));
                }
                None => {
                    tracing::warn!(export = %export.name, "Export never settled");
                    report
                        .failed_exports
                        .push((export.name.clone(), "value never settled".to_string()));
                }
            }
        }
    }
}

/// State shared by the node tasks of one run
struct Walk {
    nodes: Vec<ResourceNode>,
    provider: Arc<dyn Provider>,
    sink: Arc<dyn SecretSink>,
    retry: RetryConfig,
    call_timeout: Option<Duration>,
    cancel: CancellationToken,
}

impl Walk {
    async fn realize(&self, index: usize) -> NodeStatus {
        let node = &self.nodes[index];
        tracing::info!(node = %node.name(), kind = %node.kind(), "Realizing resource");

        let status = self.provision(node).await;
        match &status {
            NodeStatus::Realized { attempts } => {
                tracing::info!(node = %node.name(), attempts, "Resource realized");
            }
            NodeStatus::Failed(e) => {
                tracing::error!(node = %node.name(), error = %e, "Resource failed");
                node.reject_outputs(OutputError::ResourceFailed {
                    resource: node.name().to_string(),
                    reason: e.to_string(),
                });
            }
            NodeStatus::Cancelled => {
                tracing::info!(node = %node.name(), "Resource cancelled");
                node.reject_outputs(OutputError::Abandoned {
                    resource: node.name().to_string(),
                });
            }
            NodeStatus::Skipped { .. } => {}
        }
        status
    }

    /// Status for a node whose task panicked outside the provider call
    fn crashed(&self, index: usize, error: JoinError) -> NodeStatus {
        let node = &self.nodes[index];
        tracing::error!(node = %node.name(), error = %error, "Node task ended abnormally");
        node.reject_outputs(OutputError::ResourceFailed {
            resource: node.name().to_string(),
            reason: error.to_string(),
        });
        NodeStatus::Failed(NodeError::Panicked(error.to_string()))
    }

    async fn provision(&self, node: &ResourceNode) -> NodeStatus {
        let inputs = match node.resolve_inputs().await {
            Ok(inputs) => inputs,
            Err((input, error)) => return NodeStatus::Failed(NodeError::from_input(input, error)),
        };
        for (key, value) in &inputs {
            self.sink.write(&format!("{}.{}", node.name(), key), value);
        }

        let request = CreateRequest {
            name: node.name().to_string(),
            kind: node.kind(),
            inputs,
        };

        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.call(&request, attempt).await {
                Ok(outputs) => {
                    let missing = node.populate_outputs(&outputs);
                    return if missing.is_empty() {
                        NodeStatus::Realized { attempts: attempt }
                    } else {
                        NodeStatus::Failed(NodeError::MissingOutputs(missing))
                    };
                }
                Err(NodeError::Provisioning { error, .. })
                    if error.is_transient() && attempt < self.retry.max_attempts =>
                {
                    let delay = self.retry.delay_for_attempt(attempt);
                    tracing::warn!(
                        node = %node.name(),
                        attempt,
                        error = %error,
                        delay_ms = delay.as_millis() as u64,
                        "Transient provider error, retrying"
                    );
                    tokio::select! {
                        _ = tokio::time::sleep(delay) => {}
                        _ = self.cancel.cancelled() => return NodeStatus::Cancelled,
                    }
                }
                Err(e) => return NodeStatus::Failed(e),
            }
        }
    }

    /// One provider call on its own task, so a panic or a timeout only
    /// affects this node
    async fn call(
        &self,
        request: &CreateRequest,
        attempt: u32,
    ) -> std::result::Result<BTreeMap<String, Value>, NodeError> {
        let provider = Arc::clone(&self.provider);
        let request = request.clone();
        let mut handle = tokio::spawn(async move { provider.create(request).await });

        let joined = match self.call_timeout {
            Some(limit) => match tokio::time::timeout(limit, &mut handle).await {
                Ok(joined) => joined,
                Err(_) => {
                    handle.abort();
                    return Err(NodeError::Provisioning {
                        error: ProviderError::Timeout(format!(
                            "no response within {}ms",
                            limit.as_millis()
                        )),
                        attempts: attempt,
                    });
                }
            },
            None => handle.await,
        };

        match joined {
            Ok(result) => result.map_err(|error| NodeError::Provisioning {
                error,
                attempts: attempt,
            }),
            Err(e) => Err(NodeError::Panicked(e.to_string())),
        }
    }
}
