//! State management for realized stacks
//!
//! Manages `.stackflow/<stack>.state.json`, which records the last known
//! outputs of every resource in a stack. Secret outputs are stored as a
//! redaction marker only.

use crate::error::{CloudError, Result};
use crate::report::{NodeStatus, RunReport};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use stackflow_core::PropertyMap;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::fs;

const STATE_VERSION: u32 = 1;
const STATE_DIR: &str = ".stackflow";

/// Persisted state of one stack
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StackState {
    /// State file version
    pub version: u32,

    pub stack: String,

    /// Last modified timestamp
    pub updated_at: DateTime<Utc>,

    /// Resources indexed by logical name
    pub resources: BTreeMap<String, ResourceState>,

    /// Stack exports, secrets redacted
    #[serde(default)]
    pub exports: BTreeMap<String, Value>,
}

impl StackState {
    pub fn new(stack: impl Into<String>) -> Self {
        Self {
            version: STATE_VERSION,
            stack: stack.into(),
            updated_at: Utc::now(),
            resources: BTreeMap::new(),
            exports: BTreeMap::new(),
        }
    }

    pub fn get_resource(&self, name: &str) -> Option<&ResourceState> {
        self.resources.get(name)
    }

    /// Fold a run into the state.
    ///
    /// Realized nodes replace their entry. Nodes that were not realized keep
    /// the outputs of their last successful run and only record the new
    /// status.
    pub fn record(&mut self, report: &RunReport) {
        let now = Utc::now();
        for node in &report.nodes {
            let status = ResourceStatus::from(&node.status);
            match self.resources.get_mut(&node.name) {
                Some(existing) if !node.status.is_realized() => {
                    existing.status = status;
                    existing.error = error_message(&node.status);
                    existing.updated_at = now;
                }
                _ => {
                    self.resources.insert(
                        node.name.clone(),
                        ResourceState {
                            kind: node.kind.type_token().to_string(),
                            status,
                            outputs: redacted(&node.outputs),
                            error: error_message(&node.status),
                            updated_at: now,
                        },
                    );
                }
            }
        }
        self.exports.extend(redacted(&report.exports));
        self.updated_at = now;
    }
}

fn redacted(values: &PropertyMap) -> BTreeMap<String, Value> {
    values
        .iter()
        .map(|(name, value)| (name.clone(), value.redacted()))
        .collect()
}

fn error_message(status: &NodeStatus) -> Option<String> {
    match status {
        NodeStatus::Realized { .. } => None,
        other => Some(other.to_string()),
    }
}

/// State of a single resource
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceState {
    /// Type token, e.g. "storage:StorageAccount"
    pub kind: String,

    pub status: ResourceStatus,

    /// Outputs of the last successful realization
    pub outputs: BTreeMap<String, Value>,

    /// Why the last run did not realize the resource
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    pub updated_at: DateTime<Utc>,
}

/// Status of a resource after the last run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceStatus {
    Realized,
    Failed,
    Skipped,
    Cancelled,
}

impl From<&NodeStatus> for ResourceStatus {
    fn from(status: &NodeStatus) -> Self {
        match status {
            NodeStatus::Realized { .. } => ResourceStatus::Realized,
            NodeStatus::Failed(_) => ResourceStatus::Failed,
            NodeStatus::Skipped { .. } => ResourceStatus::Skipped,
            NodeStatus::Cancelled => ResourceStatus::Cancelled,
        }
    }
}

impl std::fmt::Display for ResourceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResourceStatus::Realized => write!(f, "realized"),
            ResourceStatus::Failed => write!(f, "failed"),
            ResourceStatus::Skipped => write!(f, "skipped"),
            ResourceStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// State manager for reading/writing the state file of one stack
pub struct StateManager {
    /// Project root directory
    project_root: PathBuf,

    stack: String,
}

impl StateManager {
    pub fn new(project_root: impl AsRef<Path>, stack: impl Into<String>) -> Self {
        Self {
            project_root: project_root.as_ref().to_path_buf(),
            stack: stack.into(),
        }
    }

    fn state_dir(&self) -> PathBuf {
        self.project_root.join(STATE_DIR)
    }

    /// Get the state file path
    pub fn state_path(&self) -> PathBuf {
        self.state_dir().join(format!("{}.state.json", self.stack))
    }

    fn backup_path(&self) -> PathBuf {
        self.state_dir()
            .join(format!("{}.state.json.backup", self.stack))
    }

    fn lock_path(&self) -> PathBuf {
        self.state_dir().join(format!("{}.lock.json", self.stack))
    }

    /// Ensure the state directory exists
    async fn ensure_state_dir(&self) -> Result<()> {
        let dir = self.state_dir();
        if !dir.exists() {
            fs::create_dir_all(&dir).await?;
            tracing::debug!("Created state directory: {}", dir.display());
        }
        Ok(())
    }

    /// Load the current state
    pub async fn load(&self) -> Result<StackState> {
        let path = self.state_path();
        if !path.exists() {
            tracing::debug!(stack = %self.stack, "State file not found, returning empty state");
            return Ok(StackState::new(&self.stack));
        }

        let content = fs::read_to_string(&path).await?;
        let state: StackState = serde_json::from_str(&content)?;

        if state.version > STATE_VERSION {
            return Err(CloudError::StateError(format!(
                "State file version {} is newer than supported version {}",
                state.version, STATE_VERSION
            )));
        }
        if state.stack != self.stack {
            return Err(CloudError::StateError(format!(
                "State file {} belongs to stack '{}'",
                path.display(),
                state.stack
            )));
        }

        tracing::debug!(stack = %self.stack, resources = state.resources.len(), "Loaded state");
        Ok(state)
    }

    /// Save the state, keeping the previous file as a backup
    pub async fn save(&self, state: &StackState) -> Result<()> {
        self.ensure_state_dir().await?;

        let path = self.state_path();
        let backup = self.backup_path();

        if path.exists() {
            if backup.exists() {
                fs::remove_file(&backup).await?;
            }
            fs::rename(&path, &backup).await?;
            tracing::debug!("Created state backup");
        }

        let content = serde_json::to_string_pretty(state)?;
        fs::write(&path, content).await?;

        tracing::debug!(stack = %self.stack, resources = state.resources.len(), "Saved state");
        Ok(())
    }

    /// Acquire a lock for exclusive access
    pub async fn acquire_lock(&self) -> Result<StateLock> {
        self.ensure_state_dir().await?;

        let lock_path = self.lock_path();

        if lock_path.exists() {
            let content = fs::read_to_string(&lock_path).await?;
            let lock_info: LockInfo = serde_json::from_str(&content)?;

            // Locks older than an hour are considered stale
            let age = Utc::now().signed_duration_since(lock_info.acquired_at);
            if age.num_hours() < 1 {
                return Err(CloudError::LockError(format!(
                    "Stack '{}' is locked by {} since {}",
                    self.stack, lock_info.holder, lock_info.acquired_at
                )));
            }

            tracing::warn!("Removing stale lock from {}", lock_info.holder);
        }

        let lock_info = LockInfo {
            holder: std::env::var("HOSTNAME")
                .or_else(|_| std::env::var("HOST"))
                .unwrap_or_else(|_| "unknown".to_string()),
            acquired_at: Utc::now(),
        };

        let content = serde_json::to_string_pretty(&lock_info)?;
        fs::write(&lock_path, content).await?;

        tracing::debug!(stack = %self.stack, "Acquired state lock");
        Ok(StateLock {
            lock_path,
            released: false,
        })
    }
}

/// Lock information
#[derive(Debug, Serialize, Deserialize)]
struct LockInfo {
    holder: String,
    acquired_at: DateTime<Utc>,
}

/// RAII guard for state lock
pub struct StateLock {
    lock_path: PathBuf,
    released: bool,
}

impl StateLock {
    /// Release the lock
    pub async fn release(mut self) -> Result<()> {
        if !self.released {
            if self.lock_path.exists() {
                fs::remove_file(&self.lock_path).await?;
                tracing::debug!("Released state lock");
            }
            self.released = true;
        }
        Ok(())
    }
}

impl Drop for StateLock {
    fn drop(&mut self) {
        if !self.released && self.lock_path.exists() {
            let _ = std::fs::remove_file(&self.lock_path);
        }
    }
}
