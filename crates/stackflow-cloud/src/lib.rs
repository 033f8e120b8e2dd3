//! StackFlow provisioning
//!
//! This crate realizes the resource graphs declared with `stackflow-core`.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────┐
//! │                  stack CLI                       │
//! │              (stack up / preview)                │
//! └─────────────────┬───────────────────────────────┘
//!                   │
//! ┌─────────────────▼───────────────────────────────┐
//! │               stackflow-cloud                    │
//! │  ┌──────────────────────────────────────────┐   │
//! │  │          ProvisioningEngine               │   │
//! │  │  graph walk, retries, cancellation        │   │
//! │  └──────────────────────────────────────────┘   │
//! │  ┌──────────────┐  ┌──────────────┐            │
//! │  │ trait Provider│  │  State Mgmt  │            │
//! │  └──────────────┘  └──────────────┘            │
//! └───────┬─────────────────────────────────────────┘
//!         │
//! ┌───────▼───────┐
//! │ local provider│
//! └───────────────┘
//! ```

pub mod engine;
pub mod error;
pub mod provider;
pub mod report;
pub mod state;

// Re-exports
pub use engine::{EngineConfig, ProvisioningEngine};
pub use error::{CloudError, NodeError, ProviderError, Result};
pub use provider::{AuthStatus, CreateRequest, Provider, RetryConfig};
pub use report::{NodeReport, NodeStatus, RunReport, RunSummary};
pub use state::{ResourceState, ResourceStatus, StackState, StateLock, StateManager};
pub use tokio_util::sync::CancellationToken;
