//! Local provider for StackFlow
//!
//! This crate implements the Provider trait without talking to any cloud.
//! Outputs are derived deterministically from inputs, which makes it suitable
//! for previews, dry runs and tests.
//!
//! # Features
//!
//! - Stable auto-naming, resource ids, account keys and principal ids
//! - Input validation per resource kind
//! - Fault injection (`storage=rate-limited*2`)
//!
//! # Example
//!
//! ```ignore
//! use stackflow_cloud::{Provider, ProvisioningEngine};
//! use stackflow_cloud_local::{Fault, LocalProvider};
//! use std::sync::Arc;
//!
//! let provider = LocalProvider::default().with_fault("sa=timeout".parse()?);
//! let report = ProvisioningEngine::new(Arc::new(provider)).run_stack(stack).await?;
//! ```

pub mod error;
pub mod fault;
pub mod provider;

pub use error::{LocalProviderError, Result};
pub use fault::{Fault, FaultKind};
pub use provider::{DEFAULT_SUBSCRIPTION, LocalProvider};
