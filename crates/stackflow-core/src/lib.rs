//! StackFlow core
//!
//! Building blocks of a declarative resource graph:
//!
//! - [`Output`]: single-assignment deferred values with secret taint
//! - [`ResourceNode`] and the typed [`kinds`] that declare them
//! - [`DependencyGraph`]: realization order derived from output dependencies
//! - [`sas`], [`connection`] and [`access`]: pure compositions over outputs
//!
//! Nothing in this crate performs provisioning calls; see `stackflow-cloud`.

pub mod access;
pub mod clock;
pub mod connection;
pub mod context;
pub mod error;
pub mod graph;
pub mod kinds;
pub mod output;
pub mod resource;
pub mod sas;
pub mod secret;
pub mod sink;
pub mod stack;

pub use access::{AccessPolicyEntry, Permissions, SecretPermission, bind};
pub use clock::{Clock, FixedClock, SystemClock};
pub use connection::build_connection_string;
pub use context::DeploymentContext;
pub use error::{ConfigurationError, DoubleResolutionError, OutputError};
pub use graph::DependencyGraph;
pub use output::{Input, Output, Settled};
pub use resource::{PropertyMap, PropertyValue, ResourceId, ResourceKind, ResourceNode};
pub use sas::{
    AccountKey, CredentialsResolver, PermissionSet, SignedUrlRequest, build_signed_url,
    signed_url_output,
};
pub use secret::{REDACTED, Revealed, Secret};
pub use sink::{MemorySink, SecretSink, TracingSink};
pub use stack::{Export, Stack};
