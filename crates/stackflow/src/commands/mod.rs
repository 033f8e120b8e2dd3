pub mod preview;
pub mod sas;
pub mod up;

use stackflow_config::StackConfig;
use stackflow_core::{DeploymentContext, Stack};
use std::path::PathBuf;

/// A stack program loaded from the project configuration
pub struct LoadedStack {
    pub project_root: PathBuf,
    pub config: StackConfig,
    pub stack: Stack,
}

/// Discover the project, load `stack` and declare its resources
pub fn load(stack: &str) -> anyhow::Result<LoadedStack> {
    let (project_file, config) = stackflow_config::load_config(stack)?;
    tracing::debug!(path = %project_file.display(), stack = %stack, "Loaded project file");

    let mut context = DeploymentContext::new(&config.project, &config.stack, &config.tenant_id);
    if let Some(location) = &config.location {
        context = context.with_location(location);
    }

    let declared = crate::program::build(context)?;
    Ok(LoadedStack {
        project_root: stackflow_config::project_root(&project_file),
        config,
        stack: declared,
    })
}
