pub mod error;
pub mod model;

pub use error::*;
pub use model::{ProjectFile, RetrySettings, Settings, StackConfig};

use std::path::{Path, PathBuf};

const CONFIG_ENV: &str = "STACKFLOW_CONFIG_PATH";
const PROJECT_DIR: &str = ".stackflow";
const CANDIDATES: [&str; 4] = [
    "stackflow.local.yaml",
    ".stackflow.local.yaml",
    "stackflow.yaml",
    ".stackflow.yaml",
];

/// Find the project's stackflow.yaml
///
/// Search order:
/// 1. `STACKFLOW_CONFIG_PATH` (direct path)
/// 2. current directory: stackflow.local.yaml, .stackflow.local.yaml, stackflow.yaml, .stackflow.yaml
/// 3. `./.stackflow/`, same order
/// 4. `~/.config/stackflow/stackflow.yaml` (global)
pub fn find_project_file() -> Result<PathBuf> {
    if let Ok(config_path) = std::env::var(CONFIG_ENV) {
        let path = PathBuf::from(config_path);
        if path.exists() {
            return Ok(path);
        }
        tracing::warn!("{} points at a missing file: {}", CONFIG_ENV, path.display());
    }

    let current_dir = std::env::current_dir()?;

    for filename in &CANDIDATES {
        let path = current_dir.join(filename);
        if path.exists() {
            return Ok(path);
        }
    }

    let project_dir = current_dir.join(PROJECT_DIR);
    if project_dir.is_dir() {
        for filename in &CANDIDATES {
            let path = project_dir.join(filename);
            if path.exists() {
                return Ok(path);
            }
        }
    }

    if let Some(config_dir) = dirs::config_dir() {
        let global_config = config_dir.join("stackflow").join("stackflow.yaml");
        if global_config.exists() {
            return Ok(global_config);
        }
    }

    Err(ConfigError::ProjectFileNotFound)
}

/// Directory state files are kept under.
///
/// A project file inside `.stackflow/` belongs to the directory above it.
pub fn project_root(project_file: &Path) -> PathBuf {
    let dir = project_file.parent().unwrap_or(Path::new("."));
    match (dir.file_name(), dir.parent()) {
        (Some(name), Some(parent)) if name == PROJECT_DIR => parent.to_path_buf(),
        _ => dir.to_path_buf(),
    }
}

/// `stackflow.<stack>.yaml` next to the project file
pub fn stack_file_path(project_file: &Path, stack: &str) -> PathBuf {
    project_file
        .parent()
        .unwrap_or(Path::new("."))
        .join(format!("stackflow.{}.yaml", stack))
}

pub fn load_project_file(path: &Path) -> Result<ProjectFile> {
    let content = std::fs::read_to_string(path)?;
    serde_yaml::from_str(&content).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

fn validate_stack_name(stack: &str) -> Result<()> {
    let valid = !stack.is_empty()
        && stack
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if valid {
        Ok(())
    } else {
        Err(ConfigError::InvalidSetting {
            key: "stack",
            reason: format!("'{}' may only contain letters, digits, '-' and '_'", stack),
        })
    }
}

/// Load the settings of `stack`, applying the stack file over project defaults
pub fn load_stack_config(project_file: &Path, stack: &str) -> Result<StackConfig> {
    validate_stack_name(stack)?;
    let project = load_project_file(project_file)?;
    if project.name.trim().is_empty() {
        return Err(ConfigError::MissingSetting("name"));
    }

    let stack_file = stack_file_path(project_file, stack);
    let settings = if stack_file.exists() {
        tracing::debug!("Loading stack file: {}", stack_file.display());
        let content = std::fs::read_to_string(&stack_file)?;
        let overrides: Settings =
            serde_yaml::from_str(&content).map_err(|source| ConfigError::Parse {
                path: stack_file.clone(),
                source,
            })?;
        project.defaults.merge(overrides)
    } else {
        project.defaults
    };

    if settings.concurrency == Some(0) {
        return Err(ConfigError::InvalidSetting {
            key: "concurrency",
            reason: "must be at least 1".to_string(),
        });
    }

    Ok(StackConfig {
        project: project.name,
        stack: stack.to_string(),
        tenant_id: settings
            .tenant_id
            .ok_or(ConfigError::MissingSetting("tenantId"))?,
        subscription: settings.subscription,
        location: settings.location,
        concurrency: settings.concurrency,
        call_timeout_ms: settings.call_timeout_ms,
        retry: settings.retry,
    })
}

/// Discover the project file and load `stack` from it
pub fn load_config(stack: &str) -> Result<(PathBuf, StackConfig)> {
    let project_file = find_project_file()?;
    let config = load_stack_config(&project_file, stack)?;
    Ok((project_file, config))
}
