use assert_cmd::Command;
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

pub const PROJECT: &str = "\
name: contact-legacy
defaults:
  tenantId: 88a91815-758a-48c5-8810-c5520e8f581a
  location: japaneast
";

pub struct TestProject {
    pub root: TempDir,
}

impl TestProject {
    pub fn new() -> Self {
        let root = tempfile::tempdir().unwrap();
        Self { root }
    }

    /// Project with the default project file and a dev stack file
    pub fn with_dev_stack() -> Self {
        let project = Self::new();
        project.write_project(PROJECT);
        project.write_stack(
            "dev",
            "retry:\n  maxAttempts: 2\n  initialDelayMs: 10\n  maxDelayMs: 20\n",
        );
        project
    }

    pub fn write_project(&self, content: &str) {
        fs::write(self.project_file(), content).unwrap();
    }

    pub fn write_stack(&self, stack: &str, content: &str) {
        let path = self.root.path().join(format!("stackflow.{}.yaml", stack));
        fs::write(path, content).unwrap();
    }

    pub fn project_file(&self) -> PathBuf {
        self.root.path().join("stackflow.yaml")
    }

    pub fn path(&self) -> PathBuf {
        self.root.path().to_path_buf()
    }

    #[allow(dead_code)]
    pub fn state_file(&self, stack: &str) -> PathBuf {
        self.root
            .path()
            .join(".stackflow")
            .join(format!("{}.state.json", stack))
    }

    /// `stack` command running inside the project
    pub fn command(&self) -> Command {
        let mut cmd = Command::cargo_bin("stack").unwrap();
        cmd.current_dir(self.path())
            .env("STACKFLOW_CONFIG_PATH", self.project_file())
            .env_remove("STACKFLOW_STACK")
            .env_remove("RUST_LOG");
        cmd
    }
}
