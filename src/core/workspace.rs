//! Workspace - the project being operated on.
//!
//! A Workspace is the directory holding `project.yaml`, its digested
//! descriptor and the merged configuration, providing centralized access to
//! paths and settings.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::core::descriptor::ProjectDescriptor;
use crate::util::config::{load_config, project_config_path, Config};
use crate::util::GlobalContext;

/// A workspace containing the root descriptor and configuration.
#[derive(Debug)]
pub struct Workspace {
    /// Directory containing the descriptor
    root: PathBuf,

    /// Path of `project.yaml`
    descriptor_path: PathBuf,

    /// The digested, unresolved descriptor
    descriptor: ProjectDescriptor,

    /// Global config merged with the project's `.bits/config.toml`
    config: Config,
}

impl Workspace {
    /// Load a workspace from a descriptor path.
    pub fn new(descriptor_path: &Path, ctx: &GlobalContext) -> Result<Self> {
        let descriptor = ProjectDescriptor::load(descriptor_path)?;
        let root = descriptor_path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or(Path::new("."))
            .to_path_buf();

        let config = load_config(ctx.config_path().as_deref(), &project_config_path(&root));

        Ok(Workspace {
            root,
            descriptor_path: descriptor_path.to_path_buf(),
            descriptor,
            config,
        })
    }

    /// Locate `project.yaml` from the context's cwd and load it.
    pub fn discover(ctx: &GlobalContext) -> Result<Self> {
        let path = ctx.find_descriptor()?;
        Self::new(&path, ctx)
    }

    /// Replace the merged configuration.
    pub fn with_config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    /// Get the workspace root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Get the descriptor file path.
    pub fn descriptor_path(&self) -> &Path {
        &self.descriptor_path
    }

    /// Get the digested descriptor.
    pub fn descriptor(&self) -> &ProjectDescriptor {
        &self.descriptor
    }

    /// Get the merged configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Get the directory bits are installed into.
    pub fn bits_dir(&self) -> PathBuf {
        self.root.join(self.config.bits_dir())
    }

    /// Get the project-local `.bits` state directory.
    pub fn state_dir(&self) -> PathBuf {
        self.root.join(".bits")
    }

    /// Get the recipe output path.
    pub fn output_path(&self) -> PathBuf {
        self.root.join(self.config.output())
    }

    /// Ensure the state directory exists.
    pub fn ensure_state_dir(&self) -> Result<()> {
        let dir = self.state_dir();
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("failed to create state directory: {}", dir.display()))?;
        Ok(())
    }
}
