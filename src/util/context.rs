//! Global context for bits operations.
//!
//! Provides centralized access to the working directory, the user's bits
//! home and output preferences.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::core::descriptor::DESCRIPTOR_NAME;
use crate::core::errors::DescriptorError;
use crate::util::config::global_config_dir;

/// Global context containing paths and output preferences.
#[derive(Debug, Clone)]
pub struct GlobalContext {
    /// Current working directory
    cwd: PathBuf,

    /// Home directory for global bits data (~/.bits/), if one can be found
    home: Option<PathBuf>,

    /// Whether to use verbose output
    verbose: bool,

    /// Whether to use colors in output
    color: bool,
}

impl GlobalContext {
    /// Create a new GlobalContext rooted at the process working directory.
    pub fn new() -> Result<Self> {
        let cwd = std::env::current_dir().context("failed to get current directory")?;
        Ok(Self::with_cwd(cwd))
    }

    /// Create a GlobalContext with a specific working directory.
    pub fn with_cwd(cwd: PathBuf) -> Self {
        GlobalContext {
            cwd,
            home: global_config_dir(),
            verbose: false,
            color: true,
        }
    }

    /// Override the bits home directory.
    pub fn with_home(mut self, home: PathBuf) -> Self {
        self.home = Some(home);
        self
    }

    /// Set verbose mode.
    pub fn set_verbose(&mut self, verbose: bool) {
        self.verbose = verbose;
    }

    /// Set color output.
    pub fn set_color(&mut self, color: bool) {
        self.color = color;
    }

    /// Get the current working directory.
    pub fn cwd(&self) -> &Path {
        &self.cwd
    }

    /// Get the bits home directory (~/.bits/).
    pub fn home(&self) -> Option<&Path> {
        self.home.as_deref()
    }

    /// Get the global configuration file path.
    pub fn config_path(&self) -> Option<PathBuf> {
        self.home.as_ref().map(|home| home.join("config.toml"))
    }

    /// Check if verbose mode is enabled.
    pub fn is_verbose(&self) -> bool {
        self.verbose
    }

    /// Check if color output is enabled.
    pub fn color(&self) -> bool {
        self.color
    }

    /// Find `project.yaml` starting from cwd and searching upward.
    pub fn find_descriptor(&self) -> Result<PathBuf, DescriptorError> {
        let mut current = self.cwd.clone();
        loop {
            let candidate = current.join(DESCRIPTOR_NAME);
            if candidate.is_file() {
                return Ok(candidate);
            }
            if !current.pop() {
                return Err(DescriptorError::NotFound(self.cwd.join(DESCRIPTOR_NAME)));
            }
        }
    }
}
