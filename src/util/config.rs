//! Configuration file support for bits.
//!
//! Two locations are read:
//! - Global: `~/.bits/config.toml` - User-wide defaults
//! - Project: `.bits/config.toml` - Project-specific overrides
//!
//! Project config takes precedence over global config. The merged value is
//! turned into immutable resolver and recipe options at call time.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::builder::cmake::RecipeOptions;
use crate::resolver::{ConflictPolicy, ResolverConfig};

/// Default directory holding installed bits, relative to the project root.
pub const DEFAULT_BITS_DIR: &str = "bits";

/// Default minimum CMake version written into recipes.
pub const DEFAULT_CMAKE_MINIMUM: &str = "3.16";

/// Default recipe file name.
pub const DEFAULT_OUTPUT: &str = "CMakeLists.txt";

/// bits configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Dependency resolution settings
    pub resolve: ResolveConfig,

    /// Recipe generation settings
    pub build: BuildConfig,
}

/// Resolution-related configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolveConfig {
    /// Directory bits are installed into (default `bits`)
    pub bits_dir: Option<String>,

    /// What to do when one bit is declared with two versions
    pub conflict: Option<ConflictPolicy>,
}

/// Recipe-related configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildConfig {
    /// Minimum CMake version (default 3.16)
    pub cmake_minimum: Option<String>,

    /// C++ standard to request, e.g. 17
    pub cxx_standard: Option<u32>,

    /// Recipe file written by `bits generate`
    pub output: Option<String>,
}

impl Config {
    /// Load configuration from a file.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;

        toml::from_str(&contents)
            .with_context(|| format!("failed to parse config file: {}", path.display()))
    }

    /// Load configuration with fallback to defaults if file doesn't exist.
    pub fn load_or_default(path: &Path) -> Self {
        if path.exists() {
            Self::load(path).unwrap_or_else(|e| {
                tracing::warn!("Failed to load config from {}: {:#}", path.display(), e);
                Self::default()
            })
        } else {
            Self::default()
        }
    }

    /// Merge another config into this one (other takes precedence).
    pub fn merge(&mut self, other: Config) {
        if other.resolve.bits_dir.is_some() {
            self.resolve.bits_dir = other.resolve.bits_dir;
        }
        if other.resolve.conflict.is_some() {
            self.resolve.conflict = other.resolve.conflict;
        }

        if other.build.cmake_minimum.is_some() {
            self.build.cmake_minimum = other.build.cmake_minimum;
        }
        if other.build.cxx_standard.is_some() {
            self.build.cxx_standard = other.build.cxx_standard;
        }
        if other.build.output.is_some() {
            self.build.output = other.build.output;
        }
    }

    /// Bits directory, relative to the project root.
    pub fn bits_dir(&self) -> &str {
        self.resolve.bits_dir.as_deref().unwrap_or(DEFAULT_BITS_DIR)
    }

    /// Recipe output file name.
    pub fn output(&self) -> &str {
        self.build.output.as_deref().unwrap_or(DEFAULT_OUTPUT)
    }

    /// Resolver settings for a project rooted at `root`.
    pub fn resolver_config(&self, root: &Path) -> ResolverConfig {
        ResolverConfig {
            bits_dir: root.join(self.bits_dir()),
            conflict: self.resolve.conflict.unwrap_or_default(),
        }
    }

    /// Recipe emitter settings.
    pub fn recipe_options(&self) -> RecipeOptions {
        RecipeOptions {
            cmake_minimum: self
                .build
                .cmake_minimum
                .clone()
                .unwrap_or_else(|| DEFAULT_CMAKE_MINIMUM.to_string()),
            cxx_standard: self.build.cxx_standard,
        }
    }
}

/// Load merged configuration from global and project locations.
///
/// Order of precedence (highest to lowest):
/// 1. Project config (.bits/config.toml)
/// 2. Global config (~/.bits/config.toml)
/// 3. Defaults
pub fn load_config(global_path: Option<&Path>, project_path: &Path) -> Config {
    let mut config = Config::default();

    if let Some(global_path) = global_path {
        if global_path.exists() {
            config.merge(Config::load_or_default(global_path));
        }
    }

    if project_path.exists() {
        config.merge(Config::load_or_default(project_path));
    }

    config
}

/// Get the global bits config directory (~/.bits).
pub fn global_config_dir() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|b| b.home_dir().join(".bits"))
}

/// Get the global config path (~/.bits/config.toml).
pub fn global_config_path() -> Option<PathBuf> {
    global_config_dir().map(|dir| dir.join("config.toml"))
}

/// Get the project config path (.bits/config.toml).
pub fn project_config_path(project_root: &Path) -> PathBuf {
    project_root.join(".bits").join("config.toml")
}
