//! Project descriptor (`project.yaml`) data model.
//!
//! A descriptor is produced once by the digester, enriched by the resolver
//! (which attaches fetched bit descriptors to each plan's `bits` map) and
//! then read by the composer.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use serde::Serialize;

use crate::core::digest::Digester;
use crate::core::errors::DescriptorError;
use crate::core::markup::Document;

/// Conventional descriptor file name.
pub const DESCRIPTOR_NAME: &str = "project.yaml";

/// Name of the implicit target every project has.
pub const DEFAULT_TARGET: &str = "default";

/// Main source used when a target does not name one.
pub const DEFAULT_MAIN: &str = "main.cpp";

/// A source package: a directory whose `*.c`/`*.cpp` files are compiled.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PackageDescription {
    pub path: String,
    pub cflags: Vec<String>,
    pub cppflags: Vec<String>,
}

impl PackageDescription {
    pub fn new(path: impl Into<String>) -> Self {
        PackageDescription {
            path: path.into(),
            ..Default::default()
        }
    }
}

/// A dependency reference as written in a compilation plan.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DeclaredBit {
    pub name: String,
    pub version: String,
    /// One of the bit's own named targets to build it with.
    pub target: Option<String>,
    pub cflags: Vec<String>,
    pub cppflags: Vec<String>,
}

impl DeclaredBit {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        DeclaredBit {
            name: name.into(),
            version: version.into(),
            ..Default::default()
        }
    }
}

/// A bit descriptor fetched by the resolver, tagged with the declaration
/// that pulled it in.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedBit {
    pub declared: DeclaredBit,
    pub descriptor: ProjectDescriptor,
}

/// Flags, packages and dependencies declared at one scope.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CompilationPlan {
    pub declared_bits: Vec<DeclaredBit>,
    /// Filled in by the resolver.
    pub bits: BTreeMap<String, ResolvedBit>,
    pub packages: Vec<PackageDescription>,
    pub cflags: Vec<String>,
    pub cppflags: Vec<String>,
    pub ldflags: Vec<String>,
    pub libraries: Vec<String>,
    pub includes: BTreeSet<String>,
}

impl CompilationPlan {
    /// Re-root package paths and relative include directories under `prefix`.
    pub fn rooted_at(&self, prefix: &str) -> CompilationPlan {
        let mut plan = self.clone();
        for package in &mut plan.packages {
            package.path = join_root(prefix, &package.path);
        }
        plan.includes = self
            .includes
            .iter()
            .map(|dir| {
                if Path::new(dir).is_absolute() {
                    dir.clone()
                } else {
                    join_root(prefix, dir)
                }
            })
            .collect();
        plan
    }
}

/// Output format of a target. Only native binaries are produced.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetFormat {
    #[default]
    Binary,
}

impl std::str::FromStr for TargetFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "binary" => Ok(TargetFormat::Binary),
            other => Err(format!("unknown target format `{}`", other)),
        }
    }
}

/// A named build configuration layered on the project-wide plans.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TargetDescription {
    pub name: String,
    pub main: String,
    pub format: TargetFormat,
    pub build: CompilationPlan,
    pub test: CompilationPlan,
    pub post_build: Vec<String>,
    pub image: Option<String>,
    pub dockerfile: Option<String>,
    pub test_image: Option<String>,
    pub test_dockerfile: Option<String>,
    pub toolchain_prefix: Option<String>,
}

impl TargetDescription {
    pub fn new(name: impl Into<String>) -> Self {
        TargetDescription {
            name: name.into(),
            main: DEFAULT_MAIN.to_string(),
            format: TargetFormat::Binary,
            build: CompilationPlan::default(),
            test: CompilationPlan::default(),
            post_build: Vec::new(),
            image: None,
            dockerfile: None,
            test_image: None,
            test_dockerfile: None,
            toolchain_prefix: None,
        }
    }
}

/// The digested `project.yaml`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProjectDescriptor {
    pub name: String,
    pub version: String,
    pub description: String,
    pub build: CompilationPlan,
    pub test: CompilationPlan,
    /// Always contains [`DEFAULT_TARGET`].
    pub targets: BTreeMap<String, TargetDescription>,
}

impl ProjectDescriptor {
    /// A descriptor with only a name and the implicit default target.
    pub fn new(name: impl Into<String>) -> Self {
        let mut targets = BTreeMap::new();
        targets.insert(
            DEFAULT_TARGET.to_string(),
            TargetDescription::new(DEFAULT_TARGET),
        );
        ProjectDescriptor {
            name: name.into(),
            version: String::new(),
            description: String::new(),
            build: CompilationPlan::default(),
            test: CompilationPlan::default(),
            targets,
        }
    }

    /// Load and digest a descriptor file.
    pub fn load(path: &Path) -> Result<Self, DescriptorError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                DescriptorError::NotFound(path.to_path_buf())
            } else {
                DescriptorError::Io {
                    path: path.to_path_buf(),
                    source: e,
                }
            }
        })?;

        Self::parse(&content, path)
    }

    /// Parse and digest descriptor text. `path` is only used in errors.
    pub fn parse(content: &str, path: &Path) -> Result<Self, DescriptorError> {
        let document = Document::parse(content);
        Digester::new(path, content).digest(&document)
    }

    /// Get a target by name.
    pub fn target(&self, name: &str) -> Option<&TargetDescription> {
        self.targets.get(name)
    }

    /// Names of all described targets.
    pub fn target_names(&self) -> impl Iterator<Item = &String> {
        self.targets.keys()
    }

    /// The target this descriptor is built with when pulled in as a bit.
    ///
    /// An explicit `target` on the declaration must exist. Otherwise the
    /// consumer's target is used if described, falling back to `default`.
    pub fn select_target(
        &self,
        declared: &DeclaredBit,
        consumer: &str,
    ) -> Result<&TargetDescription, DescriptorError> {
        match &declared.target {
            Some(name) => self
                .target(name)
                .ok_or_else(|| DescriptorError::target_not_described(name, self.target_names())),
            None => self
                .target(consumer)
                .or_else(|| self.target(DEFAULT_TARGET))
                .ok_or_else(|| {
                    DescriptorError::target_not_described(DEFAULT_TARGET, self.target_names())
                }),
        }
    }

    /// A copy whose package paths and include directories live under `prefix`.
    pub fn rooted_at(&self, prefix: &str) -> ProjectDescriptor {
        let mut descriptor = self.clone();
        descriptor.build = self.build.rooted_at(prefix);
        descriptor.test = self.test.rooted_at(prefix);
        for target in descriptor.targets.values_mut() {
            target.build = target.build.rooted_at(prefix);
            target.test = target.test.rooted_at(prefix);
        }
        descriptor
    }
}

/// Join a descriptor-relative path onto a root, using `/` separators.
pub fn join_root(root: &str, path: &str) -> String {
    let path = path.trim_start_matches("./");
    if path.is_empty() || path == "." {
        root.to_string()
    } else {
        format!("{}/{}", root.trim_end_matches('/'), path)
    }
}

/// Generate a starter descriptor for a new project.
pub fn generate_default_descriptor(name: &str) -> String {
    format!(
        r#"name: {name}
version: 0.1.0
description: ''
build:
  packages:
    src:
  cflags: [-Wall]
  cppflags: [-Wall, -std=c++17]
  includes: [include]
test:
  cppflags: [-DTESTING]
"#
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_descriptor_has_default_target() {
        let descriptor = ProjectDescriptor::new("demo");
        assert!(descriptor.target(DEFAULT_TARGET).is_some());
        assert_eq!(descriptor.target(DEFAULT_TARGET).unwrap().main, DEFAULT_MAIN);
    }

    #[test]
    fn test_join_root() {
        assert_eq!(join_root("bits/arduino/1.0.0", "nano33"), "bits/arduino/1.0.0/nano33");
        assert_eq!(join_root("bits/a/1", "./src"), "bits/a/1/src");
        assert_eq!(join_root("bits/a/1", "."), "bits/a/1");
    }

    #[test]
    fn test_rooted_at_rewrites_packages_and_includes() {
        let mut descriptor = ProjectDescriptor::new("arduino");
        descriptor.build.packages.push(PackageDescription::new("nano33"));
        descriptor.build.includes.insert("include".to_string());
        descriptor.build.includes.insert("/usr/include/avr".to_string());
        descriptor
            .targets
            .get_mut(DEFAULT_TARGET)
            .unwrap()
            .build
            .packages
            .push(PackageDescription::new("core"));

        let rooted = descriptor.rooted_at("bits/arduino/1.0.0");
        assert_eq!(rooted.build.packages[0].path, "bits/arduino/1.0.0/nano33");
        assert!(rooted.build.includes.contains("bits/arduino/1.0.0/include"));
        assert!(rooted.build.includes.contains("/usr/include/avr"));
        assert_eq!(
            rooted.targets[DEFAULT_TARGET].build.packages[0].path,
            "bits/arduino/1.0.0/core"
        );
    }

    #[test]
    fn test_select_target() {
        let mut descriptor = ProjectDescriptor::new("arduino");
        descriptor
            .targets
            .insert("nano".to_string(), TargetDescription::new("nano"));

        let plain = DeclaredBit::new("arduino", "1.0.0");
        assert_eq!(descriptor.select_target(&plain, "nano").unwrap().name, "nano");
        assert_eq!(descriptor.select_target(&plain, "uno").unwrap().name, DEFAULT_TARGET);

        let mut scoped = DeclaredBit::new("arduino", "1.0.0");
        scoped.target = Some("nano".to_string());
        assert_eq!(descriptor.select_target(&scoped, DEFAULT_TARGET).unwrap().name, "nano");

        scoped.target = Some("mega".to_string());
        assert!(matches!(
            descriptor.select_target(&scoped, DEFAULT_TARGET),
            Err(DescriptorError::TargetNotDescribed { .. })
        ));
    }

    #[test]
    fn test_generated_descriptor_parses() {
        let text = generate_default_descriptor("hello");
        let descriptor = ProjectDescriptor::parse(&text, Path::new(DESCRIPTOR_NAME)).unwrap();
        assert_eq!(descriptor.name, "hello");
        assert_eq!(descriptor.version, "0.1.0");
        assert_eq!(descriptor.build.packages[0].path, "src");
    }
}
