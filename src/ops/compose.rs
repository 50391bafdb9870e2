//! Project composition.
//!
//! Turns a resolved [`ProjectDescriptor`] and a target name into a
//! [`Project`]. Project-wide plan fields always come first and target fields
//! are appended: flags and libraries concatenate, include directories union,
//! packages are the union of both levels with sources discovered on disk.

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::path::{Path, PathBuf};

use rayon::prelude::*;

use crate::core::descriptor::{
    CompilationPlan, ProjectDescriptor, ResolvedBit, TargetDescription,
};
use crate::core::errors::DescriptorError;
use crate::core::project::{Package, Project, Target, Test, TestSuite};
use crate::util::config::DEFAULT_BITS_DIR;
use crate::util::fs::{glob_files, relative_slash_path};

/// Directory scanned for test suites.
pub const TESTS_DIR: &str = "tests";

/// Pattern a test suite's main file must match.
pub const TEST_SUITE_PATTERN: &str = "test_*.cpp";

/// Filesystem queries the composer needs.
pub trait Filesystem: Sync {
    /// Files in `dir` matching `pattern`, relative to the project root, with
    /// `/` separators.
    fn find(&self, dir: &str, pattern: &str) -> Vec<String>;

    /// Parent directory of a project-relative path (`.` at the top level).
    fn parent_directory(&self, path: &str) -> String {
        match Path::new(path).parent() {
            Some(parent) if !parent.as_os_str().is_empty() => {
                parent.to_string_lossy().replace('\\', "/")
            }
            _ => ".".to_string(),
        }
    }
}

/// The real filesystem under a project root.
#[derive(Debug, Clone)]
pub struct LocalFs {
    root: PathBuf,
}

impl LocalFs {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        LocalFs { root: root.into() }
    }
}

impl Filesystem for LocalFs {
    fn find(&self, dir: &str, pattern: &str) -> Vec<String> {
        let dir = dir.trim_start_matches("./");
        let pattern = if dir.is_empty() || dir == "." {
            pattern.to_string()
        } else {
            format!("{}/{}", glob::Pattern::escape(dir.trim_end_matches('/')), pattern)
        };

        match glob_files(&self.root, &[pattern]) {
            Ok(paths) => paths
                .iter()
                .map(|path| relative_slash_path(&self.root, path))
                .collect(),
            Err(e) => {
                tracing::warn!("{:#}", e);
                Vec::new()
            }
        }
    }
}

/// Composes projects from resolved descriptors.
pub struct Composer<'a> {
    fs: &'a dyn Filesystem,
    bits_dir: String,
}

impl<'a> Composer<'a> {
    pub fn new(fs: &'a dyn Filesystem) -> Self {
        Composer {
            fs,
            bits_dir: DEFAULT_BITS_DIR.to_string(),
        }
    }

    /// Root bit paths under a directory other than `bits`.
    pub fn with_bits_dir(mut self, bits_dir: impl Into<String>) -> Self {
        self.bits_dir = bits_dir.into();
        self
    }

    /// Compose one target.
    pub fn compose(
        &self,
        descriptor: &ProjectDescriptor,
        target_name: &str,
    ) -> Result<Project, DescriptorError> {
        let target = descriptor.target(target_name).ok_or_else(|| {
            DescriptorError::target_not_described(target_name, descriptor.target_names())
        })?;
        tracing::debug!("composing target `{}` of `{}`", target_name, descriptor.name);

        let build = self.merge(&descriptor.build, &target.build, target_name)?;
        let test = self.merge(&descriptor.test, &target.test, target_name)?;

        Ok(Project {
            name: descriptor.name.clone(),
            version: descriptor.version.clone(),
            description: descriptor.description.clone(),
            target: build.into_target(target),
            test: Test {
                test_suites: self.test_suites(),
                packages: test.packages,
                include_directories: test.include_directories,
                cflags: test.cflags,
                cppflags: test.cppflags,
                ldflags: test.ldflags,
                libraries: test.libraries,
                bits: test.bits,
            },
        })
    }

    /// Compose several targets in parallel, returned in input order.
    pub fn compose_targets(
        &self,
        descriptor: &ProjectDescriptor,
        target_names: &[String],
    ) -> Result<Vec<Project>, DescriptorError> {
        target_names
            .par_iter()
            .map(|name| self.compose(descriptor, name))
            .collect()
    }

    /// Merge a project-wide plan with a target plan.
    fn merge(
        &self,
        project: &CompilationPlan,
        target: &CompilationPlan,
        consumer: &str,
    ) -> Result<Merged, DescriptorError> {
        let mut merged = Merged {
            cflags: concat(&project.cflags, &target.cflags),
            cppflags: concat(&project.cppflags, &target.cppflags),
            ldflags: concat(&project.ldflags, &target.ldflags),
            libraries: concat(&project.libraries, &target.libraries),
            include_directories: project.includes.union(&target.includes).cloned().collect(),
            ..Default::default()
        };

        let mut seen = HashSet::new();
        for description in project.packages.iter().chain(&target.packages) {
            if !seen.insert(description.path.as_str()) {
                continue;
            }
            merged
                .include_directories
                .insert(self.fs.parent_directory(&description.path));
            merged.packages.push(Package {
                path: description.path.clone(),
                sources: self.sources(&description.path),
                cflags: concat(&description.cflags, &merged.cflags),
                cppflags: concat(&description.cppflags, &merged.cppflags),
            });
        }

        // A target plan resolves the project-wide bits under its own name, so
        // its entries win over the project-wide ones.
        let mut bits: BTreeMap<&str, &ResolvedBit> = BTreeMap::new();
        for (name, bit) in target.bits.iter().chain(&project.bits) {
            bits.entry(name.as_str()).or_insert(bit);
        }
        for bit in bits.values() {
            merged.bits.push(self.compose_bit(bit, consumer)?);
        }

        Ok(merged)
    }

    /// Compose a resolved bit into a nested target rooted under the bits directory.
    fn compose_bit(&self, bit: &ResolvedBit, consumer: &str) -> Result<Target, DescriptorError> {
        let declared = &bit.declared;
        let prefix = format!(
            "{}/{}/{}",
            self.bits_dir.trim_end_matches('/'),
            declared.name,
            declared.version
        );

        let mut descriptor = bit.descriptor.rooted_at(&prefix);
        descriptor.build.cflags.extend(declared.cflags.iter().cloned());
        descriptor.build.cppflags.extend(declared.cppflags.iter().cloned());

        let target = descriptor.select_target(declared, consumer)?;
        tracing::debug!(
            "composing bit `{}` {} with target `{}`",
            declared.name,
            declared.version,
            target.name
        );

        let merged = self.merge(&descriptor.build, &target.build, &target.name)?;
        let mut composed = merged.into_target(target);
        composed.name = declared.name.clone();
        composed.post_build.clear();
        Ok(composed)
    }

    /// Sorted `*.c` and `*.cpp` files of a package.
    fn sources(&self, path: &str) -> Vec<String> {
        let mut sources = self.fs.find(path, "*.c");
        sources.extend(self.fs.find(path, "*.cpp"));
        sources.sort();
        sources.dedup();
        sources
    }

    fn test_suites(&self) -> Vec<TestSuite> {
        let mut mains = self.fs.find(TESTS_DIR, TEST_SUITE_PATTERN);
        mains.sort();
        mains
            .into_iter()
            .map(|main| TestSuite {
                name: Path::new(&main)
                    .file_stem()
                    .map(|stem| stem.to_string_lossy().into_owned())
                    .unwrap_or_default(),
                main,
            })
            .collect()
    }
}

/// Compose one target of a resolved descriptor.
pub fn compose(
    descriptor: &ProjectDescriptor,
    target_name: &str,
    fs: &dyn Filesystem,
) -> Result<Project, DescriptorError> {
    Composer::new(fs).compose(descriptor, target_name)
}

/// Compose several targets in parallel, returned in input order.
pub fn compose_targets(
    descriptor: &ProjectDescriptor,
    target_names: &[String],
    fs: &dyn Filesystem,
) -> Result<Vec<Project>, DescriptorError> {
    Composer::new(fs).compose_targets(descriptor, target_names)
}

/// One merged plan level.
#[derive(Debug, Default)]
struct Merged {
    packages: Vec<Package>,
    include_directories: BTreeSet<String>,
    cflags: Vec<String>,
    cppflags: Vec<String>,
    ldflags: Vec<String>,
    libraries: Vec<String>,
    bits: Vec<Target>,
}

impl Merged {
    fn into_target(self, target: &TargetDescription) -> Target {
        Target {
            name: target.name.clone(),
            main: target.main.clone(),
            packages: self.packages,
            include_directories: self.include_directories,
            cflags: self.cflags,
            cppflags: self.cppflags,
            ldflags: self.ldflags,
            libraries: self.libraries,
            post_build: target.post_build.clone(),
            bits: self.bits,
        }
    }
}

fn concat(first: &[String], second: &[String]) -> Vec<String> {
    first.iter().chain(second).cloned().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::descriptor::DEFAULT_TARGET;
    use crate::resolver::{ConflictPolicy, Resolver};
    use crate::test_support::{MockBitSource, MockFs};

    fn descriptor(text: &str) -> ProjectDescriptor {
        ProjectDescriptor::parse(text, Path::new("project.yaml")).unwrap()
    }

    fn resolved(text: &str, source: &MockBitSource) -> ProjectDescriptor {
        Resolver::new(source, ConflictPolicy::FirstSeen)
            .resolve(descriptor(text))
            .unwrap()
            .descriptor
    }

    #[test]
    fn test_default_target_without_targets_key() {
        let fs = MockFs::new();
        let project = compose(&descriptor("name: P\n"), DEFAULT_TARGET, &fs).unwrap();
        assert_eq!(project.name, "P");
        assert_eq!(project.target.name, DEFAULT_TARGET);
        assert_eq!(project.target.main, "main.cpp");
        assert!(project.target.packages.is_empty());
    }

    #[test]
    fn test_missing_target_is_an_error() {
        let fs = MockFs::new();
        let err = compose(&descriptor("name: P\n"), "missing", &fs).unwrap_err();
        assert!(matches!(
            err,
            DescriptorError::TargetNotDescribed { ref target, .. } if target == "missing"
        ));
    }

    #[test]
    fn test_package_flags_come_first() {
        let mut fs = MockFs::new();
        fs.add_file("src/a.c");
        let text = "name: P\nbuild:\n  packages:\n    src:\n      cflags: [-DX]\n  cflags: [-Wall]\n";

        let project = compose(&descriptor(text), DEFAULT_TARGET, &fs).unwrap();
        assert_eq!(project.target.packages[0].cflags, vec!["-DX", "-Wall"]);
        assert_eq!(project.target.cflags, vec!["-Wall"]);
    }

    #[test]
    fn test_include_directories_union() {
        let fs = MockFs::new();
        let text = "name: P\nbuild:\n  includes: [./include]\n  packages:\n    shaders:\n";

        let project = compose(&descriptor(text), DEFAULT_TARGET, &fs).unwrap();
        let expected: BTreeSet<String> = [".", "./include"].iter().map(|s| s.to_string()).collect();
        assert_eq!(project.target.include_directories, expected);
    }

    #[test]
    fn test_target_fields_are_appended() {
        let mut fs = MockFs::new();
        fs.add_file("src/main.cpp");
        fs.add_file("hal/nano/gpio.c");
        let text = r#"name: P
build:
  packages:
    src:
  cflags: [-Wall]
  libraries: [m]
  includes: [include]
targets:
  nano:
    main: firmware.cpp
    post_build: [objcopy nano nano.hex]
    build:
      packages:
        src:
        hal/nano:
      cflags: [-mcpu=cortex-m4]
      libraries: [c_nano]
      includes: [hal/include]
"#;

        let project = compose(&descriptor(text), "nano", &fs).unwrap();
        let target = &project.target;
        assert_eq!(target.name, "nano");
        assert_eq!(target.main, "firmware.cpp");
        assert_eq!(target.post_build, vec!["objcopy nano nano.hex"]);
        assert_eq!(target.cflags, vec!["-Wall", "-mcpu=cortex-m4"]);
        assert_eq!(target.libraries, vec!["m", "c_nano"]);

        let paths: Vec<&str> = target.packages.iter().map(|p| p.path.as_str()).collect();
        assert_eq!(paths, vec!["src", "hal/nano"]);
        assert_eq!(target.packages[1].sources, vec!["hal/nano/gpio.c"]);
        assert_eq!(target.packages[1].cflags, vec!["-Wall", "-mcpu=cortex-m4"]);

        for dir in [".", "hal", "include", "hal/include"] {
            assert!(target.include_directories.contains(dir), "missing {dir}");
        }
    }

    #[test]
    fn test_sources_are_sorted() {
        let mut fs = MockFs::new();
        fs.add_file("src/zeta.cpp");
        fs.add_file("src/alpha.c");
        fs.add_file("src/beta.cpp");
        fs.add_file("src/notes.txt");

        let project = compose(
            &descriptor("name: P\nbuild:\n  packages:\n    src:\n"),
            DEFAULT_TARGET,
            &fs,
        )
        .unwrap();
        assert_eq!(
            project.target.packages[0].sources,
            vec!["src/alpha.c", "src/beta.cpp", "src/zeta.cpp"]
        );
    }

    #[test]
    fn test_bit_paths_are_rooted() {
        let mut source = MockBitSource::new();
        source.add(
            "arduino",
            "1.0.0",
            "name: arduino\nbuild:\n  packages:\n    nano33:\n  includes: [include]\n",
        );
        let mut fs = MockFs::new();
        fs.add_file("bits/arduino/1.0.0/nano33/wiring.cpp");

        let descriptor = resolved("name: P\nbuild:\n  bits:\n    arduino: 1.0.0\n", &source);
        let project = compose(&descriptor, DEFAULT_TARGET, &fs).unwrap();

        let bit = &project.target.bits[0];
        assert_eq!(bit.name, "arduino");
        assert_eq!(bit.packages[0].path, "bits/arduino/1.0.0/nano33");
        assert_eq!(bit.packages[0].sources, vec!["bits/arduino/1.0.0/nano33/wiring.cpp"]);
        assert!(bit.include_directories.contains("bits/arduino/1.0.0/include"));
        assert!(bit.include_directories.contains("bits/arduino/1.0.0"));
    }

    #[test]
    fn test_missing_bit_is_skipped() {
        let source = MockBitSource::new();
        let fs = MockFs::new();
        let descriptor = resolved("name: P\nbuild:\n  bits:\n    ghost: '1.0'\n", &source);

        let project = compose(&descriptor, DEFAULT_TARGET, &fs).unwrap();
        assert!(project.target.bits.is_empty());
    }

    #[test]
    fn test_declared_bit_flags_and_target() {
        let mut source = MockBitSource::new();
        source.add(
            "fmt",
            "9.1",
            r#"name: fmt
build:
  packages:
    src:
  cppflags: [-DFMT_BASE]
targets:
  header_only:
    build:
      cppflags: [-DFMT_HEADER_ONLY]
"#,
        );
        let fs = MockFs::new();
        let text = "name: P\nbuild:\n  bits:\n    fmt:\n      version: '9.1'\n      target: header_only\n      cppflags: [-DFMT_EXTRA]\n";

        let project = compose(&resolved(text, &source), DEFAULT_TARGET, &fs).unwrap();
        let bit = &project.target.bits[0];
        assert_eq!(bit.cppflags, vec!["-DFMT_BASE", "-DFMT_EXTRA", "-DFMT_HEADER_ONLY"]);
        assert_eq!(
            bit.packages[0].cppflags,
            vec!["-DFMT_BASE", "-DFMT_EXTRA", "-DFMT_HEADER_ONLY"]
        );
    }

    #[test]
    fn test_undeclared_bit_target_is_an_error() {
        let mut source = MockBitSource::new();
        source.add("fmt", "9.1", "name: fmt\n");
        let fs = MockFs::new();
        let text = "name: P\nbuild:\n  bits:\n    fmt:\n      version: '9.1'\n      target: nope\n";

        let err = compose(&resolved(text, &source), DEFAULT_TARGET, &fs).unwrap_err();
        assert!(matches!(err, DescriptorError::TargetNotDescribed { ref target, .. } if target == "nope"));
    }

    #[test]
    fn test_bit_uses_consumer_target_when_described() {
        let mut source = MockBitSource::new();
        source.add(
            "hal",
            "1",
            "name: hal\ntargets:\n  nano:\n    build:\n      packages:\n        nano:\n",
        );
        let fs = MockFs::new();
        let text = "name: P\nbuild:\n  bits:\n    hal: '1'\ntargets:\n  nano:\n  uno:\n";
        let descriptor = resolved(text, &source);

        let nano = compose(&descriptor, "nano", &fs).unwrap();
        assert_eq!(nano.target.bits[0].packages[0].path, "bits/hal/1/nano");
        let uno = compose(&descriptor, "uno", &fs).unwrap();
        assert!(uno.target.bits[0].packages.is_empty());
    }

    #[test]
    fn test_test_suites_are_discovered() {
        let mut fs = MockFs::new();
        fs.add_file("tests/test_math.cpp");
        fs.add_file("tests/test_io.cpp");
        fs.add_file("tests/helpers.cpp");
        let text = "name: P\ntest:\n  libraries: [gtest]\n  cppflags: [-DTESTING]\n";

        let project = compose(&descriptor(text), DEFAULT_TARGET, &fs).unwrap();
        let suites = &project.test.test_suites;
        assert_eq!(suites.len(), 2);
        assert_eq!(suites[0].name, "test_io");
        assert_eq!(suites[0].main, "tests/test_io.cpp");
        assert_eq!(suites[1].name, "test_math");
        assert_eq!(project.test.libraries, vec!["gtest"]);
        assert_eq!(project.test.cppflags, vec!["-DTESTING"]);
    }

    #[test]
    fn test_duplicate_packages_are_merged() {
        let fs = MockFs::new();
        let text = "name: P\nbuild:\n  packages:\n    src:\n      cflags: [-DFIRST]\ntargets:\n  default:\n    build:\n      packages:\n        src:\n          cflags: [-DSECOND]\n";

        let project = compose(&descriptor(text), DEFAULT_TARGET, &fs).unwrap();
        assert_eq!(project.target.packages.len(), 1);
        assert_eq!(project.target.packages[0].cflags, vec!["-DFIRST"]);
    }

    #[test]
    fn test_compose_targets_keeps_input_order() {
        let fs = MockFs::new();
        let descriptor = descriptor("name: P\ntargets:\n  a:\n  b:\n  c:\n");
        let names: Vec<String> = ["c", "a", "default", "b"].iter().map(|s| s.to_string()).collect();

        let projects = compose_targets(&descriptor, &names, &fs).unwrap();
        let composed: Vec<&str> = projects.iter().map(|p| p.target.name.as_str()).collect();
        assert_eq!(composed, vec!["c", "a", "default", "b"]);

        let bad = vec!["a".to_string(), "zzz".to_string()];
        assert!(compose_targets(&descriptor, &bad, &fs).is_err());
    }

    #[test]
    fn test_local_fs_find() {
        let tmp = tempfile::TempDir::new().unwrap();
        std::fs::create_dir_all(tmp.path().join("src")).unwrap();
        std::fs::write(tmp.path().join("src").join("b.cpp"), "").unwrap();
        std::fs::write(tmp.path().join("src").join("a.c"), "").unwrap();
        std::fs::write(tmp.path().join("top.c"), "").unwrap();

        let fs = LocalFs::new(tmp.path());
        assert_eq!(fs.find("src", "*.c"), vec!["src/a.c"]);
        assert_eq!(fs.find("./src", "*.cpp"), vec!["src/b.cpp"]);
        assert_eq!(fs.find(".", "*.c"), vec!["top.c"]);
        assert!(fs.find("missing", "*.c").is_empty());
    }

    #[test]
    fn test_local_fs_find_in_bracketed_dir() {
        let tmp = tempfile::TempDir::new().unwrap();
        let dir = tmp.path().join("lib[1]");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("a.c"), "").unwrap();

        let fs = LocalFs::new(tmp.path());
        assert_eq!(fs.find("lib[1]", "*.c"), vec!["lib[1]/a.c"]);

        let project = compose(
            &descriptor("name: P\nbuild:\n  packages:\n    lib[1]:\n"),
            DEFAULT_TARGET,
            &fs,
        )
        .unwrap();
        assert_eq!(project.target.packages[0].sources, vec!["lib[1]/a.c"]);
    }

    #[test]
    fn test_project_bits_use_target_resolution() {
        let mut source = MockBitSource::new();
        source.add(
            "hal",
            "1",
            "name: hal\ntargets:\n  nano:\n    build:\n      packages:\n        nano:\n      bits:\n        cmsis: '5'\n",
        );
        source.add("cmsis", "5", "name: cmsis\nbuild:\n  packages:\n    core:\n");
        let fs = MockFs::new();
        let text = "name: P\nbuild:\n  bits:\n    hal: '1'\ntargets:\n  nano:\n";

        let nano = compose(&resolved(text, &source), "nano", &fs).unwrap();
        let names: Vec<&str> = nano.target.bits.iter().map(|b| b.name.as_str()).collect();
        assert_eq!(names, vec!["cmsis", "hal"]);
        assert_eq!(nano.target.bits[0].packages[0].path, "bits/cmsis/5/core");
        assert_eq!(nano.target.bits[1].packages[0].path, "bits/hal/1/nano");

        let default = compose(&resolved(text, &source), DEFAULT_TARGET, &fs).unwrap();
        assert_eq!(default.target.bits.len(), 1);
    }

    #[test]
    fn test_parent_directory() {
        let fs = MockFs::new();
        assert_eq!(fs.parent_directory("shaders"), ".");
        assert_eq!(fs.parent_directory("hal/nano"), "hal");
        assert_eq!(
            fs.parent_directory("bits/arduino/1.0.0/nano33"),
            "bits/arduino/1.0.0"
        );
    }
}
