//! Composed, target-instantiated build plan.
//!
//! A [`Project`] is produced fresh by every composition and never mutated
//! afterwards. It is what the recipe emitter consumes.

use std::collections::BTreeSet;
use std::path::Path;

use serde::Serialize;

/// A package with its sources discovered and flags merged.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Package {
    pub path: String,
    /// Sorted `*.c` and `*.cpp` files, relative to the project root.
    pub sources: Vec<String>,
    /// Package flags followed by the inherited plan flags.
    pub cflags: Vec<String>,
    pub cppflags: Vec<String>,
}

impl Package {
    /// Object library name derived from the package path.
    pub fn library_name(&self) -> String {
        let name: String = self
            .path
            .trim_start_matches("./")
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
            .collect();
        if name.is_empty() {
            "root".to_string()
        } else {
            name
        }
    }

    /// Sources compiled as C.
    pub fn c_sources(&self) -> impl Iterator<Item = &String> {
        self.sources.iter().filter(|s| has_extension(s, "c"))
    }

    /// Sources compiled as C++.
    pub fn cpp_sources(&self) -> impl Iterator<Item = &String> {
        self.sources.iter().filter(|s| has_extension(s, "cpp"))
    }
}

fn has_extension(path: &str, ext: &str) -> bool {
    Path::new(path).extension().is_some_and(|e| e == ext)
}

/// A discovered `tests/test_*.cpp` file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TestSuite {
    pub name: String,
    pub main: String,
}

/// The build side of a composed target.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Target {
    pub name: String,
    pub main: String,
    pub packages: Vec<Package>,
    pub include_directories: BTreeSet<String>,
    pub cflags: Vec<String>,
    pub cppflags: Vec<String>,
    pub ldflags: Vec<String>,
    pub libraries: Vec<String>,
    pub post_build: Vec<String>,
    /// One nested target per resolved bit.
    pub bits: Vec<Target>,
}

impl Target {
    /// Every package of this target's bits, depth first, then its own.
    pub fn all_packages(&self) -> Vec<&Package> {
        let mut packages = Vec::new();
        for bit in &self.bits {
            packages.extend(bit.all_packages());
        }
        packages.extend(self.packages.iter());
        packages
    }
}

/// The test side of a composed target.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Test {
    pub test_suites: Vec<TestSuite>,
    pub packages: Vec<Package>,
    pub include_directories: BTreeSet<String>,
    pub cflags: Vec<String>,
    pub cppflags: Vec<String>,
    pub ldflags: Vec<String>,
    pub libraries: Vec<String>,
    pub bits: Vec<Target>,
}

/// A project composed for one target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Project {
    pub name: String,
    pub version: String,
    pub description: String,
    pub target: Target,
    pub test: Test,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn package(path: &str, sources: &[&str]) -> Package {
        Package {
            path: path.to_string(),
            sources: sources.iter().map(|s| s.to_string()).collect(),
            ..Default::default()
        }
    }

    #[test]
    fn test_library_name_is_sanitized() {
        assert_eq!(package("src", &[]).library_name(), "src");
        assert_eq!(
            package("bits/arduino/1.0.0/nano33", &[]).library_name(),
            "bits_arduino_1_0_0_nano33"
        );
        assert_eq!(package("./", &[]).library_name(), "root");
    }

    #[test]
    fn test_sources_split_by_language() {
        let pkg = package("src", &["src/a.c", "src/b.cpp", "src/c.h"]);
        assert_eq!(pkg.c_sources().collect::<Vec<_>>(), vec!["src/a.c"]);
        assert_eq!(pkg.cpp_sources().collect::<Vec<_>>(), vec!["src/b.cpp"]);
    }

    #[test]
    fn test_all_packages_puts_bits_first() {
        let bit = Target {
            name: "fmt".to_string(),
            packages: vec![package("bits/fmt/9/src", &[])],
            ..Default::default()
        };
        let target = Target {
            name: "default".to_string(),
            packages: vec![package("src", &[])],
            bits: vec![bit],
            ..Default::default()
        };
        let paths: Vec<&str> = target.all_packages().iter().map(|p| p.path.as_str()).collect();
        assert_eq!(paths, vec!["bits/fmt/9/src", "src"]);
    }
}
