//! Test utilities and mocks for bits unit tests.
//!
//! Provides in-memory implementations of the composer's [`Filesystem`] and
//! the resolver's [`BitSource`], so pipeline tests never touch the disk.
//!
//! # Example
//!
//! ```rust,ignore
//! use bits::test_support::{MockBitSource, MockFs};
//!
//! #[test]
//! fn test_example() {
//!     let mut fs = MockFs::new();
//!     fs.add_file("src/main.cpp");
//!
//!     let mut source = MockBitSource::new();
//!     source.add("fmt", "9.1.0", "name: fmt\n");
//! }
//! ```

use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::core::descriptor::{ProjectDescriptor, DESCRIPTOR_NAME};
use crate::core::errors::DescriptorError;
use crate::ops::compose::Filesystem;
use crate::resolver::BitSource;

/// In-memory project tree for composition tests.
///
/// Only file paths are stored; contents are irrelevant to composition.
#[derive(Debug, Clone, Default)]
pub struct MockFs {
    files: BTreeSet<String>,
}

impl MockFs {
    /// Create a new empty mock filesystem.
    pub fn new() -> Self {
        MockFs::default()
    }

    /// Add a file at a project-relative path.
    pub fn add_file(&mut self, path: impl Into<String>) {
        self.files.insert(path.into());
    }

    /// Check if a file exists.
    pub fn exists(&self, path: &str) -> bool {
        self.files.contains(path)
    }
}

impl Filesystem for MockFs {
    fn find(&self, dir: &str, pattern: &str) -> Vec<String> {
        let dir = match dir.trim_start_matches("./").trim_end_matches('/') {
            "." => "",
            dir => dir,
        };
        let pattern = match glob::Pattern::new(pattern) {
            Ok(pattern) => pattern,
            Err(_) => return Vec::new(),
        };

        self.files
            .iter()
            .filter(|file| {
                let (parent, name) = match file.rsplit_once('/') {
                    Some((parent, name)) => (parent, name),
                    None => ("", file.as_str()),
                };
                parent == dir && pattern.matches(name)
            })
            .cloned()
            .collect()
    }
}

/// In-memory bit store keyed by name and version.
#[derive(Debug, Default)]
pub struct MockBitSource {
    descriptors: HashMap<(String, String), String>,
    loads: AtomicUsize,
}

impl MockBitSource {
    /// Create a new empty bit store.
    pub fn new() -> Self {
        MockBitSource::default()
    }

    /// Install a bit with the given descriptor text.
    pub fn add(&mut self, name: &str, version: &str, descriptor: &str) {
        self.descriptors
            .insert((name.to_string(), version.to_string()), descriptor.to_string());
    }

    /// Number of `load` calls made so far.
    pub fn loads(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }

    fn path(name: &str, version: &str) -> PathBuf {
        Path::new("bits").join(name).join(version).join(DESCRIPTOR_NAME)
    }
}

impl BitSource for MockBitSource {
    fn location(&self, name: &str, version: &str) -> String {
        format!("bits/{}/{}", name, version)
    }

    fn load(&self, name: &str, version: &str) -> Result<Option<ProjectDescriptor>, DescriptorError> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        match self.descriptors.get(&(name.to_string(), version.to_string())) {
            Some(text) => ProjectDescriptor::parse(text, &Self::path(name, version)).map(Some),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_fs_find_is_not_recursive() {
        let mut fs = MockFs::new();
        fs.add_file("src/a.c");
        fs.add_file("src/nested/b.c");
        fs.add_file("top.c");

        assert_eq!(fs.find("src", "*.c"), vec!["src/a.c"]);
        assert_eq!(fs.find(".", "*.c"), vec!["top.c"]);
        assert_eq!(fs.find("./src/nested/", "*.c"), vec!["src/nested/b.c"]);
        assert!(fs.exists("top.c"));
    }

    #[test]
    fn test_mock_bit_source_counts_loads() {
        let mut source = MockBitSource::new();
        source.add("fmt", "9.1.0", "name: fmt\n");

        assert!(source.load("fmt", "9.1.0").unwrap().is_some());
        assert!(source.load("fmt", "8.0.0").unwrap().is_none());
        assert_eq!(source.loads(), 2);
    }
}
